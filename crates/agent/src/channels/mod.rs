//! Channel front-ends. Each one implements [`ChannelSession`] and runs its
//! own receive loop, handing user input to the shared turn engine.
//!
//! [`ChannelSession`]: sc_runtime::ChannelSession

pub mod console;
pub mod telegram;

pub use console::ConsoleChannel;
pub use telegram::{BotApi, TelegramChannel};

/// Status lines ("Waiting for router (X)...") go to the log and to the
/// operator's terminal, whichever channel the turn came from.
pub fn dialog(line: &str) {
    tracing::info!("{line}");
    println!("{line}");
}
