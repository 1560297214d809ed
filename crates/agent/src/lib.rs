//! The `safeclaw` agent: configuration loading, runtime wiring and the
//! Console and Telegram channels.

pub mod banner;
pub mod bootstrap;
pub mod channels;
pub mod cli;
pub mod logging;
