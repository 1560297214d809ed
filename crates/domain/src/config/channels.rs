use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Channels
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub console: ConsoleChannelConfig,
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
}

impl ChannelsConfig {
    /// Names of the channels that will be started, in start order.
    pub fn enabled_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.console.enabled {
            names.push("Console");
        }
        if self.telegram.enabled {
            names.push("Telegram");
        }
        names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleChannelConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
}

impl Default for ConsoleChannelConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Environment variable holding the bot token.
    #[serde(default = "d_bot_token_env")]
    pub bot_token_env: String,
    /// Chats that receive replicated traffic even if they never wrote to
    /// the bot in this process.
    #[serde(default)]
    pub broadcast_chat_ids: Vec<i64>,
    #[serde(default = "d_api_base")]
    pub api_base: String,
    /// Long-poll timeout for `getUpdates`, in seconds.
    #[serde(default = "d_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramChannelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token_env: d_bot_token_env(),
            broadcast_chat_ids: Vec::new(),
            api_base: d_api_base(),
            poll_timeout_secs: d_poll_timeout_secs(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_bot_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".into()
}
fn d_api_base() -> String {
    "https://api.telegram.org".into()
}
fn d_poll_timeout_secs() -> u64 {
    30
}
