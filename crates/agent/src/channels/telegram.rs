//! Telegram channel over the Bot API (`getUpdates` long polling).
//!
//! Target chats are the configured `broadcast_chat_ids` plus every chat
//! that has written to the bot since startup. Replicated traffic from
//! other channels goes to all of them.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use sc_domain::config::TelegramChannelConfig;
use sc_domain::error::{Error, Result};
use sc_runtime::commands::COMMANDS;
use sc_runtime::{BusyHandle, ChannelSession, Command, TurnEngine, BUSY_REFRESH};

use crate::bootstrap::AgentState;
use crate::channels::dialog;

pub const SOURCE: &str = "Telegram";
/// Telegram rejects longer messages.
pub const MAX_MESSAGE_CHARS: usize = 4096;
const NO_RESPONSE: &str = "(no response)";
const RETRY_DELAY: Duration = Duration::from_secs(5);

pub fn truncate(text: &str) -> String {
    text.chars().take(MAX_MESSAGE_CHARS).collect()
}

/// `true` when a message sent at `sent_at` (unix seconds) is older than
/// `max_age_secs` at `now`.
pub fn is_too_old(sent_at: i64, now: i64, max_age_secs: u64) -> bool {
    now.saturating_sub(sent_at) > max_age_secs as i64
}

pub fn too_old_reply(max_age_secs: u64) -> String {
    format!("Received this request, but it's too old to handle (>{max_age_secs}s). Please send again.")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bot API client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    /// Unix seconds.
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

pub struct BotApi {
    client: reqwest::Client,
    base: String,
}

impl BotApi {
    /// `api_base` is the server root (`https://api.telegram.org`). The HTTP
    /// timeout leaves room for a full `getUpdates` long poll.
    pub fn new(api_base: &str, token: &str, poll_timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            client,
            base: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T> {
        let resp = self
            .client
            .post(format!("{}/{method}", self.base))
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let reply: ApiReply<T> = resp.json().await.map_err(from_reqwest)?;
        match (reply.ok, reply.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Error::Channel {
                channel: SOURCE.into(),
                message: format!(
                    "{method}: {}",
                    reply.description.unwrap_or_else(|| "request failed".into())
                ),
            }),
        }
    }

    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut body = json!({ "timeout": timeout_secs, "allowed_updates": ["message"] });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", body).await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.call::<Value>("sendMessage", json!({ "chat_id": chat_id, "text": truncate(text) }))
            .await
            .map(|_| ())
    }

    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<()> {
        self.call::<Value>("sendChatAction", json!({ "chat_id": chat_id, "action": action }))
            .await
            .map(|_| ())
    }

    /// Publish the slash-command menu.
    pub async fn set_my_commands(&self, commands: &[(&str, &str)]) -> Result<()> {
        let commands: Vec<Value> = commands
            .iter()
            .map(|(name, desc)| json!({ "command": name, "description": desc }))
            .collect();
        self.call::<Value>("setMyCommands", json!({ "commands": commands }))
            .await
            .map(|_| ())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Channel session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TelegramChannel {
    api: Arc<BotApi>,
    known_chats: Mutex<BTreeSet<i64>>,
    broadcast_chats: BTreeSet<i64>,
    poll_timeout_secs: u64,
    tip_logged: AtomicBool,
}

impl TelegramChannel {
    pub fn new(api: BotApi, config: &TelegramChannelConfig) -> Self {
        Self {
            api: Arc::new(api),
            known_chats: Mutex::new(BTreeSet::new()),
            broadcast_chats: config.broadcast_chat_ids.iter().copied().collect(),
            poll_timeout_secs: config.poll_timeout_secs,
            tip_logged: AtomicBool::new(false),
        }
    }

    /// Build from config, reading the bot token from `bot_token_env`.
    pub fn from_config(config: &TelegramChannelConfig) -> Result<Self> {
        let token = std::env::var(&config.bot_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("telegram is enabled but {} is not set", config.bot_token_env)))?;
        let api = BotApi::new(&config.api_base, token.trim(), config.poll_timeout_secs)?;
        Ok(Self::new(api, config))
    }

    pub fn remember_chat(&self, chat_id: i64) {
        self.known_chats.lock().insert(chat_id);
    }

    pub fn target_chats(&self) -> Vec<i64> {
        let known = self.known_chats.lock();
        self.broadcast_chats.union(&known).copied().collect()
    }

    async fn send_to_targets(&self, text: &str) {
        let chats = self.target_chats();
        if chats.is_empty() {
            if !self.tip_logged.swap(true, Ordering::Relaxed) {
                tracing::info!(
                    "no telegram chats to replicate to; message the bot first or set channels.telegram.broadcast_chat_ids"
                );
            }
            return;
        }
        for chat_id in chats {
            if let Err(e) = self.api.send_message(chat_id, text).await {
                tracing::warn!(chat_id, error = %e, "telegram broadcast failed");
            }
        }
    }

    fn typing(&self, chats: Vec<i64>) -> BusyHandle {
        let api = self.api.clone();
        BusyHandle::spawn(SOURCE, BUSY_REFRESH, move || {
            let api = api.clone();
            let chats = chats.clone();
            async move {
                for chat_id in chats {
                    if let Err(e) = api.send_chat_action(chat_id, "typing").await {
                        tracing::debug!(chat_id, error = %e, "typing indicator failed");
                    }
                }
            }
        })
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.api.send_message(chat_id, text).await {
            tracing::warn!(chat_id, error = %e, "telegram reply failed");
        }
    }

    /// Handle one incoming message: age check, slash commands, or a turn.
    pub async fn handle_message(&self, engine: &TurnEngine, max_age_secs: u64, now: i64, message: Message) {
        let chat_id = message.chat.id;
        let Some(text) = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };

        if is_too_old(message.date, now, max_age_secs) {
            tracing::info!(chat_id, age_secs = now - message.date, "dropping stale telegram message");
            self.reply(chat_id, &too_old_reply(max_age_secs)).await;
            return;
        }
        self.remember_chat(chat_id);

        if text.starts_with('/') {
            match Command::parse(text) {
                Some(cmd) => {
                    let out = cmd.run(engine.workspace(), SOURCE, Some(chat_id));
                    self.reply(chat_id, &out).await;
                }
                None => tracing::debug!(chat_id, command = %text, "ignoring unknown command"),
            }
            return;
        }

        let typing = self.typing(vec![chat_id]);
        let reply = engine.run_channel_turn(text, SOURCE, &dialog).await;
        typing.stop();

        let reply = if reply.trim().is_empty() { NO_RESPONSE } else { reply.as_str() };
        if let Err(e) = self.api.send_message(chat_id, reply).await {
            tracing::warn!(chat_id, error = %e, "telegram reply failed");
            self.reply(chat_id, &format!("Error: {e}")).await;
        }
    }
}

#[async_trait::async_trait]
impl ChannelSession for TelegramChannel {
    fn source_name(&self) -> &str {
        SOURCE
    }

    async fn send(&self, text: &str) -> Result<()> {
        self.send_to_targets(text).await;
        Ok(())
    }

    async fn broadcast_receive(&self, text: &str, origin: &str) {
        self.send_to_targets(&format!("[{origin}] I got your request: {text}"))
            .await;
    }

    async fn broadcast_response(&self, text: &str, _origin: &str) {
        self.send_to_targets(text).await;
    }

    fn start_busy(&self) -> Option<BusyHandle> {
        let chats = self.target_chats();
        if chats.is_empty() {
            return None;
        }
        Some(self.typing(chats))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Poll loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Long-poll `getUpdates` until shutdown. Each message is handled on its
/// own task; turns from Telegram still run one at a time.
pub async fn run(state: Arc<AgentState>, channel: Arc<TelegramChannel>) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let max_age_secs = state.config.broker.timeout_secs;

    if let Err(e) = channel.api.set_my_commands(COMMANDS).await {
        tracing::warn!(error = %e, "failed to register telegram commands");
    }
    tracing::info!("telegram channel polling");

    let mut offset: Option<i64> = None;
    loop {
        let polled = tokio::select! {
            _ = shutdown.cancelled() => break,
            polled = channel.api.get_updates(offset, channel.poll_timeout_secs) => polled,
        };

        let updates = match polled {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(error = %e, "telegram getUpdates failed, retrying");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => continue,
                }
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let Some(message) = update.message else { continue };
            let channel = channel.clone();
            let engine = state.engine.clone();
            tokio::spawn(async move {
                let now = chrono::Utc::now().timestamp();
                channel.handle_message(&engine, max_age_secs, now, message).await;
            });
        }
    }

    tracing::info!("telegram channel stopped");
    Ok(())
}
