//! Broker protocol: the envelopes exchanged through the shared queue.
//!
//! An agent publishes a [`CommandEnvelope`] onto the command queue and
//! blocks on the response key derived from its `message_id`. A router
//! worker pops the command, runs the remote capability and pushes exactly
//! one [`ResponseEnvelope`] onto that key.

use sc_domain::{ActionResult, ActionStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Default name of the shared command queue.
pub const COMMAND_QUEUE: &str = "safeclaw:command_queue";

/// Default prefix of the per-request response keys.
pub const RESPONSE_PREFIX: &str = "safeclaw:response:";

/// Response key for `message_id` under the default prefix.
pub fn response_key(message_id: &str) -> String {
    response_key_with(RESPONSE_PREFIX, message_id)
}

pub fn response_key_with(prefix: &str, message_id: &str) -> String {
    format!("{prefix}{message_id}")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Command
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Agent → router: run `action` with `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Sole correlation key; fresh per call.
    pub message_id: String,
    pub action: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl CommandEnvelope {
    pub fn new(action: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            action: action.into(),
            params,
        }
    }

    /// Best-effort `message_id` extraction from a payload that failed to
    /// decode as a full envelope.
    pub fn salvage_message_id(raw: &str) -> Option<String> {
        let value: Value = serde_json::from_str(raw).ok()?;
        value
            .get("message_id")?
            .as_str()
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
    Skipped,
}

/// Router → agent: `{"status": .., "action": .., ...payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: ResponseStatus,
    pub action: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ResponseEnvelope {
    /// `status` and `action` keys in `payload` are dropped so they cannot
    /// shadow the envelope's own fields on the wire.
    pub fn new(
        status: ResponseStatus,
        action: impl Into<String>,
        mut payload: Map<String, Value>,
    ) -> Self {
        payload.remove("status");
        payload.remove("action");
        Self {
            status,
            action: action.into(),
            payload,
        }
    }

    pub fn ok(action: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self::new(ResponseStatus::Ok, action, payload)
    }

    pub fn error(action: impl Into<String>, error: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("error".into(), Value::String(error.into()));
        Self::new(ResponseStatus::Error, action, payload)
    }

    pub fn skipped(action: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("reason".into(), Value::String(reason.into()));
        Self::new(ResponseStatus::Skipped, action, payload)
    }

    pub fn into_action_result(self) -> ActionResult {
        match self.status {
            ResponseStatus::Ok => ActionResult::ok(self.action, self.payload),
            ResponseStatus::Skipped => {
                let mut result = ActionResult::skipped(self.action, "");
                result.payload = self.payload;
                result
            }
            ResponseStatus::Error => {
                let mut result = ActionResult::failed(self.action, "remote capability failed");
                for (k, v) in self.payload {
                    result.payload.insert(k, v);
                }
                result
            }
        }
    }
}

impl From<ActionStatus> for ResponseStatus {
    fn from(status: ActionStatus) -> Self {
        match status {
            ActionStatus::Ok => Self::Ok,
            ActionStatus::Failed => Self::Error,
            ActionStatus::Skipped => Self::Skipped,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
