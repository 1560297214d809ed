use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ActionCall
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A named request with parameters, extracted from model output.
///
/// Names are normalized to upper case (`memory_write` → `MEMORY_WRITE`) so
/// registry lookups are stable regardless of how the model spells them.
/// Params are opaque to everything except the capability that runs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ActionCall {
    pub fn new(name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            name: normalize_action_name(&name.into()),
            params,
        }
    }

    /// Re-apply name normalization (used after plain deserialization).
    pub fn normalized(mut self) -> Self {
        self.name = normalize_action_name(&self.name);
        self
    }

    /// Try to read an action call out of an arbitrary JSON value.
    /// Returns `None` when the value is not an object with a string `name`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let name = obj.get("name")?.as_str()?;
        let params = match obj.get("params") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        Some(Self::new(name, params))
    }
}

/// Trim and upper-case an action name.
pub fn normalize_action_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ActionResult
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Ok,
    Failed,
    Skipped,
}

/// Outcome of dispatching one [`ActionCall`]. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: String,
    pub status: ActionStatus,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<ActionCall>,
}

impl ActionResult {
    /// Build a successful result. A `follow_up` key in the payload is lifted
    /// out into [`ActionResult::follow_up`].
    pub fn ok(action: impl Into<String>, mut payload: Map<String, Value>) -> Self {
        let follow_up = payload
            .remove("follow_up")
            .as_ref()
            .and_then(ActionCall::from_value);
        Self {
            action: action.into(),
            status: ActionStatus::Ok,
            payload,
            follow_up,
        }
    }

    pub fn failed(action: impl Into<String>, error: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("error".into(), Value::String(error.into()));
        Self {
            action: action.into(),
            status: ActionStatus::Failed,
            payload,
            follow_up: None,
        }
    }

    pub fn skipped(action: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("reason".into(), Value::String(reason.into()));
        Self {
            action: action.into(),
            status: ActionStatus::Skipped,
            payload,
            follow_up: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ActionStatus::Ok
    }

    /// The `error` string of a failed result.
    pub fn error(&self) -> Option<&str> {
        self.payload.get("error").and_then(Value::as_str)
    }

    /// Human-readable text for the composed reply, if the result has any.
    ///
    /// Successful results surface their `output` (or, failing that, `text`)
    /// field; failures become `Error: <cause>`; skips name the reason.
    pub fn display_text(&self) -> Option<String> {
        match self.status {
            ActionStatus::Ok => ["output", "text"]
                .iter()
                .find_map(|k| self.payload.get(*k).and_then(Value::as_str))
                .filter(|s| !s.trim().is_empty())
                .map(str::to_owned),
            ActionStatus::Failed => Some(format!(
                "Error: {}",
                self.error().unwrap_or("action failed")
            )),
            ActionStatus::Skipped => {
                let reason = self
                    .payload
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("disabled");
                Some(format!("Skipped {}: {reason}", self.action))
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
