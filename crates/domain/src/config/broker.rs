use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Broker (queue transport shared by agent and router)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Base URL of the queue hub (e.g. `http://127.0.0.1:6390`).
    /// Falls back to `SC_BROKER_URL`. The router refuses to start without it.
    #[serde(default)]
    pub url: Option<String>,
    /// Hard wall-clock bound for one remote action, in seconds.
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "d_command_queue")]
    pub command_queue: String,
    #[serde(default = "d_response_prefix")]
    pub response_prefix: String,
    /// How long one worker poll of the command queue may block.
    #[serde(default = "d_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: d_timeout_secs(),
            command_queue: d_command_queue(),
            response_prefix: d_response_prefix(),
            poll_interval_ms: d_poll_interval_ms(),
        }
    }
}

impl BrokerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router (remote worker policy)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Per-action enable switches, keyed by action name.
    /// Actions without an entry are enabled.
    #[serde(default)]
    pub actions: HashMap<String, ActionToggle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionToggle {
    #[serde(default = "d_true")]
    pub enabled: bool,
}

impl Default for ActionToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl RouterConfig {
    /// Whether `action` may run. Lookup is case-insensitive.
    pub fn is_enabled(&self, action: &str) -> bool {
        self.actions
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(action))
            .map(|(_, toggle)| toggle.enabled)
            .unwrap_or(true)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_timeout_secs() -> u64 {
    10
}
fn d_command_queue() -> String {
    "safeclaw:command_queue".into()
}
fn d_response_prefix() -> String {
    "safeclaw:response:".into()
}
fn d_poll_interval_ms() -> u64 {
    1000
}
fn d_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_actions_are_enabled() {
        let cfg = RouterConfig::default();
        assert!(cfg.is_enabled("HELLO_WORLD"));
    }

    #[test]
    fn toggle_lookup_ignores_case() {
        let cfg: RouterConfig = toml::from_str(
            r#"
[actions.hello_world]
enabled = false
"#,
        )
        .unwrap();
        assert!(!cfg.is_enabled("HELLO_WORLD"));
        assert!(cfg.is_enabled("PING"));
    }

    #[test]
    fn broker_durations() {
        let cfg = BrokerConfig::default();
        assert_eq!(cfg.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
    }
}
