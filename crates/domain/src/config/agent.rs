use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Name used in replies, the banner and `/whoami`.
    #[serde(default = "d_name")]
    pub name: String,
    /// Emit "Executing agent action (X)..." style status lines to the
    /// originating channel while a turn dispatches actions.
    #[serde(default = "d_true")]
    pub thinking: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: d_name(),
            thinking: true,
        }
    }
}

fn d_name() -> String {
    "SafeClaw".into()
}
fn d_true() -> bool {
    true
}
