use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::turn::HISTORY_LIMIT;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory holding memory, history, artifact, prompt and soul files.
    #[serde(default = "d_ws_path")]
    pub path: PathBuf,
    /// Maximum entries kept in `input_history.json`.
    #[serde(default = "d_history_limit")]
    pub history_limit: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            path: d_ws_path(),
            history_limit: d_history_limit(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_ws_path() -> PathBuf {
    PathBuf::from("./workspace")
}
fn d_history_limit() -> usize {
    HISTORY_LIMIT
}
