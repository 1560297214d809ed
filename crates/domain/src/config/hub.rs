use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queue hub server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    /// Snapshot file the hub rewrites after every mutation.
    /// `None` keeps the queues in memory only.
    #[serde(default = "d_data_file")]
    pub data_file: Option<PathBuf>,
    /// Upper bound a client may request for one blocking pop.
    #[serde(default = "d_max_pop_ms")]
    pub max_pop_ms: u64,
    /// Unclaimed response keys are dropped this long after their last push.
    #[serde(default = "d_response_ttl_secs")]
    pub response_ttl_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            data_file: d_data_file(),
            max_pop_ms: d_max_pop_ms(),
            response_ttl_secs: d_response_ttl_secs(),
        }
    }
}

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_port() -> u16 {
    6390
}
fn d_data_file() -> Option<PathBuf> {
    Some(PathBuf::from("./data/queues.json"))
}
fn d_max_pop_ms() -> u64 {
    60_000
}
fn d_response_ttl_secs() -> u64 {
    300
}
