use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observability (logging) configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where and how the interactive agent writes its tracing output.
///
/// The console channel owns stdout, so agent logs go to `log_file`.
/// The router and hub daemons ignore `log_file` and log to stderr.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "d_log_file")]
    pub log_file: PathBuf,
    /// Emit JSON lines instead of the compact text format.
    #[serde(default)]
    pub json: bool,
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "d_filter")]
    pub filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_file: d_log_file(),
            json: false,
            filter: d_filter(),
        }
    }
}

fn d_log_file() -> PathBuf {
    PathBuf::from("./logs/system.log")
}

fn d_filter() -> String {
    "info".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_logs_to_system_log() {
        let cfg = ObservabilityConfig::default();
        assert_eq!(cfg.log_file, PathBuf::from("./logs/system.log"));
        assert!(!cfg.json);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: ObservabilityConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.filter, "info");
    }

    #[test]
    fn deserialize_custom_values() {
        let cfg: ObservabilityConfig = toml::from_str(
            r#"
log_file = "/var/log/safeclaw.log"
json = true
filter = "debug,sc_broker=trace"
"#,
        )
        .unwrap();
        assert_eq!(cfg.log_file, PathBuf::from("/var/log/safeclaw.log"));
        assert!(cfg.json);
        assert_eq!(cfg.filter, "debug,sc_broker=trace");
    }
}
