mod agent;
mod broker;
mod channels;
mod hub;
mod llm;
mod observability;
mod workspace;

pub use agent::*;
pub use broker::*;
pub use channels::*;
pub use hub::*;
pub use llm::*;
pub use observability::*;
pub use workspace::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SC_CONFIG";
/// Config file used when `SC_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Read `path` if it exists, otherwise start from defaults. Environment
    /// fallbacks are applied in both cases.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)
                .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Fill unset values from the environment.
    ///
    /// `SC_BROKER_URL` only applies when `broker.url` is absent; the
    /// `LLM_PROVIDER`/`LLM_MODEL` pair overrides the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.broker.url.is_none() {
            self.broker.url = lookup("SC_BROKER_URL").filter(|v| !v.trim().is_empty());
        }
        if let Some(kind) = lookup("LLM_PROVIDER").as_deref().and_then(ProviderKind::from_name) {
            self.llm.provider = kind;
        }
        if let Some(model) = lookup("LLM_MODEL").filter(|v| !v.trim().is_empty()) {
            self.llm.model = model;
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.broker.timeout_secs == 0 {
            issues.push(ConfigIssue::error(
                "broker.timeout_secs",
                "timeout must be greater than 0",
            ));
        }
        if self.broker.poll_interval_ms == 0 {
            issues.push(ConfigIssue::error(
                "broker.poll_interval_ms",
                "poll interval must be greater than 0",
            ));
        }
        if self.broker.command_queue.trim().is_empty() {
            issues.push(ConfigIssue::error(
                "broker.command_queue",
                "queue name must not be empty",
            ));
        }
        if self.broker.response_prefix.trim().is_empty() {
            issues.push(ConfigIssue::error(
                "broker.response_prefix",
                "response prefix must not be empty",
            ));
        }
        if self.broker.response_prefix == self.broker.command_queue {
            issues.push(ConfigIssue::error(
                "broker.response_prefix",
                "response prefix must differ from the command queue name",
            ));
        }
        if self.broker.url.is_none() {
            issues.push(ConfigIssue::warning(
                "broker.url",
                "no queue address (set broker.url or SC_BROKER_URL); remote actions will time out",
            ));
        }

        if self.llm.model.trim().is_empty() {
            issues.push(ConfigIssue::error("llm.model", "model must not be empty"));
        }

        if self.workspace.history_limit == 0 {
            issues.push(ConfigIssue::error(
                "workspace.history_limit",
                "history limit must be greater than 0",
            ));
        }

        if self.channels.enabled_names().is_empty() {
            issues.push(ConfigIssue::warning("channels", "no channels enabled"));
        }

        if self.hub.port == 0 {
            issues.push(ConfigIssue::error("hub.port", "port must be greater than 0"));
        }
        if self.hub.host.is_empty() {
            issues.push(ConfigIssue::error("hub.host", "host must not be empty"));
        }
        let timeout_ms = self.broker.timeout_secs.saturating_mul(1000);
        if self.hub.max_pop_ms < timeout_ms {
            issues.push(ConfigIssue::error(
                "hub.max_pop_ms",
                format!(
                    "{} ms is shorter than broker.timeout_secs ({timeout_ms} ms); remote waits would end early",
                    self.hub.max_pop_ms
                ),
            ));
        }
        if self.hub.response_ttl_secs <= self.broker.timeout_secs {
            issues.push(ConfigIssue::error(
                "hub.response_ttl_secs",
                "response keys must outlive broker.timeout_secs",
            ));
        }

        issues
    }
}
