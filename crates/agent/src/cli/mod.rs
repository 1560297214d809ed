pub mod clear;
pub mod config;
pub mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sc_domain::config::{Config, CONFIG_ENV, DEFAULT_CONFIG_PATH};

/// SafeClaw: a conversational agent with local and router-hosted actions.
#[derive(Debug, Parser)]
#[command(name = "safeclaw", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the agent and its enabled channels (default).
    Run,
    /// Reset the artifact and input history, and truncate the log file.
    Clear,
    /// Config management commands.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse and validate the config file.
    Validate,
    /// Dump the resolved config (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `SC_CONFIG` (or `config.toml`).
/// Returns the parsed [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let config = Config::load(&PathBuf::from(&config_path))
        .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?;
    Ok((config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["safeclaw"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["safeclaw", "clear"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Clear)));

        let cli = Cli::try_parse_from(["safeclaw", "config", "validate"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Config(ConfigCommand::Validate))));
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["safeclaw", "restart"]).is_err());
    }
}
