use std::path::PathBuf;

use clap::{Parser, Subcommand};

use sc_domain::config::{Config, CONFIG_ENV, DEFAULT_CONFIG_PATH};

/// SafeClaw router: serves remote actions from the shared command queue.
#[derive(Debug, Parser)]
#[command(name = "safeclaw-router", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve commands from `broker.url` (default).
    Serve,
    /// Host the queue hub on `hub.host:hub.port`.
    Hub,
    /// Print the action names this router serves, one per line.
    Actions,
}

pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let config = Config::load(&PathBuf::from(&config_path))
        .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?;
    Ok((config, config_path))
}
