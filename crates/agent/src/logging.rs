//! Tracing setup for the agent.
//!
//! The Console channel owns stdout, so `safeclaw run` writes its log to
//! `observability.log_file`. One-shot commands log compactly to stderr.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use sc_domain::config::ObservabilityConfig;

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Append tracing output to the configured log file, creating it (and its
/// directory) if needed.
pub fn init_file_tracing(obs: &ObservabilityConfig) -> anyhow::Result<()> {
    if let Some(dir) = obs.log_file.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&obs.log_file)
        .with_context(|| format!("opening log file {}", obs.log_file.display()))?;
    let writer = std::sync::Mutex::new(file);

    let registry = tracing_subscriber::registry().with(env_filter(&obs.filter));
    if obs.json {
        registry
            .with(fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(fmt::layer().with_ansi(false).with_target(false).with_writer(writer))
            .init();
    }
    Ok(())
}

pub fn init_cli_tracing() {
    tracing_subscriber::registry()
        .with(env_filter("warn"))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Empty the log file. A missing file is left missing.
pub fn truncate_log(path: &Path) -> std::io::Result<()> {
    match OpenOptions::new().write(true).truncate(true).open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
