//! `safeclaw clear`: forget the last artifact, the input history and the log.

use anyhow::Context;

use sc_domain::config::Config;
use sc_runtime::workspace::{ARTIFACT_FILE, HISTORY_FILE};
use sc_runtime::Workspace;

use crate::logging::truncate_log;

/// Reset workspace state and return the confirmation line.
pub fn clear(config: &Config) -> anyhow::Result<String> {
    let workspace = Workspace::new(&config.workspace.path);
    workspace.clear().context("resetting workspace state")?;
    truncate_log(&config.observability.log_file)
        .with_context(|| format!("truncating {}", config.observability.log_file.display()))?;

    let log_name = config
        .observability
        .log_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "the log file".into());
    Ok(format!("Cleared {ARTIFACT_FILE}, {HISTORY_FILE}, and {log_name}"))
}
