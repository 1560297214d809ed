//! `safeclaw run`: start the enabled channels and serve turns until the
//! Console quits or the process is interrupted.

use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use sc_domain::config::Config;

use crate::banner;
use crate::bootstrap::build_agent_state;
use crate::channels::{console, telegram, ConsoleChannel, TelegramChannel};

pub async fn run(config: Arc<Config>) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let state = Arc::new(build_agent_state(config.clone(), shutdown.clone())?);

    let channels_cfg = &config.channels;
    if !channels_cfg.console.enabled && !channels_cfg.telegram.enabled {
        anyhow::bail!("no channels enabled; enable channels.console or channels.telegram");
    }

    let telegram = if channels_cfg.telegram.enabled {
        let channel = TelegramChannel::from_config(&channels_cfg.telegram)
            .context("starting telegram channel")?;
        Some(Arc::new(channel))
    } else {
        None
    };
    let console = channels_cfg
        .console
        .enabled
        .then(|| Arc::new(ConsoleChannel::new(config.agent.name.clone())));

    println!(
        "{}\n",
        banner::render(&config, &state.engine.workspace().router_action_names())
    );

    let mut tasks = JoinSet::new();
    if let Some(channel) = &telegram {
        state.channels.register(channel.clone());
        tasks.spawn(telegram::run(state.clone(), channel.clone()));
    }
    if let Some(channel) = &console {
        state.channels.register(channel.clone());
        tasks.spawn(console::run(state.clone(), channel.clone()));
    }
    tracing::info!(channels = ?state.channels.source_names(), "agent started");

    tokio::spawn(shutdown_signal(shutdown.clone()));

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(anyhow::Error::from)
            .and_then(|r| r);
        if let Err(e) = outcome {
            tracing::error!(error = %e, "channel failed");
            shutdown.cancel();
            first_error.get_or_insert(e);
        }
    }

    tracing::info!("agent stopped");
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("received SIGINT, shutting down"),
                Err(e) => tracing::warn!(error = %e, "failed to listen for SIGINT"),
            }
            token.cancel();
        }
    }
}
