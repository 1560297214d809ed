
use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use sc_broker::hub::{self, HubState};
use sc_broker::BrokerServer;
use sc_domain::config::{Config, ObservabilityConfig};
use sc_router::cli::{load_config, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            let (config, config_path) = load_config()?;
            init_tracing(&config.observability);
            tracing::info!(config = %config_path, "starting router");
            serve(config).await
        }
        Some(Command::Hub) => {
            let (config, config_path) = load_config()?;
            init_tracing(&config.observability);
            tracing::info!(config = %config_path, "starting queue hub");
            run_hub(config).await
        }
        Some(Command::Actions) => {
            for name in sc_router::registry().action_names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

/// Daemons log to stderr; `observability.json` picks the format.
fn init_tracing(obs: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&obs.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if obs.json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let server = BrokerServer::connect(&config.broker, sc_router::registry(), config.router.clone())
        .context("connecting router worker")?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    eprintln!(
        "Router listening on {} (Ctrl+C to stop)",
        config.broker.command_queue
    );
    server.run(shutdown).await;
    eprintln!("Stopped.");
    Ok(())
}

async fn run_hub(config: Config) -> anyhow::Result<()> {
    let state = HubState::open(&config.hub, &config.broker.response_prefix)
        .context("opening hub state")?;

    let addr = format!("{}:{}", config.hub.host, config.hub.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %addr, "queue hub listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    hub::serve(listener, state, async move { shutdown.cancelled().await })
        .await
        .context("queue hub error")?;
    tracing::info!("queue hub stopped");
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                let _ = ctrl_c.await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }

    token.cancel();
}
