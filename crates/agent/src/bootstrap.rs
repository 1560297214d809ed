//! Wiring: config → workspace, provider, router client, dispatcher, engine.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use sc_broker::{BrokerClient, HttpQueue};
use sc_domain::config::Config;
use sc_runtime::{builtin_registry, ActionDispatcher, ChannelHub, TurnEngine, Workspace};

/// Everything a running agent needs.
pub struct AgentState {
    pub config: Arc<Config>,
    pub engine: Arc<TurnEngine>,
    pub channels: Arc<ChannelHub>,
    pub shutdown: CancellationToken,
}

pub fn build_agent_state(config: Arc<Config>, shutdown: CancellationToken) -> anyhow::Result<AgentState> {
    // ── Workspace ────────────────────────────────────────────────────
    let workspace = Workspace::new(&config.workspace.path);
    workspace
        .bootstrap()
        .with_context(|| format!("preparing workspace {}", config.workspace.path.display()))?;

    // ── LLM provider ─────────────────────────────────────────────────
    let provider = sc_providers::from_config(&config.llm).context("building LLM provider")?;
    tracing::info!(
        provider = %provider.provider_id(),
        model = %provider.model(),
        "LLM provider ready"
    );

    // ── Router client ────────────────────────────────────────────────
    let broker = match config.broker.url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => {
            let queue = HttpQueue::new(url).context("building queue client")?;
            let client = BrokerClient::from_config(Arc::new(queue), &config.broker)
                .with_shutdown(shutdown.clone());
            tracing::info!(url = %url, timeout_secs = config.broker.timeout_secs, "router client ready");
            client
        }
        None => {
            tracing::warn!(
                timeout_secs = config.broker.timeout_secs,
                "broker.url not set, router actions will time out"
            );
            BrokerClient::unconfigured(config.broker.timeout()).with_shutdown(shutdown.clone())
        }
    };

    // ── Dispatcher + engine ──────────────────────────────────────────
    let local = builtin_registry(&workspace, provider.clone());
    tracing::debug!(actions = ?local.action_names(), "local actions registered");
    let dispatcher = ActionDispatcher::new(local, Some(Arc::new(broker))).with_thinking(config.agent.thinking);

    let channels = Arc::new(ChannelHub::new());
    let engine = TurnEngine::new(provider, dispatcher, workspace)
        .with_history_limit(config.workspace.history_limit)
        .with_channels(channels.clone());

    Ok(AgentState {
        config,
        engine: Arc::new(engine),
        channels,
        shutdown,
    })
}
