//! Turn engine: prompt → completion → parse → dispatch → persist → reply.
//!
//! ```text
//!   Idle ─► Prompting ─► Parsing ─► Dispatching ─► Persisting ─► Idle
//!     │         │            │
//!     │         │            └─ parse error: "(Parse error: ..)", history kept
//!     │         └─ provider error: "Error: ..\n<hint>"
//!     └─ empty input: "(Empty prompt, skipping)"
//! ```
//!
//! Every failure ends as a reply string. History and artifact are written
//! once, after every dispatch of the turn has finished.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Mutex;
use tracing::Instrument;

use sc_domain::{HistoryEntry, Turn, HISTORY_LIMIT};
use sc_providers::CompletionProvider;

use crate::dispatch::{ActionDispatcher, StatusSink};
use crate::fanout::ChannelHub;
use crate::lock::OriginLocks;
use crate::parser;
use crate::prompt::PromptBuilder;
use crate::workspace::Workspace;

pub const EMPTY_PROMPT_REPLY: &str = "(Empty prompt, skipping)";

/// Where a turn stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Prompting,
    Parsing,
    Done,
}

impl TurnStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prompting => "prompting",
            Self::Parsing => "parsing",
            Self::Done => "done",
        }
    }
}

/// Reply plus the turn record, when the turn got as far as parsing.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub turn: Option<Turn>,
    /// Last stage reached. `Done` for turns that ran to completion.
    pub stage: TurnStage,
}

impl TurnOutcome {
    fn stopped(stage: TurnStage, reply: String) -> Self {
        Self {
            reply,
            turn: None,
            stage,
        }
    }
}

pub struct TurnEngine {
    provider: Arc<dyn CompletionProvider>,
    dispatcher: ActionDispatcher,
    workspace: Workspace,
    prompts: PromptBuilder,
    channels: Arc<ChannelHub>,
    locks: OriginLocks,
    history_limit: usize,
    persist: Mutex<()>,
}

impl TurnEngine {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        dispatcher: ActionDispatcher,
        workspace: Workspace,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            prompts: PromptBuilder::new(workspace.clone()),
            workspace,
            channels: Arc::new(ChannelHub::new()),
            locks: OriginLocks::new(),
            history_limit: HISTORY_LIMIT,
            persist: Mutex::new(()),
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn with_channels(mut self, channels: Arc<ChannelHub>) -> Self {
        self.channels = channels;
        self
    }

    pub fn channels(&self) -> &Arc<ChannelHub> {
        &self.channels
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.provider
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Channel entry point
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Run one turn for input that arrived on `origin`, mirroring it to the
    /// other channels and holding their busy indicators for the duration.
    ///
    /// Turns from the same origin run one at a time. Busy indicators are
    /// stopped before this returns, whatever happened during the turn.
    pub async fn run_channel_turn(&self, user_input: &str, origin: &str, status: &dyn StatusSink) -> String {
        let _permit = match self.locks.acquire(origin).await {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "turn lock unavailable, running unserialised");
                None
            }
        };

        self.channels.broadcast_to_others(user_input, origin).await;

        let reply = {
            let busy = self.channels.start_busy_except(origin);
            let reply = match AssertUnwindSafe(self.process(user_input, origin, status))
                .catch_unwind()
                .await
            {
                Ok(reply) => reply,
                Err(_) => {
                    tracing::error!(origin = %origin, "turn panicked");
                    "Error: internal error while processing the turn".to_string()
                }
            };
            busy.stop();
            reply
        };

        self.channels.broadcast_response_to_others(&reply, origin).await;
        reply
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Core turn
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Run one turn and return only the reply.
    pub async fn process(&self, user_input: &str, source: &str, status: &dyn StatusSink) -> String {
        self.run_turn(user_input, source, status).await.reply
    }

    pub async fn run_turn(&self, user_input: &str, source: &str, status: &dyn StatusSink) -> TurnOutcome {
        let span = tracing::info_span!("turn", origin = %source);
        self.run_turn_inner(user_input, source, status)
            .instrument(span)
            .await
    }

    async fn run_turn_inner(&self, user_input: &str, source: &str, status: &dyn StatusSink) -> TurnOutcome {
        // ── Prompting ──
        let prompt = match self.prompts.build(user_input) {
            Ok(Some(prompt)) => prompt,
            Ok(None) => {
                return TurnOutcome::stopped(TurnStage::Prompting, EMPTY_PROMPT_REPLY.into());
            }
            Err(e) => {
                tracing::warn!(error = %e, "prompt build failed");
                return TurnOutcome::stopped(TurnStage::Prompting, format!("Error: {e}"));
            }
        };

        let mut turn = Turn::begin(user_input, source);

        let raw = match self.provider.chat(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(provider = %self.provider.provider_id(), error = %e, "completion failed");
                return TurnOutcome::stopped(
                    TurnStage::Prompting,
                    format!("Error: {e}\n{}", self.provider.error_hint()),
                );
            }
        };

        // ── Parsing ──
        let parsed = match parser::parse(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, raw_len = raw.len(), "model reply unparseable");
                let reply = format!("(Parse error: {e})");
                turn.message = reply.clone();
                self.persist(&turn).await;
                return TurnOutcome {
                    reply,
                    turn: Some(turn),
                    stage: TurnStage::Parsing,
                };
            }
        };
        turn.message = parsed.message;

        // ── Dispatching ──
        let calls = parsed.actions.unwrap_or_default();
        if !calls.is_empty() {
            tracing::info!(actions = calls.len(), "dispatching actions");
        }
        for call in &calls {
            let outcome = self.dispatcher.dispatch(call, status).await;
            turn.action_results.push(outcome.result);
            if let Some(follow_up) = outcome.follow_up {
                turn.follow_up_results.push(follow_up);
            }
        }

        // ── Persisting ──
        self.persist(&turn).await;

        TurnOutcome {
            reply: turn.compose_reply(),
            turn: Some(turn),
            stage: TurnStage::Done,
        }
    }

    /// Write the artifact (only when the turn dispatched something) and
    /// append this turn to history, off the async workers. Turns persist one
    /// at a time. Failures are logged, never surfaced.
    async fn persist(&self, turn: &Turn) {
        let _guard = self.persist.lock().await;
        let workspace = self.workspace.clone();
        let turn = turn.clone();
        let limit = self.history_limit;
        if let Err(e) = tokio::task::spawn_blocking(move || write_turn(&workspace, &turn, limit)).await {
            tracing::warn!(error = %e, "turn persist task failed");
        }
    }
}

fn write_turn(workspace: &Workspace, turn: &Turn, history_limit: usize) {
    if turn.has_actions() {
        if let Err(e) = workspace.save_artifact(&turn.artifact()) {
            tracing::warn!(error = %e, "artifact write failed");
        }
    }

    let mut history = workspace.load_history(history_limit);
    for result in &turn.follow_up_results {
        history.push(HistoryEntry::follow_up(
            &result.action,
            result.display_text().unwrap_or_default(),
        ));
    }
    history.push(HistoryEntry::input(&turn.user_input, &turn.message));

    if let Err(e) = workspace.save_history(&history) {
        tracing::warn!(error = %e, "history write failed");
    }
    tracing::debug!(entries = history.len(), "turn persisted");
}
