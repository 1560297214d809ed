//! Queue hub: an HTTP service exposing the two queue primitives over a
//! [`MemoryQueue`], persisting every list to a snapshot file after each
//! mutation so queued commands survive a restart.
//!
//! Routes:
//! - `POST /v1/queues/:key`            body `{"value": ".."}` → 204
//! - `POST /v1/queues/:key/pop?timeout_ms=N` → 200 `{"value": ".."}` or 204
//! - `GET  /health`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use sc_domain::config::HubConfig;

use crate::error::BrokerError;
use crate::http::{PopBody, PushBody};
use crate::memory::MemoryQueue;

/// How often the hub drops expired response keys.
pub const REAP_INTERVAL: Duration = Duration::from_secs(30);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct HubState {
    queue: Arc<MemoryQueue>,
    snapshot: Option<Arc<SnapshotFile>>,
    max_pop: Duration,
}

impl HubState {
    /// Build the hub state from config, restoring queued values from
    /// `hub.data_file` when it exists. Keys under `response_prefix` expire
    /// `hub.response_ttl_secs` after their last push.
    pub fn open(config: &HubConfig, response_prefix: &str) -> Result<Self, BrokerError> {
        let ttl = Duration::from_secs(config.response_ttl_secs);
        let (queue, snapshot) = match &config.data_file {
            Some(path) => {
                let file = SnapshotFile::new(path.clone());
                let restored = file.load()?;
                let pending: usize = restored.values().map(Vec::len).sum();
                if pending > 0 {
                    tracing::info!(
                        path = %file.path.display(),
                        pending,
                        "restored queued values from snapshot"
                    );
                }
                (MemoryQueue::from_snapshot(restored), Some(Arc::new(file)))
            }
            None => (MemoryQueue::new(), None),
        };
        Ok(Self {
            queue: Arc::new(queue.with_expiry(response_prefix, ttl)),
            snapshot,
            max_pop: Duration::from_millis(config.max_pop_ms),
        })
    }

    pub fn in_memory(max_pop: Duration) -> Self {
        Self {
            queue: Arc::new(MemoryQueue::new()),
            snapshot: None,
            max_pop,
        }
    }

    pub fn queue(&self) -> &Arc<MemoryQueue> {
        &self.queue
    }

    /// Write the current queue state to the snapshot file, if there is one.
    ///
    /// Snapshots are taken while holding the file's writer lock, so writes
    /// land in version order and a state already on disk is not rewritten.
    pub async fn persist(&self) {
        let Some(file) = &self.snapshot else {
            return;
        };
        let mut written = file.written.lock().await;
        let (version, lists) = self.queue.versioned_snapshot();
        if version == *written {
            return;
        }

        let path = file.path.clone();
        match tokio::task::spawn_blocking(move || write_snapshot(&path, &lists)).await {
            Ok(Ok(())) => *written = version,
            Ok(Err(e)) => {
                tracing::warn!(path = %file.path.display(), error = %e, "queue snapshot write failed");
            }
            Err(e) => {
                tracing::warn!(path = %file.path.display(), error = %e, "queue snapshot task failed");
            }
        }
    }

    /// Drop expired keys and persist when any went.
    pub async fn reap_expired(&self) -> usize {
        let removed = self.queue.reap();
        if removed > 0 {
            tracing::info!(removed, "dropped unclaimed response keys");
            self.persist().await;
        }
        removed
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshot file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct SnapshotFile {
    path: PathBuf,
    /// Version of the last snapshot on disk. Held across each write.
    written: tokio::sync::Mutex<u64>,
}

impl SnapshotFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            written: tokio::sync::Mutex::new(0),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, Vec<String>>, BrokerError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(BrokerError::Transport(format!(
                "reading {}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// Write to a temp file in the same directory, then rename over `path`.
fn write_snapshot(path: &Path, lists: &BTreeMap<String, Vec<String>>) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut tmp, lists)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn router(state: HubState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/queues/:key", post(push))
        .route("/v1/queues/:key/pop", post(pop))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the hub on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: HubState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let final_state = state.clone();
    let reaper = {
        let state = state.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(REAP_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                state.reap_expired().await;
            }
        })
    };

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await;
    reaper.abort();
    final_state.persist().await;
    served
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn push(
    State(state): State<HubState>,
    UrlPath(key): UrlPath<String>,
    Json(body): Json<PushBody>,
) -> StatusCode {
    state.queue.push_back(&key, body.value);
    state.persist().await;
    tracing::debug!(key = %key, depth = state.queue.len(&key), "pushed");
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct PopQuery {
    #[serde(default)]
    timeout_ms: u64,
}

async fn pop(
    State(state): State<HubState>,
    UrlPath(key): UrlPath<String>,
    Query(query): Query<PopQuery>,
) -> Response {
    let timeout = Duration::from_millis(query.timeout_ms).min(state.max_pop);
    match state.queue.pop_wait(&key, timeout).await {
        Some(value) => {
            state.persist().await;
            Json(PopBody { value }).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
