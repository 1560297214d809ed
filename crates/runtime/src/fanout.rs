//! Channel fan-out and busy indicators.
//!
//! Every turn starts on one channel (its origin). The hub mirrors the
//! input and the reply to every other channel, and keeps a busy/typing
//! indicator running on those channels while the turn dispatches.
//!
//! ```text
//!   Console ──input──► TurnEngine ──reply──► Console
//!                         │
//!                         ├─ broadcast_receive("[Console] input") ─► Telegram
//!                         ├─ start_busy ─► Telegram (typing every 4 s)
//!                         ├─ stop ───────► Telegram
//!                         └─ broadcast_response(reply) ────────────► Telegram
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sc_domain::error::Result;

/// Interval between busy-indicator refreshes.
pub const BUSY_REFRESH: Duration = Duration::from_secs(4);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ChannelSession
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One I/O surface. Replication and busy indicators are optional; the
/// default implementations do nothing.
#[async_trait::async_trait]
pub trait ChannelSession: Send + Sync {
    /// Unique per process (e.g. `Console`, `Telegram`).
    fn source_name(&self) -> &str;

    /// Deliver `text` to this channel's own user.
    async fn send(&self, text: &str) -> Result<()>;

    /// Show input that arrived on channel `origin`.
    async fn broadcast_receive(&self, _text: &str, _origin: &str) {}

    /// Show the reply to a turn that started on channel `origin`.
    async fn broadcast_response(&self, _text: &str, _origin: &str) {}

    /// Start a busy indicator. `None` when the channel has none or
    /// nowhere to show it.
    fn start_busy(&self) -> Option<BusyHandle> {
        None
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BusyHandle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A running busy indicator. `stop` is idempotent, and dropping the
/// handle stops it too.
pub struct BusyHandle {
    source: String,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl BusyHandle {
    /// Spawn a refresh loop that runs `refresh` immediately and then every
    /// `interval` until stopped. A refresh still in flight when `stop` is
    /// called is abandoned.
    pub fn spawn<F, Fut>(source: impl Into<String>, interval: Duration, mut refresh: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let source = source.into();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let name = source.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => break,
                            _ = refresh() => {}
                        }
                    }
                }
            }
            tracing::debug!(channel = %name, "busy indicator stopped");
        });

        Self {
            source,
            cancel,
            task: Some(task),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop and wait for the refresh loop to exit.
    pub async fn join(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::debug!(channel = %self.source, error = %e, "busy indicator task ended abnormally");
            }
        }
    }
}

impl Drop for BusyHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Aggregate of the indicators started for one dispatch.
///
/// Hold it across the dispatch; it stops every indicator on `stop()` or
/// on drop, whichever comes first.
pub struct BusyGroup {
    handles: Vec<BusyHandle>,
    stopped: AtomicBool,
}

impl BusyGroup {
    pub fn empty() -> Self {
        Self {
            handles: Vec::new(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Channels with a running indicator.
    pub fn sources(&self) -> Vec<&str> {
        self.handles.iter().map(BusyHandle::source).collect()
    }

    /// Stop every indicator. Later calls are no-ops.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        for handle in &self.handles {
            handle.stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Drop for BusyGroup {
    fn drop(&mut self) {
        self.stop();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ChannelHub
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The set of channel sessions running in this process.
#[derive(Default)]
pub struct ChannelHub {
    sessions: RwLock<Vec<Arc<dyn ChannelSession>>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. A session with the same `source_name` is replaced.
    pub fn register(&self, session: Arc<dyn ChannelSession>) {
        let mut sessions = self.sessions.write();
        sessions.retain(|s| s.source_name() != session.source_name());
        tracing::debug!(channel = %session.source_name(), "channel registered");
        sessions.push(session);
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sessions
            .read()
            .iter()
            .map(|s| s.source_name().to_string())
            .collect()
    }

    pub fn get(&self, source: &str) -> Option<Arc<dyn ChannelSession>> {
        self.sessions
            .read()
            .iter()
            .find(|s| s.source_name() == source)
            .cloned()
    }

    fn others(&self, origin: &str) -> Vec<Arc<dyn ChannelSession>> {
        self.sessions
            .read()
            .iter()
            .filter(|s| s.source_name() != origin)
            .cloned()
            .collect()
    }

    /// Mirror inbound `text` to every channel except `origin`.
    pub async fn broadcast_to_others(&self, text: &str, origin: &str) {
        let others = self.others(origin);
        join_all(others.iter().map(|s| s.broadcast_receive(text, origin))).await;
    }

    /// Mirror a reply to every channel except `origin`.
    pub async fn broadcast_response_to_others(&self, text: &str, origin: &str) {
        let others = self.others(origin);
        join_all(others.iter().map(|s| s.broadcast_response(text, origin))).await;
    }

    /// Start busy indicators on every other channel that supports one.
    pub fn start_busy_except(&self, origin: &str) -> BusyGroup {
        let handles: Vec<BusyHandle> = self
            .others(origin)
            .iter()
            .filter_map(|s| s.start_busy())
            .collect();
        if !handles.is_empty() {
            tracing::debug!(origin = %origin, indicators = handles.len(), "busy indicators started");
        }
        BusyGroup {
            handles,
            stopped: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use parking_lot::Mutex;

    struct Recording {
        name: &'static str,
        busy: bool,
        received: Mutex<Vec<String>>,
        responses: Mutex<Vec<String>>,
        refreshes: Arc<AtomicUsize>,
    }

    impl Recording {
        fn new(name: &'static str, busy: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                busy,
                received: Mutex::new(Vec::new()),
                responses: Mutex::new(Vec::new()),
                refreshes: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    #[async_trait::async_trait]
    impl ChannelSession for Recording {
        fn source_name(&self) -> &str {
            self.name
        }

        async fn send(&self, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn broadcast_receive(&self, text: &str, origin: &str) {
            self.received.lock().push(format!("[{origin}] {text}"));
        }

        async fn broadcast_response(&self, text: &str, _origin: &str) {
            self.responses.lock().push(text.to_string());
        }

        fn start_busy(&self) -> Option<BusyHandle> {
            if !self.busy {
                return None;
            }
            let refreshes = self.refreshes.clone();
            Some(BusyHandle::spawn(self.name, BUSY_REFRESH, move || {
                refreshes.fetch_add(1, Ordering::SeqCst);
                async {}
            }))
        }
    }

    /// Channel that only supports `send`.
    struct Plain;

    #[async_trait::async_trait]
    impl ChannelSession for Plain {
        fn source_name(&self) -> &str {
            "Plain"
        }
        async fn send(&self, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn broadcasts_skip_origin() {
        let hub = ChannelHub::new();
        let console = Recording::new("Console", false);
        let telegram = Recording::new("Telegram", true);
        hub.register(console.clone());
        hub.register(telegram.clone());
        hub.register(Arc::new(Plain));

        hub.broadcast_to_others("hello", "Console").await;
        hub.broadcast_response_to_others("hi there", "Console").await;

        assert!(console.received.lock().is_empty());
        assert!(console.responses.lock().is_empty());
        assert_eq!(*telegram.received.lock(), vec!["[Console] hello".to_string()]);
        assert_eq!(*telegram.responses.lock(), vec!["hi there".to_string()]);
    }

    #[tokio::test]
    async fn register_replaces_same_source() {
        let hub = ChannelHub::new();
        hub.register(Recording::new("Console", false));
        hub.register(Recording::new("Console", false));
        assert_eq!(hub.source_names(), vec!["Console"]);
        assert!(hub.get("Console").is_some());
        assert!(hub.get("Telegram").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn busy_refreshes_until_stopped() {
        let hub = ChannelHub::new();
        let telegram = Recording::new("Telegram", true);
        hub.register(Recording::new("Console", true));
        hub.register(telegram.clone());

        let group = hub.start_busy_except("Console");
        assert_eq!(group.sources(), vec!["Telegram"]);

        // Immediate refresh, then one per interval.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(telegram.refreshes.load(Ordering::SeqCst), 1);
        tokio::time::sleep(BUSY_REFRESH * 2).await;
        assert_eq!(telegram.refreshes.load(Ordering::SeqCst), 3);

        group.stop();
        group.stop();
        assert!(group.is_stopped());

        tokio::time::sleep(BUSY_REFRESH * 5).await;
        assert_eq!(telegram.refreshes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_group_stops_indicators() {
        let hub = ChannelHub::new();
        let telegram = Recording::new("Telegram", true);
        hub.register(telegram.clone());

        {
            let _group = hub.start_busy_except("Console");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let after_drop = telegram.refreshes.load(Ordering::SeqCst);
        tokio::time::sleep(BUSY_REFRESH * 3).await;
        assert_eq!(telegram.refreshes.load(Ordering::SeqCst), after_drop);
    }

    #[tokio::test]
    async fn no_busy_capable_channels_gives_empty_group() {
        let hub = ChannelHub::new();
        hub.register(Arc::new(Plain));
        hub.register(Recording::new("Console", false));
        let group = hub.start_busy_except("Telegram");
        assert!(group.is_empty());
        group.stop();
    }

    #[tokio::test]
    async fn join_waits_for_loop_exit() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handle = BusyHandle::spawn("Test", Duration::from_millis(5), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            async {}
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.join().await;
        let settled = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), settled);
    }
}
