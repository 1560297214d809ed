//! Action dispatch: run one call locally or through the broker, then
//! resolve at most one declared follow-up.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;

use sc_broker::BrokerClient;
use sc_domain::config::BrokerConfig;
use sc_domain::{ActionCall, ActionResult};

use crate::capability::{LocalRegistry, Resolution};

/// Receives the short progress lines shown while a turn is dispatching
/// (`Executing agent action (X)...`).
pub trait StatusSink: Send + Sync {
    fn status(&self, line: &str);
}

impl<F> StatusSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn status(&self, line: &str) {
        self(line)
    }
}

/// A dispatched call plus the outcome of its follow-up, if it declared one.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub result: ActionResult,
    pub follow_up: Option<ActionResult>,
}

pub struct ActionDispatcher {
    local: LocalRegistry,
    broker: Arc<BrokerClient>,
    thinking: bool,
}

impl ActionDispatcher {
    /// Without a `broker`, remote actions go to a client with no queue and
    /// fail once the default broker timeout has elapsed.
    pub fn new(local: LocalRegistry, broker: Option<Arc<BrokerClient>>) -> Self {
        let broker = broker
            .unwrap_or_else(|| Arc::new(BrokerClient::unconfigured(BrokerConfig::default().timeout())));
        Self {
            local,
            broker,
            thinking: true,
        }
    }

    /// Emit progress lines through the caller's [`StatusSink`].
    pub fn with_thinking(mut self, thinking: bool) -> Self {
        self.thinking = thinking;
        self
    }

    pub fn local(&self) -> &LocalRegistry {
        &self.local
    }

    pub fn resolve(&self, action: &str) -> Resolution {
        self.local.resolve(action)
    }

    /// Dispatch `call`, then its follow-up exactly once. A follow-up's own
    /// follow-up is never run, and a failed follow-up does not change the
    /// parent's result.
    pub async fn dispatch(&self, call: &ActionCall, status: &dyn StatusSink) -> DispatchOutcome {
        let result = self.dispatch_once(call, status).await;

        let follow_up = match &result.follow_up {
            Some(next) => {
                tracing::info!(parent = %call.name, follow_up = %next.name, "running follow-up action");
                let outcome = self.dispatch_once(next, status).await;
                if !outcome.is_ok() {
                    tracing::warn!(
                        parent = %call.name,
                        follow_up = %next.name,
                        error = outcome.error().unwrap_or("skipped"),
                        "follow-up action did not succeed"
                    );
                }
                if let Some(nested) = &outcome.follow_up {
                    tracing::debug!(follow_up = %next.name, nested = %nested.name, "nested follow-up ignored");
                }
                Some(outcome)
            }
            None => None,
        };

        DispatchOutcome { result, follow_up }
    }

    /// Run a single call with no follow-up handling. Never fails: every
    /// error becomes a `failed` result.
    pub async fn dispatch_once(&self, call: &ActionCall, status: &dyn StatusSink) -> ActionResult {
        let started = Instant::now();
        let result = match self.local.resolve(&call.name) {
            Resolution::Local(capability) => {
                if self.thinking {
                    status.status(&format!("Executing agent action ({})...", call.name));
                }
                match AssertUnwindSafe(capability.execute(call.params.clone()))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(payload)) => ActionResult::ok(&call.name, payload),
                    Ok(Err(e)) => ActionResult::failed(&call.name, e.to_string()),
                    Err(panic) => {
                        let msg = panic_message(panic.as_ref());
                        tracing::error!(action = %call.name, panic = %msg, "local action panicked");
                        ActionResult::failed(&call.name, format!("capability panicked: {msg}"))
                    }
                }
            }
            Resolution::Remote => {
                if self.thinking {
                    status.status(&format!("Waiting for router ({})...", call.name));
                }
                self.dispatch_remote(call).await
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if result.is_ok() {
            tracing::info!(action = %call.name, elapsed_ms, "action completed");
        } else {
            tracing::warn!(
                action = %call.name,
                status = ?result.status,
                elapsed_ms,
                error = result.error().unwrap_or(""),
                "action did not complete"
            );
        }
        result
    }

    async fn dispatch_remote(&self, call: &ActionCall) -> ActionResult {
        let broker = &self.broker;
        match broker.call(&call.name, call.params.clone()).await {
            Some(response) => response.into_action_result(),
            None => ActionResult::failed(
                &call.name,
                format!(
                    "timed out after {}s waiting for router",
                    broker.timeout().as_secs_f64()
                ),
            ),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::{json, Map, Value};

    use sc_broker::{CapabilityError, CapabilityResult, MemoryQueue};
    use sc_domain::ActionStatus;

    use crate::capability::LocalCapability;

    struct Counting {
        calls: Arc<AtomicUsize>,
        reply: Value,
    }

    #[async_trait::async_trait]
    impl LocalCapability for Counting {
        async fn execute(&self, _params: Map<String, Value>) -> CapabilityResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.as_object().cloned().unwrap_or_default())
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl LocalCapability for Failing {
        async fn execute(&self, _params: Map<String, Value>) -> CapabilityResult {
            Err(CapabilityError::Failed("disk full".into()))
        }
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl LocalCapability for Panicking {
        async fn execute(&self, _params: Map<String, Value>) -> CapabilityResult {
            panic!("boom")
        }
    }

    fn call(name: &str) -> ActionCall {
        ActionCall::new(name, Map::new())
    }

    fn lines() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            move |line: &str| seen.lock().push(line.to_string())
        };
        (seen, sink)
    }

    #[tokio::test]
    async fn local_error_becomes_failed_result() {
        let mut registry = LocalRegistry::new();
        registry.register("WRITE", Failing);
        let dispatcher = ActionDispatcher::new(registry, None);
        let (seen, sink) = lines();

        let result = dispatcher.dispatch_once(&call("write"), &sink).await;
        assert_eq!(result.status, ActionStatus::Failed);
        assert_eq!(result.error(), Some("failed: disk full"));
        assert_eq!(*seen.lock(), vec!["Executing agent action (WRITE)...".to_string()]);
    }

    #[tokio::test]
    async fn local_panic_becomes_failed_result() {
        let mut registry = LocalRegistry::new();
        registry.register("BOOM", Panicking);
        let dispatcher = ActionDispatcher::new(registry, None);

        let result = dispatcher.dispatch_once(&call("BOOM"), &|_: &str| {}).await;
        assert_eq!(result.status, ActionStatus::Failed);
        assert_eq!(result.error(), Some("capability panicked: boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_without_router_waits_out_the_timeout() {
        let dispatcher = ActionDispatcher::new(LocalRegistry::new(), None);
        let start = tokio::time::Instant::now();

        let result = dispatcher.dispatch_once(&call("PING"), &|_: &str| {}).await;

        assert_eq!(result.status, ActionStatus::Failed);
        assert!(result.error().unwrap().contains("timed out after 10s"));
        assert_eq!(start.elapsed(), BrokerConfig::default().timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn unconfigured_client_uses_its_own_timeout() {
        let broker = Arc::new(BrokerClient::unconfigured(Duration::from_secs(3)));
        let dispatcher = ActionDispatcher::new(LocalRegistry::new(), Some(broker));
        let start = tokio::time::Instant::now();

        let result = dispatcher.dispatch_once(&call("PING"), &|_: &str| {}).await;

        assert!(result.error().unwrap().contains("timed out after 3s"));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn unregistered_action_goes_to_broker() {
        let queue = Arc::new(MemoryQueue::new());
        let broker = Arc::new(BrokerClient::new(queue.clone(), Duration::from_secs(2)));
        let dispatcher = ActionDispatcher::new(LocalRegistry::new(), Some(broker));
        let (seen, sink) = lines();

        let result = dispatcher.dispatch_once(&call("PING"), &sink).await;

        assert_eq!(result.status, ActionStatus::Failed);
        assert!(result.error().unwrap().contains("timed out after 2s"));
        assert_eq!(queue.len(sc_protocol::COMMAND_QUEUE), 1);
        assert_eq!(*seen.lock(), vec!["Waiting for router (PING)...".to_string()]);
    }

    #[tokio::test]
    async fn thinking_off_is_silent() {
        let mut registry = LocalRegistry::new();
        registry.register("WRITE", Failing);
        let dispatcher = ActionDispatcher::new(registry, None).with_thinking(false);
        let (seen, sink) = lines();
        dispatcher.dispatch_once(&call("WRITE"), &sink).await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn follow_up_runs_exactly_once() {
        let parent_calls = Arc::new(AtomicUsize::new(0));
        let child_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = LocalRegistry::new();
        registry
            .register(
                "FETCH",
                Counting {
                    calls: parent_calls.clone(),
                    reply: json!({"text": "fetched", "follow_up": {"name": "summarise", "params": {"n": 1}}}),
                },
            )
            .register(
                "SUMMARISE",
                Counting {
                    calls: child_calls.clone(),
                    // Declares another follow-up, which must be ignored.
                    reply: json!({"output": "short", "follow_up": {"name": "fetch"}}),
                },
            );
        let dispatcher = ActionDispatcher::new(registry, None);

        let outcome = dispatcher.dispatch(&call("FETCH"), &|_: &str| {}).await;

        assert_eq!(parent_calls.load(Ordering::SeqCst), 1);
        assert_eq!(child_calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.result.action, "FETCH");
        assert_eq!(outcome.result.payload["text"], "fetched");
        let follow_up = outcome.follow_up.unwrap();
        assert_eq!(follow_up.action, "SUMMARISE");
        assert_eq!(follow_up.payload["output"], "short");
    }

    #[tokio::test]
    async fn failed_follow_up_leaves_parent_ok() {
        let mut registry = LocalRegistry::new();
        registry
            .register(
                "FETCH",
                Counting {
                    calls: Arc::new(AtomicUsize::new(0)),
                    reply: json!({"follow_up": {"name": "WRITE"}}),
                },
            )
            .register("WRITE", Failing);
        let dispatcher = ActionDispatcher::new(registry, None);

        let outcome = dispatcher.dispatch(&call("FETCH"), &|_: &str| {}).await;
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.follow_up.unwrap().status, ActionStatus::Failed);
    }

    #[tokio::test]
    async fn no_follow_up_declared() {
        let mut registry = LocalRegistry::new();
        registry.register(
            "FETCH",
            Counting {
                calls: Arc::new(AtomicUsize::new(0)),
                reply: json!({"text": "ok"}),
            },
        );
        let dispatcher = ActionDispatcher::new(registry, None);
        let outcome = dispatcher.dispatch(&call("FETCH"), &|_: &str| {}).await;
        assert!(outcome.follow_up.is_none());
    }
}
