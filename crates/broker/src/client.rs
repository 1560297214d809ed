//! Broker client: publishes a command and waits for its correlated
//! response with a hard wall-clock bound.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use sc_domain::config::BrokerConfig;
use sc_protocol::{response_key_with, CommandEnvelope, ResponseEnvelope, COMMAND_QUEUE, RESPONSE_PREFIX};

use crate::error::BrokerError;
use crate::transport::{QueueTransport, UnconfiguredQueue};

pub struct BrokerClient {
    transport: Arc<dyn QueueTransport>,
    command_queue: String,
    response_prefix: String,
    timeout: Duration,
    shutdown: CancellationToken,
}

impl BrokerClient {
    pub fn new(transport: Arc<dyn QueueTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            command_queue: COMMAND_QUEUE.into(),
            response_prefix: RESPONSE_PREFIX.into(),
            timeout,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(transport: Arc<dyn QueueTransport>, config: &BrokerConfig) -> Self {
        Self {
            transport,
            command_queue: config.command_queue.clone(),
            response_prefix: config.response_prefix.clone(),
            timeout: config.timeout(),
            shutdown: CancellationToken::new(),
        }
    }

    /// A client with no queue behind it. Every call fails after `timeout`.
    pub fn unconfigured(timeout: Duration) -> Self {
        Self::new(Arc::new(UnconfiguredQueue), timeout)
    }

    /// Abandon in-flight waits when `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `action` on a remote worker using the configured timeout.
    pub async fn call(&self, action: &str, params: Map<String, Value>) -> Option<ResponseEnvelope> {
        self.call_remote(action, params, self.timeout).await
    }

    /// Publish a command for `action` and wait up to `timeout` for the one
    /// response keyed by its `message_id`.
    ///
    /// Returns `None` on timeout, transport failure or an undecodable
    /// response. Every `None` is returned only once the full `timeout` has
    /// elapsed (or shutdown was requested), so a caller's worst-case latency
    /// per action is the same whatever went wrong. Never returns an error.
    pub async fn call_remote(
        &self,
        action: &str,
        params: Map<String, Value>,
        timeout: Duration,
    ) -> Option<ResponseEnvelope> {
        let deadline = Instant::now() + timeout;
        let envelope = CommandEnvelope::new(action, params);
        let message_id = envelope.message_id.clone();
        let key = response_key_with(&self.response_prefix, &message_id);

        // Arm the listener before publishing.
        let mut listener = {
            let transport = self.transport.clone();
            let key = key.clone();
            tokio::spawn(async move { transport.pop(&key, timeout).await })
        };

        if let Err(e) = self.publish(&envelope).await {
            tracing::warn!(
                action = %action,
                message_id = %message_id,
                error = %e,
                "command publish failed"
            );
        }

        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                listener.abort();
                tracing::debug!(action = %action, message_id = %message_id, "remote call abandoned on shutdown");
                return None;
            }
            joined = tokio::time::timeout_at(deadline, &mut listener) => joined,
        };

        match outcome {
            Ok(Ok(Ok(Some(raw)))) => match serde_json::from_str::<ResponseEnvelope>(&raw) {
                Ok(resp) => return Some(resp),
                Err(e) => {
                    tracing::warn!(message_id = %message_id, error = %e, "undecodable response");
                }
            },
            Ok(Ok(Ok(None))) => {
                tracing::warn!(
                    action = %action,
                    message_id = %message_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "no response before timeout"
                );
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(message_id = %message_id, error = %e, "response wait failed");
            }
            Ok(Err(e)) => {
                tracing::warn!(message_id = %message_id, error = %e, "response listener task failed");
            }
            Err(_) => {
                listener.abort();
                tracing::warn!(
                    action = %action,
                    message_id = %message_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "remote call timed out"
                );
            }
        }

        // Early failures still cost the full timeout.
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = self.shutdown.cancelled() => {}
        }
        None
    }

    async fn publish(&self, envelope: &CommandEnvelope) -> Result<(), BrokerError> {
        let body = serde_json::to_string(envelope)?;
        self.transport.push(&self.command_queue, body).await
    }
}
