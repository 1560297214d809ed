//! Broker server: the long-running worker loop on the router side.
//!
//! Each iteration pops one command from the head of the command queue with
//! a short timeout, so a shutdown request is observed within one poll
//! interval. A command is decoded, checked against the per-action enable
//! policy, resolved through the [`RemoteRegistry`] naming convention,
//! executed, and answered with exactly one [`ResponseEnvelope`] on the
//! response key of its `message_id`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use sc_domain::config::{BrokerConfig, RouterConfig};
use sc_domain::normalize_action_name;
use sc_protocol::{response_key_with, CommandEnvelope, ResponseEnvelope};

use crate::capability::{capability_type_name, CapabilityContext, RemoteRegistry};
use crate::error::BrokerError;
use crate::http::HttpQueue;
use crate::transport::QueueTransport;

/// Back-off after a failed poll so an unreachable hub is not hammered.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub struct BrokerServer {
    transport: Arc<dyn QueueTransport>,
    registry: RemoteRegistry,
    policy: RouterConfig,
    command_queue: String,
    response_prefix: String,
    poll_interval: Duration,
}

impl BrokerServer {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        registry: RemoteRegistry,
        broker: &BrokerConfig,
        policy: RouterConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            policy,
            command_queue: broker.command_queue.clone(),
            response_prefix: broker.response_prefix.clone(),
            poll_interval: broker.poll_interval(),
        }
    }

    /// Connect to the queue hub named by `broker.url`.
    ///
    /// Refuses to build a worker without a queue address.
    pub fn connect(
        broker: &BrokerConfig,
        registry: RemoteRegistry,
        policy: RouterConfig,
    ) -> Result<Self, BrokerError> {
        let url = broker
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                BrokerError::Config("broker.url (or SC_BROKER_URL) is required to run the router".into())
            })?;
        let transport = Arc::new(HttpQueue::new(url)?);
        Ok(Self::new(transport, registry, broker, policy))
    }

    pub fn registry(&self) -> &RemoteRegistry {
        &self.registry
    }

    /// Run until `shutdown` is cancelled. The in-progress poll is allowed to
    /// finish (and any command it returned is served) before the loop exits.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            queue = %self.command_queue,
            actions = ?self.registry.action_names(),
            "router worker started"
        );

        while !shutdown.is_cancelled() {
            match self.transport.pop(&self.command_queue, self.poll_interval).await {
                Ok(Some(raw)) => self.serve_raw(&raw, &shutdown).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "command queue poll failed");
                    tokio::select! {
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                        _ = shutdown.cancelled() => {}
                    }
                }
            }
        }

        tracing::info!("router worker stopped");
    }

    /// Decode one raw command and publish its response. Never panics.
    pub async fn serve_raw(&self, raw: &str, shutdown: &CancellationToken) {
        let envelope = match serde_json::from_str::<CommandEnvelope>(raw) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, "undecodable command");
                // Answer if we can still tell who asked.
                if let Some(message_id) = CommandEnvelope::salvage_message_id(raw) {
                    let resp = ResponseEnvelope::error("", format!("undecodable command: {e}"));
                    self.respond(&message_id, &resp).await;
                }
                return;
            }
        };

        let message_id = envelope.message_id.clone();
        let response = self.process(envelope, shutdown.child_token()).await;
        self.respond(&message_id, &response).await;
    }

    /// Apply the enable policy, resolve and execute. Always yields a
    /// response.
    pub async fn process(&self, envelope: CommandEnvelope, cancel: CancellationToken) -> ResponseEnvelope {
        let action = normalize_action_name(&envelope.action);

        if !self.policy.is_enabled(&action) {
            tracing::info!(action = %action, "action disabled, skipping");
            return ResponseEnvelope::skipped(
                &action,
                format!("Action {action} is disabled in config"),
            );
        }

        let Some(capability) = self.registry.resolve(&action) else {
            tracing::warn!(
                action = %action,
                capability = %capability_type_name(&action),
                "no capability registered"
            );
            return ResponseEnvelope::error(
                &action,
                format!("no capability {} for action {action}", capability_type_name(&action)),
            );
        };

        let ctx = CapabilityContext {
            message_id: envelope.message_id.clone(),
            action: action.clone(),
            cancel,
        };

        tracing::info!(action = %action, message_id = %envelope.message_id, "executing remote action");

        match AssertUnwindSafe(capability.execute(ctx, envelope.params))
            .catch_unwind()
            .await
        {
            Ok(Ok(payload)) => ResponseEnvelope::ok(&action, payload),
            Ok(Err(e)) => {
                tracing::warn!(action = %action, error = %e, "remote action failed");
                ResponseEnvelope::error(&action, e.to_string())
            }
            Err(_) => {
                tracing::error!(action = %action, "remote action panicked");
                ResponseEnvelope::error(&action, "capability panicked")
            }
        }
    }

    async fn respond(&self, message_id: &str, response: &ResponseEnvelope) {
        let key = response_key_with(&self.response_prefix, message_id);
        let body = match serde_json::to_string(response) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(message_id = %message_id, error = %e, "response encode failed");
                return;
            }
        };
        if let Err(e) = self.transport.push(&key, body).await {
            tracing::warn!(message_id = %message_id, error = %e, "response publish failed");
        }
    }
}
