//! Error types for the broker client, worker and capabilities.

/// Errors raised by queue transports and the broker worker.
///
/// The client never surfaces these to its caller: every failure inside
/// [`BrokerClient::call_remote`](crate::BrokerClient::call_remote) is logged
/// and turned into `None`.
#[derive(thiserror::Error, Debug)]
pub enum BrokerError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("shutdown")]
    Shutdown,
}

impl From<reqwest::Error> for BrokerError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Result type for capability handlers.
pub type CapabilityResult = Result<serde_json::Map<String, serde_json::Value>, CapabilityError>;

/// Errors a remote capability can return.
///
/// The worker translates these into a `status: "error"` response with the
/// message in the `error` field.
#[derive(thiserror::Error, Debug, Clone)]
pub enum CapabilityError {
    #[error("invalid_params: {0}")]
    InvalidParams(String),
    #[error("failed: {0}")]
    Failed(String),
    #[error("not_found: {0}")]
    NotFound(String),
}
