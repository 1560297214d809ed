/// Shared error type used across all SafeClaw crates.
///
/// Turns never surface these to callers directly: the dispatcher and the
/// turn engine render them into result payloads or reply text.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level failure talking to a provider, the hub or a bot API.
    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// The completion backend answered, but not with a usable reply.
    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// A workspace file exists but holds the wrong shape of data.
    #[error("workspace {file}: {message}")]
    Workspace { file: String, message: String },

    /// A channel backend rejected a request.
    #[error("channel {channel}: {message}")]
    Channel { channel: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
