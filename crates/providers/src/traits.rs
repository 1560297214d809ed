use sc_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single-shot text completion: one user prompt in, the model's reply out.
///
/// Implementations are provider-specific adapters that translate the prompt
/// into the wire format of the provider's HTTP API.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send `prompt` as a single user message and return the reply text.
    async fn chat(&self, prompt: &str) -> Result<String>;

    /// A short identifier for logs and the startup banner (e.g. `ollama`).
    fn provider_id(&self) -> &str;

    /// Model name requests are sent to.
    fn model(&self) -> &str;

    /// Hint appended to user-visible errors from [`chat`](Self::chat).
    fn error_hint(&self) -> &str {
        "(Check API key in .env)"
    }
}
