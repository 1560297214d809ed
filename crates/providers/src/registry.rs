//! Provider factory.
//!
//! Reads the [`LlmConfig`] and instantiates the adapter it names.

use std::sync::Arc;

use sc_domain::config::{LlmConfig, ProviderKind};
use sc_domain::error::Result;

use crate::ollama::OllamaProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::CompletionProvider;

/// Build the configured completion provider.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>> {
    let provider: Arc<dyn CompletionProvider> = match config.provider {
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_config(config)?),
        ProviderKind::OpenaiCompat => Arc::new(OpenAiCompatProvider::from_config(config)?),
    };
    tracing::info!(
        provider = %provider.provider_id(),
        model = %provider.model(),
        base_url = %config.resolved_base_url(),
        "completion provider ready"
    );
    Ok(provider)
}
