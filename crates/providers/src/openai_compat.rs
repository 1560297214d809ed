//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, vLLM, LM Studio, Together, and any other endpoint
//! that follows the OpenAI chat completions contract.

use std::time::Duration;

use serde_json::Value;

use sc_domain::config::LlmConfig;
use sc_domain::error::{Error, Result};

use crate::traits::CompletionProvider;
use crate::util::{from_reqwest, post_json};

pub struct OpenAiCompatProvider {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Build from config, reading the API key from `cfg.api_key_env`.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!("{} not set for provider=openai_compat", cfg.api_key_env))
            })?;
        Self::with_key(cfg, api_key)
    }

    pub fn with_key(cfg: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: cfg.resolved_base_url().trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key: api_key.into(),
            client,
        })
    }

    fn build_body(&self, prompt: &str) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(body: &Value) -> Result<String> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: "openai_compat".into(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Provider {
        provider: "openai_compat".into(),
        message: "no message in choice".into(),
    })?;

    Ok(message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string())
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    async fn chat(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(url = %url, model = %self.model, "openai_compat chat request");
        let request = self.client.post(&url).bearer_auth(&self.api_key);
        let body = post_json(request, "openai_compat", &self.build_body(prompt)).await?;
        parse_chat_response(&body)
    }

    fn provider_id(&self) -> &str {
        "openai_compat"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_first_choice() {
        let body = json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "Hello"}, "finish_reason": "stop"}]
        });
        assert_eq!(parse_chat_response(&body).unwrap(), "Hello");
    }

    #[test]
    fn missing_choices_is_provider_error() {
        let err = parse_chat_response(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }

    #[test]
    fn null_content_is_empty() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": null}}]});
        assert_eq!(parse_chat_response(&body).unwrap(), "");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let cfg = LlmConfig {
            base_url: Some("http://localhost:8000/v1/".into()),
            ..LlmConfig::default()
        };
        let provider = OpenAiCompatProvider::with_key(&cfg, "k").unwrap();
        assert_eq!(provider.base_url, "http://localhost:8000/v1");
    }
}
