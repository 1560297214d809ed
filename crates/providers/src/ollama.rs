//! Ollama adapter. Talks to a local `ollama serve` over its native
//! `/api/chat` endpoint with streaming disabled.

use std::time::Duration;

use serde_json::Value;

use sc_domain::config::LlmConfig;
use sc_domain::error::{Error, Result};

use crate::traits::CompletionProvider;
use crate::util::{from_reqwest, post_json};

pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: cfg.resolved_base_url().trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            client,
        })
    }

    fn build_body(&self, prompt: &str) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        })
    }
}

fn parse_chat_response(body: &Value) -> Result<String> {
    body.get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| Error::Provider {
            provider: "ollama".into(),
            message: body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("no message content in response")
                .to_string(),
        })
}

#[async_trait::async_trait]
impl CompletionProvider for OllamaProvider {
    async fn chat(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!(url = %url, model = %self.model, prompt_len = prompt.len(), "ollama chat request");
        let body = post_json(self.client.post(&url), "ollama", &self.build_body(prompt)).await?;
        parse_chat_response(&body)
    }

    fn provider_id(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn error_hint(&self) -> &str {
        "(Make sure Ollama is running: ollama serve, ollama pull <model>)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_is_single_user_message() {
        let provider = OllamaProvider::from_config(&LlmConfig::default()).unwrap();
        let body = provider.build_body("hi");
        assert_eq!(body["model"], "llama3.1:8B");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
    }

    #[test]
    fn parses_message_content() {
        let body = json!({"model": "m", "message": {"role": "assistant", "content": "Done."}});
        assert_eq!(parse_chat_response(&body).unwrap(), "Done.");
    }

    #[test]
    fn surfaces_error_field() {
        let body = json!({"error": "model 'x' not found"});
        let err = parse_chat_response(&body).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
