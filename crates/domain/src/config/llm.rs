use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM completion provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Which adapter to use. Falls back to `LLM_PROVIDER`.
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model name. Falls back to `LLM_MODEL`.
    #[serde(default = "d_model")]
    pub model: String,
    /// Override the adapter's default base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key (OpenAI-compatible only).
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: d_model(),
            base_url: None,
            api_key_env: d_api_key_env(),
            timeout_ms: d_timeout_ms(),
        }
    }
}

impl LlmConfig {
    /// Base URL to use, either the configured one or the adapter default.
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenaiCompat,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenaiCompat => "openai_compat",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::OpenaiCompat => "https://api.openai.com/v1",
        }
    }

    /// Parse the value of `LLM_PROVIDER`. Accepts `openai` as an alias.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "openai_compat" | "openai-compat" => Some(Self::OpenaiCompat),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn d_model() -> String {
    "llama3.1:8B".into()
}
fn d_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_timeout_ms() -> u64 {
    120_000
}
