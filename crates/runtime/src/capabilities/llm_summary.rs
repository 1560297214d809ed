//! `LLM_SUMMARY`: summarise a captured page through the completion
//! provider.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use sc_broker::{CapabilityError, CapabilityResult};
use sc_providers::CompletionProvider;

use crate::capability::LocalCapability;
use crate::workspace::Workspace;

pub const ACTION: &str = "LLM_SUMMARY";

const SUMMARY_PROMPT: &str =
    "Summary in 100 words or less to the following content of a website body: \n";

pub struct LlmSummaryCapability {
    workspace: Workspace,
    provider: Arc<dyn CompletionProvider>,
}

impl LlmSummaryCapability {
    pub fn new(workspace: Workspace, provider: Arc<dyn CompletionProvider>) -> Self {
        Self { workspace, provider }
    }

    /// Relative names resolve by file name under `workspace/output/`.
    fn resolve(&self, content: &str) -> Result<PathBuf, CapabilityError> {
        let path = Path::new(content);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let name = path
            .file_name()
            .ok_or_else(|| CapabilityError::InvalidParams(format!("content is not a file: {content}")))?;
        Ok(self.workspace.output_dir().join(name))
    }
}

#[async_trait::async_trait]
impl LocalCapability for LlmSummaryCapability {
    async fn execute(&self, params: Map<String, Value>) -> CapabilityResult {
        let content = params
            .get("content")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| CapabilityError::InvalidParams("missing content".into()))?;

        let path = self.resolve(content.trim())?;
        let body = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CapabilityError::NotFound(format!("{}: {e}", path.display()))
        })?;

        // Provider failures become the summary text, not a failed action.
        let output = match self.provider.chat(&format!("{SUMMARY_PROMPT}{body}")).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, hint = %self.provider.error_hint(), "summary request failed");
                format!("Error: {e}")
            }
        };

        let mut out = Map::new();
        out.insert("output".into(), Value::String(output));
        Ok(out)
    }
}
