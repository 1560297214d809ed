//! Prompt assembly from the workspace template.

use serde_json::Value;

use sc_domain::error::Result;

use crate::workspace::{
    Workspace, AGENT_ACTIONS_FILE, ARTIFACT_FILE, HISTORY_FILE, MEMORY_FILE, PROMPT_CACHE_FILE,
    PROMPT_FILE, ROUTER_ACTIONS_FILE, SOUL_FILE,
};

const DEFAULT_TEMPLATE: &str = "{{USER_MESSAGE}}";
const DEFAULT_SOUL: &str = "You are SafeClaw.";
const NO_ARTIFACT: &str = "(No artifact)";

/// Neutralise closing tags so user text cannot end its own block early.
pub fn escape_user_input(text: &str) -> String {
    text.replace("</user_input>", "[REDACTED TAG]")
        .replace("</", "<\\/")
}

/// Renders `PROMPT.md` with the workspace state and the user's message.
pub struct PromptBuilder {
    workspace: Workspace,
}

impl PromptBuilder {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    /// Build the prompt for `user_input`. Returns `Ok(None)` when the input
    /// is empty once trimmed and escaped. The rendered prompt is also
    /// written to `output/prompt_cache.txt`.
    pub fn build(&self, user_input: &str) -> Result<Option<String>> {
        let message = escape_user_input(user_input.trim());
        if message.is_empty() {
            return Ok(None);
        }

        let template = self
            .workspace
            .read_text(PROMPT_FILE)?
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
        let soul = self
            .workspace
            .read_text(SOUL_FILE)?
            .unwrap_or_else(|| DEFAULT_SOUL.to_string());

        let prompt = template
            .replace("{{MEMORY_CONTENT}}", &self.json_block(MEMORY_FILE, "{}", false)?)
            .replace("{{ARTIFACT}}", &self.artifact_block()?)
            .replace("{{USER_INPUT_HISTORY}}", &self.json_block(HISTORY_FILE, "[]", true)?)
            .replace("{{SOUL_CONTENT}}", &soul)
            .replacen("{{AGENT_ACTIONS}}", &self.json_block(AGENT_ACTIONS_FILE, "[]", true)?, 1)
            .replacen("{{ROUTER_ACTIONS}}", &self.json_block(ROUTER_ACTIONS_FILE, "[]", true)?, 1)
            .replace("{{USER_MESSAGE}}", &message);

        let out_dir = self.workspace.output_dir();
        std::fs::create_dir_all(&out_dir)?;
        std::fs::write(out_dir.join(PROMPT_CACHE_FILE), &prompt)?;
        tracing::debug!(chars = prompt.len(), "prompt built");

        Ok(Some(prompt))
    }

    /// Pretty-printed JSON file contents. Missing or empty files give
    /// `default`; undecodable files are passed through verbatim. With
    /// `as_list`, a non-list value is wrapped in a one-element list.
    fn json_block(&self, name: &str, default: &str, as_list: bool) -> Result<String> {
        let raw = match self.workspace.read_text(name)? {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(default.to_string()),
        };
        let value = match serde_json::from_str::<Value>(&raw) {
            Ok(v) => v,
            Err(_) => return Ok(raw),
        };
        let value = match value {
            Value::Array(_) => value,
            other if as_list => Value::Array(vec![other]),
            other => other,
        };
        Ok(serde_json::to_string_pretty(&value)?)
    }

    fn artifact_block(&self) -> Result<String> {
        match self.workspace.read_text(ARTIFACT_FILE)? {
            None => Ok(NO_ARTIFACT.to_string()),
            Some(_) => self.json_block(ARTIFACT_FILE, "{}", false),
        }
    }
}
