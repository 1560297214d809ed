//! Agent workspace on disk.
//!
//! ```text
//! workspace/
//!   memory.json            long-lived facts, merged by MEMORY_WRITE
//!   input_history.json     bounded rolling history
//!   artifact.json          outcomes of the latest turn's actions
//!   agent_action.json      local action manifest shown to the model
//!   router_actions.json    remote action manifest shown to the model
//!   SOUL.md  PROMPT.md     identity and prompt template
//!   output/                capability outputs, prompt_cache.txt
//! ```
//!
//! Writes go to a temp file beside the target and are renamed into place.
//! Files are read-then-written with no locking across processes.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use sc_domain::error::Result;
use sc_domain::{Artifact, History, HistoryEntry};

pub const MEMORY_FILE: &str = "memory.json";
pub const HISTORY_FILE: &str = "input_history.json";
pub const ARTIFACT_FILE: &str = "artifact.json";
pub const AGENT_ACTIONS_FILE: &str = "agent_action.json";
pub const ROUTER_ACTIONS_FILE: &str = "router_actions.json";
pub const SOUL_FILE: &str = "SOUL.md";
pub const PROMPT_FILE: &str = "PROMPT.md";
pub const OUTPUT_DIR: &str = "output";
pub const PROMPT_CACHE_FILE: &str = "prompt_cache.txt";

/// Files created with a JSON default when missing.
const DEFAULTS: &[(&str, &str)] = &[
    (MEMORY_FILE, "{}"),
    (HISTORY_FILE, "[]"),
    (ARTIFACT_FILE, "{}"),
];

/// Files seeded from a sibling `*_initial` template when missing.
const TEMPLATES: &[(&str, &str)] = &[
    (AGENT_ACTIONS_FILE, "agent_action_initial.json"),
    (ROUTER_ACTIONS_FILE, "router_actions_initial.json"),
    (SOUL_FILE, "SOUL_initial.md"),
];

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Lifecycle
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Create the workspace directory and any missing state files.
    /// Existing files are never overwritten.
    pub fn bootstrap(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.output_dir())?;

        for (name, default) in DEFAULTS {
            let path = self.path(name);
            if !path.exists() {
                std::fs::write(&path, default)?;
                tracing::debug!(file = %name, "workspace file created");
            }
        }

        for (target, template) in TEMPLATES {
            let target_path = self.path(target);
            let template_path = self.path(template);
            if target_path.exists() || !template_path.exists() {
                continue;
            }
            std::fs::copy(&template_path, &target_path)?;
            tracing::debug!(file = %target, template = %template, "workspace file seeded");
        }

        tracing::info!(path = %self.root.display(), "workspace ready");
        Ok(())
    }

    /// Reset the artifact and history. Memory and templates are kept.
    pub fn clear(&self) -> Result<()> {
        self.write_atomic(ARTIFACT_FILE, b"{}")?;
        self.write_atomic(HISTORY_FILE, b"[]")?;
        tracing::info!(path = %self.root.display(), "workspace cleared");
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Raw access
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Trimmed file contents, or `None` when the file does not exist.
    pub fn read_text(&self, name: &str) -> Result<Option<String>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?.trim().to_string()))
    }

    fn write_json(&self, name: &str, value: &impl serde::Serialize) -> Result<()> {
        self.write_atomic(name, serde_json::to_string_pretty(value)?.as_bytes())
    }

    /// Replace `name` in one rename, so readers see the old or the new
    /// contents and never a partial file.
    pub fn write_atomic(&self, name: &str, contents: &[u8]) -> Result<()> {
        use std::io::Write;

        std::fs::create_dir_all(&self.root)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path(name)).map_err(|e| e.error)?;
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Memory
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Current memory map. A missing or empty file is an empty map.
    pub fn read_memory(&self) -> Result<Map<String, Value>> {
        match self.read_text(MEMORY_FILE)? {
            None => Ok(Map::new()),
            Some(raw) if raw.is_empty() => Ok(Map::new()),
            Some(raw) => match serde_json::from_str::<Value>(&raw)? {
                Value::Object(map) => Ok(map),
                other => Err(sc_domain::Error::Workspace {
                    file: MEMORY_FILE.into(),
                    message: format!("not an object (found {})", json_kind(&other)),
                }),
            },
        }
    }

    pub fn write_memory(&self, memory: &Map<String, Value>) -> Result<()> {
        self.write_json(MEMORY_FILE, memory)
    }

    /// Shallow-merge `update` over the stored memory and persist it.
    /// Returns the merged map.
    pub fn merge_memory(&self, update: &Map<String, Value>) -> Result<Map<String, Value>> {
        let mut memory = self.read_memory()?;
        for (k, v) in update {
            memory.insert(k.clone(), v.clone());
        }
        self.write_memory(&memory)?;
        Ok(memory)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // History & artifact
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Load history, keeping the newest `limit` entries. Unreadable
    /// history starts over empty rather than failing the turn.
    pub fn load_history(&self, limit: usize) -> History {
        let entries = match self.read_text(HISTORY_FILE) {
            Ok(Some(raw)) if !raw.is_empty() => {
                match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!(error = %e, "input history unreadable, starting empty");
                        Vec::new()
                    }
                }
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "input history unreadable, starting empty");
                Vec::new()
            }
        };
        History::from_entries(entries, limit)
    }

    pub fn save_history(&self, history: &History) -> Result<()> {
        self.write_json(HISTORY_FILE, &history.to_vec())
    }

    /// Overwrite the artifact with the latest turn's outcomes.
    pub fn save_artifact(&self, artifact: &Artifact) -> Result<()> {
        self.write_json(ARTIFACT_FILE, artifact)
    }

    pub fn load_artifact(&self) -> Result<Option<Artifact>> {
        match self.read_text(ARTIFACT_FILE)? {
            Some(raw) if !raw.is_empty() && raw != "{}" => Ok(Some(serde_json::from_str(&raw)?)),
            _ => Ok(None),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Manifests
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// `name` fields of the router action manifest, in file order.
    pub fn router_action_names(&self) -> Vec<String> {
        let Ok(Some(raw)) = self.read_text(ROUTER_ACTIONS_FILE) else {
            return Vec::new();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => items
                .iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .filter(|n| !n.is_empty())
                .map(str::to_owned)
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
