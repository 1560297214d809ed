//! `MEMORY_WRITE`: merge `params.new_memory` into `memory.json`.

use serde_json::{Map, Value};

use sc_broker::{CapabilityError, CapabilityResult};

use crate::capability::LocalCapability;
use crate::workspace::{json_kind, Workspace};

pub const ACTION: &str = "MEMORY_WRITE";

pub struct MemoryWriteCapability {
    workspace: Workspace,
}

impl MemoryWriteCapability {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait::async_trait]
impl LocalCapability for MemoryWriteCapability {
    async fn execute(&self, params: Map<String, Value>) -> CapabilityResult {
        let update = match params.get("new_memory") {
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(CapabilityError::InvalidParams(format!(
                    "new_memory must be an object, got {}",
                    json_kind(other)
                )))
            }
            None => return Err(CapabilityError::InvalidParams("missing new_memory".into())),
        };

        let merged = self
            .workspace
            .merge_memory(update)
            .map_err(|e| CapabilityError::Failed(e.to_string()))?;
        tracing::info!(keys = update.len(), total = merged.len(), "memory updated");

        let mut out = Map::new();
        out.insert(
            "text".into(),
            Value::String(format!("Memory updated: {}", Value::Object(merged))),
        );
        Ok(out)
    }
}
