//! Built-in local capabilities.

pub mod llm_summary;
pub mod memory_write;

use std::sync::Arc;

use sc_providers::CompletionProvider;

use crate::capability::LocalRegistry;
use crate::workspace::Workspace;

pub use llm_summary::LlmSummaryCapability;
pub use memory_write::MemoryWriteCapability;

/// Registry with every built-in local capability.
pub fn builtin_registry(workspace: &Workspace, provider: Arc<dyn CompletionProvider>) -> LocalRegistry {
    let mut registry = LocalRegistry::new();
    registry
        .register(memory_write::ACTION, MemoryWriteCapability::new(workspace.clone()))
        .register(
            llm_summary::ACTION,
            LlmSummaryCapability::new(workspace.clone(), provider),
        );
    registry
}
