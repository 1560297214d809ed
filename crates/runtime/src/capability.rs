//! Local capability table and the local-vs-remote resolution step.
//!
//! Every action name resolves to exactly one path: a handler registered
//! here runs in-process, anything else goes to the broker.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use sc_broker::CapabilityResult;
use sc_domain::normalize_action_name;

/// An action the agent process can execute itself.
#[async_trait::async_trait]
pub trait LocalCapability: Send + Sync + 'static {
    async fn execute(&self, params: Map<String, Value>) -> CapabilityResult;
}

/// Where an action call will run.
#[derive(Clone)]
pub enum Resolution {
    Local(Arc<dyn LocalCapability>),
    Remote,
}

impl Resolution {
    pub fn is_local(&self) -> bool {
        matches!(self, Resolution::Local(_))
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Local(_) => f.write_str("Local"),
            Resolution::Remote => f.write_str("Remote"),
        }
    }
}

/// Static name → handler table, populated once at startup.
#[derive(Clone, Default)]
pub struct LocalRegistry {
    capabilities: BTreeMap<String, Arc<dyn LocalCapability>>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `capability` under `action` (normalized). A second
    /// registration for the same name replaces the first.
    pub fn register<C: LocalCapability>(&mut self, action: &str, capability: C) -> &mut Self {
        self.register_arc(action, Arc::new(capability))
    }

    pub fn register_arc(&mut self, action: &str, capability: Arc<dyn LocalCapability>) -> &mut Self {
        self.capabilities
            .insert(normalize_action_name(action), capability);
        self
    }

    pub fn resolve(&self, action: &str) -> Resolution {
        match self.capabilities.get(&normalize_action_name(action)) {
            Some(cap) => Resolution::Local(cap.clone()),
            None => Resolution::Remote,
        }
    }

    pub fn contains(&self, action: &str) -> bool {
        self.capabilities.contains_key(&normalize_action_name(action))
    }

    /// Registered action names (sorted).
    pub fn action_names(&self) -> Vec<String> {
        self.capabilities.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
