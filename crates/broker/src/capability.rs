//! Remote capability registry: maps action names to handlers by naming
//! convention.
//!
//! An action `ACTION_NAME` resolves to the capability registered as
//! `ActionNameCapability`. Registration happens once at worker start from a
//! fixed manifest; there is no dynamic loading.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::CapabilityResult;

/// Context provided to every remote capability invocation.
#[derive(Clone, Debug)]
pub struct CapabilityContext {
    /// Correlation id of the command being served.
    pub message_id: String,
    /// Normalized action name (e.g. `HELLO_WORLD`).
    pub action: String,
    /// Cancelled when the worker shuts down.
    pub cancel: CancellationToken,
}

/// Implement this trait to serve an action on the router worker.
///
/// ```rust,no_run
/// use sc_broker::{CapabilityContext, CapabilityResult, RemoteCapability};
///
/// struct PingCapability;
///
/// #[async_trait::async_trait]
/// impl RemoteCapability for PingCapability {
///     async fn execute(
///         &self,
///         _ctx: CapabilityContext,
///         _params: serde_json::Map<String, serde_json::Value>,
///     ) -> CapabilityResult {
///         let mut out = serde_json::Map::new();
///         out.insert("text".into(), "pong".into());
///         Ok(out)
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait RemoteCapability: Send + Sync + 'static {
    async fn execute(&self, ctx: CapabilityContext, params: Map<String, Value>) -> CapabilityResult;
}

/// `HELLO_WORLD` → `HelloWorldCapability`.
pub fn capability_type_name(action: &str) -> String {
    let mut name = String::with_capacity(action.len() + "Capability".len());
    for part in action.trim().split(|c: char| c == '_' || c == '-' || c == '.') {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            name.push(first.to_ascii_uppercase());
            name.extend(chars.map(|c| c.to_ascii_lowercase()));
        }
    }
    name.push_str("Capability");
    name
}

/// `HelloWorldCapability` → `HELLO_WORLD`. Inverse of
/// [`capability_type_name`] for names that follow the convention.
pub fn action_name_for(type_name: &str) -> String {
    let stem = type_name.strip_suffix("Capability").unwrap_or(type_name);
    let mut action = String::with_capacity(stem.len() + 4);
    for (i, c) in stem.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            action.push('_');
        }
        action.push(c.to_ascii_uppercase());
    }
    action
}

#[derive(Clone, Default)]
pub struct RemoteRegistry {
    capabilities: BTreeMap<String, Arc<dyn RemoteCapability>>,
}

impl RemoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its type name (e.g. `"HelloWorldCapability"`).
    ///
    /// Returns `&mut Self` for method chaining.
    pub fn register<C: RemoteCapability>(
        &mut self,
        type_name: impl Into<String>,
        capability: C,
    ) -> &mut Self {
        self.capabilities.insert(type_name.into(), Arc::new(capability));
        self
    }

    /// Resolve an action name through the naming convention.
    pub fn resolve(&self, action: &str) -> Option<Arc<dyn RemoteCapability>> {
        self.capabilities.get(&capability_type_name(action)).cloned()
    }

    /// Action names served by this registry (sorted).
    pub fn action_names(&self) -> Vec<String> {
        self.capabilities.keys().map(|k| action_name_for(k)).collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    #[async_trait::async_trait]
    impl RemoteCapability for Echo {
        async fn execute(&self, _ctx: CapabilityContext, params: Map<String, Value>) -> CapabilityResult {
            Ok(params)
        }
    }

    #[test]
    fn naming_convention() {
        assert_eq!(capability_type_name("HELLO_WORLD"), "HelloWorldCapability");
        assert_eq!(capability_type_name("hello_world"), "HelloWorldCapability");
        assert_eq!(capability_type_name("PING"), "PingCapability");
        assert_eq!(capability_type_name("WEB__CAPTURE"), "WebCaptureCapability");
    }

    #[test]
    fn naming_convention_inverse() {
        assert_eq!(action_name_for("HelloWorldCapability"), "HELLO_WORLD");
        assert_eq!(action_name_for("PingCapability"), "PING");
    }

    #[test]
    fn resolve_by_action_name_any_case() {
        let mut reg = RemoteRegistry::new();
        reg.register("HelloWorldCapability", Echo);
        assert!(reg.resolve("HELLO_WORLD").is_some());
        assert!(reg.resolve("hello_world").is_some());
        assert!(reg.resolve("GOODBYE").is_none());
        assert_eq!(reg.action_names(), vec!["HELLO_WORLD"]);
    }

    #[tokio::test]
    async fn resolved_handler_runs() {
        let mut reg = RemoteRegistry::new();
        reg.register("EchoCapability", Echo);
        let handler = reg.resolve("ECHO").unwrap();
        let mut params = Map::new();
        params.insert("x".into(), 1.into());
        let ctx = CapabilityContext {
            message_id: "m-1".into(),
            action: "ECHO".into(),
            cancel: CancellationToken::new(),
        };
        let out = handler.execute(ctx, params.clone()).await.unwrap();
        assert_eq!(out, params);
    }
}
