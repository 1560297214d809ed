use serde_json::{Map, Value};

use sc_broker::{CapabilityContext, CapabilityResult, RemoteCapability};

pub const TYPE_NAME: &str = "HelloWorldCapability";

/// `HELLO_WORLD`: the smoke-test action.
pub struct HelloWorldCapability;

#[async_trait::async_trait]
impl RemoteCapability for HelloWorldCapability {
    async fn execute(&self, ctx: CapabilityContext, _params: Map<String, Value>) -> CapabilityResult {
        tracing::info!(message_id = %ctx.message_id, "executing HELLO_WORLD");
        let mut out = Map::new();
        out.insert("text".into(), Value::String("Hello World!".into()));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn says_hello() {
        let ctx = CapabilityContext {
            message_id: "m-1".into(),
            action: "HELLO_WORLD".into(),
            cancel: CancellationToken::new(),
        };
        let out = HelloWorldCapability.execute(ctx, Map::new()).await.unwrap();
        assert_eq!(out.get("text").and_then(Value::as_str), Some("Hello World!"));
        assert_eq!(out.len(), 1);
    }
}
