//! Integration tests: each adapter against an in-process axum server that
//! mimics the provider's chat endpoint.

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use sc_domain::config::{LlmConfig, ProviderKind};
use sc_providers::{CompletionProvider, OllamaProvider, OpenAiCompatProvider};

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn ollama_round_trip() {
    let router = Router::new().route(
        "/api/chat",
        post(|Json(body): Json<Value>| async move {
            let prompt = body["messages"][0]["content"].as_str().unwrap_or_default().to_string();
            Json(json!({"message": {"role": "assistant", "content": format!("echo: {prompt}")}}))
        }),
    );
    let base = serve(router).await;

    let cfg = LlmConfig {
        base_url: Some(base),
        ..LlmConfig::default()
    };
    let provider = OllamaProvider::from_config(&cfg).unwrap();
    assert_eq!(provider.chat("ping").await.unwrap(), "echo: ping");
}

#[tokio::test]
async fn openai_compat_sends_bearer_and_reads_choice() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            Json(json!({
                "model": body["model"],
                "choices": [{"message": {"role": "assistant", "content": auth}}]
            }))
        }),
    );
    let base = serve(router).await;

    let cfg = LlmConfig {
        provider: ProviderKind::OpenaiCompat,
        model: "gpt-4o-mini".into(),
        base_url: Some(format!("{base}/v1")),
        ..LlmConfig::default()
    };
    let provider = OpenAiCompatProvider::with_key(&cfg, "sk-test").unwrap();
    assert_eq!(provider.chat("hi").await.unwrap(), "Bearer sk-test");
}

#[tokio::test]
async fn http_error_status_is_provider_error() {
    let router = Router::new().route(
        "/api/chat",
        post(|| async { (StatusCode::NOT_FOUND, "model not found") }),
    );
    let base = serve(router).await;

    let cfg = LlmConfig {
        base_url: Some(base),
        ..LlmConfig::default()
    };
    let provider = OllamaProvider::from_config(&cfg).unwrap();
    let err = provider.chat("hi").await.unwrap_err();
    let text = err.to_string();
    assert!(text.contains("404"), "{text}");
    assert!(text.contains("model not found"), "{text}");
}
