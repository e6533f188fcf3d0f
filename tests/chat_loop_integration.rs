//! End-to-end chat loop tests
//!
//! The router runs with a real OpenAI-compatible adapter pointed at a
//! wiremock upstream, so one request exercises request parsing, the
//! orchestration loop, local tool execution, and response shaping.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{TEST_TOKEN, TEST_USER};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use workdesk::auth::StaticAuthVerifier;
use workdesk::config::{Config, LocalProviderConfig};
use workdesk::files::MemoryObjectStore;
use workdesk::providers::{ChatProvider, OpenAiCompatProvider, ProviderKind};
use workdesk::server::{router, AppState};
use workdesk::sessions::{EvictionPolicy, MemorySessionStore, SessionManager};

async fn state_with_local_upstream(server: &MockServer) -> AppState {
    let config = Config::default();
    let auth = Arc::new(StaticAuthVerifier::new().with_user(TEST_TOKEN, TEST_USER));
    let store = Arc::new(MemoryObjectStore::new());
    let sessions = SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        EvictionPolicy::default(),
    );

    let provider: Arc<dyn ChatProvider> = Arc::new(
        OpenAiCompatProvider::local(LocalProviderConfig {
            host: server.uri(),
            ..LocalProviderConfig::default()
        })
        .expect("provider construction"),
    );

    let mut providers: HashMap<ProviderKind, Arc<dyn ChatProvider>> = HashMap::new();
    providers.insert(ProviderKind::Local, provider);

    AppState::new(config, auth, store, sessions, providers).expect("state construction")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

#[tokio::test]
async fn test_time_question_runs_tool_and_answers() {
    let server = MockServer::start().await;

    // Round one asks for the tool; round two (transcript now contains a
    // tool-result turn) answers with the timestamp it was given.
    let responder = move |request: &wiremock::Request| {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let tool_turn = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .find(|m| m["role"] == "tool")
            .cloned();

        match tool_turn {
            Some(turn) => {
                let result: Value =
                    serde_json::from_str(turn["content"].as_str().unwrap()).unwrap();
                let iso = result["currentTime"]["iso"].as_str().unwrap();
                ResponseTemplate::new(200).set_body_json(json!({
                    "choices": [{"message": {
                        "role": "assistant",
                        "content": format!("The current time in UTC is {}.", iso),
                    }}],
                }))
            }
            None => ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_time",
                        "type": "function",
                        "function": {
                            "name": "get_current_time",
                            "arguments": "{\"format\":\"iso\",\"timezone\":\"UTC\"}",
                        },
                    }],
                }}],
            })),
        }
    };

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(responder)
        .expect(2)
        .mount(&server)
        .await;

    let app = router(state_with_local_upstream(&server).await);
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat/local")
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"message": "What time is it in UTC?"}).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("The current time in UTC is 2"));
    assert!(message.contains('T'));

    let calls = body["toolCalls"].as_array().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["id"], "call_time");
    assert_eq!(calls[0]["arguments"]["timezone"], "UTC");
    assert_eq!(calls[0]["result"]["success"], true);
}

#[tokio::test]
async fn test_upstream_failure_maps_to_500_with_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
        .mount(&server)
        .await;

    let app = router(state_with_local_upstream(&server).await);
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat/local")
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .header("content-type", "application/json")
        .body(Body::from(json!({"message": "hi"}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("503"));
    assert!(message.contains("model loading"));
}

#[tokio::test]
async fn test_streaming_bypasses_tool_loop() {
    let server = MockServer::start().await;

    let sse_body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"str\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"eam\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = router(state_with_local_upstream(&server).await);
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat/local")
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"message": "hi", "stream": true}).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collect")
        .to_bytes();
    assert_eq!(&bytes[..], b"stream");

    // The upstream request carried no tool definitions.
    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("tools").is_none());
    assert_eq!(body["stream"], true);
}
