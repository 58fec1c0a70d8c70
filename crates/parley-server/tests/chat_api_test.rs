use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use parley_core::api::{ApiError, StreamChunk, StreamError};
use parley_core::app::ui_stream::{UI_STREAM_HEADER, UiChunk, decode_chunk};
use parley_core::test_utils::ScriptedProvider;
use parley_core::tools::ToolRegistry;
use parley_server::{AppState, router};
use rstest::rstest;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(provider: &Arc<ScriptedProvider>) -> axum::Router {
    router(AppState::new(
        provider.clone(),
        ToolRegistry::builtin(),
        "test-model",
        5,
        Duration::from_secs(5),
    ))
}

fn chat_request(body: &str) -> Request<Body> {
    Request::post("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn user_body(text: &str) -> String {
    json!({
        "messages": [
            {"id": "u1", "role": "user", "parts": [{"type": "text", "text": text}]}
        ]
    })
    .to_string()
}

/// Split an SSE body into chunk payloads, returning them and whether the
/// end marker was seen.
fn parse_events(body: &str) -> (Vec<UiChunk>, bool) {
    let mut chunks = Vec::new();
    let mut done = false;
    for frame in body.split("\n\n") {
        for line in frame.lines() {
            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            match decode_chunk(data).unwrap() {
                Some(chunk) => chunks.push(chunk),
                None => done = true,
            }
        }
    }
    (chunks, done)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn streams_text_reply() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_text("Hello there!");

    let response = app(&provider)
        .oneshot(chat_request(&user_body("Hi")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[UI_STREAM_HEADER], "v1");
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let (chunks, done) = parse_events(&body_string(response).await);
    assert!(done);
    assert!(matches!(chunks.first(), Some(UiChunk::Start { .. })));
    assert!(
        chunks
            .iter()
            .any(|c| matches!(c, UiChunk::TextDelta { delta, .. } if delta == "Hello there!"))
    );
    assert_eq!(chunks.last(), Some(&UiChunk::Finish));

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].model, "test-model");
    assert!(calls[0].tools_offered);
}

#[rstest]
#[case::missing_role(json!({"messages": [{"id": "u1", "parts": [{"type": "text", "text": "hi"}]}]}))]
#[case::bad_role(json!({"messages": [{"id": "u1", "role": "robot", "parts": [{"type": "text", "text": "hi"}]}]}))]
#[case::empty_messages(json!({"messages": []}))]
#[case::unknown_part(json!({"messages": [{"id": "u1", "role": "user", "parts": [{"type": "image"}]}]}))]
#[tokio::test]
async fn malformed_body_is_rejected_with_issues(#[case] body: Value) {
    let provider = Arc::new(ScriptedProvider::new());
    let response = app(&provider)
        .oneshot(chat_request(&body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"], "Invalid request");
    assert!(!body["issues"].as_array().unwrap().is_empty());
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn invalid_json_is_a_client_error() {
    let provider = Arc::new(ScriptedProvider::new());
    let response = app(&provider)
        .oneshot(chat_request("{\"messages\": ["))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["issues"][0]["code"], "invalid_json");
}

#[tokio::test]
async fn upstream_failure_is_a_generic_server_error() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_api_error(ApiError::ServerError {
        provider: "openai".to_string(),
        status_code: 502,
        details: "secret upstream detail".to_string(),
    });

    let response = app(&provider)
        .oneshot(chat_request(&user_body("Hi")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = body_string(response).await;
    assert_eq!(
        serde_json::from_str::<Value>(&text).unwrap(),
        json!({"error": "Internal server error"})
    );
    assert!(!text.contains("secret"));
}

#[tokio::test]
async fn failure_mid_stream_becomes_error_chunk() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_chunks(vec![
        StreamChunk::TextDelta("partial".to_string()),
        StreamChunk::Error(StreamError::Provider {
            provider: "openai".to_string(),
            message: "secret upstream detail".to_string(),
        }),
    ]);

    let response = app(&provider)
        .oneshot(chat_request(&user_body("Hi")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_string(response).await;
    assert!(!text.contains("secret"));
    let (chunks, done) = parse_events(&text);
    assert!(done);
    assert_eq!(
        chunks.last(),
        Some(&UiChunk::Error {
            error_text: "An error occurred.".to_string()
        })
    );
}

#[tokio::test]
async fn weather_then_conversion_round_trip() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_tool_call("call_1", "weather", json!({"location": "Oslo"}));
    provider.push_tool_call(
        "call_2",
        "convertFahrenheitToCelsius",
        json!({"temperature": 212}),
    );
    provider.push_text("It is 100°C.");

    let response = app(&provider)
        .oneshot(chat_request(&user_body("Weather in Oslo in celsius?")))
        .await
        .unwrap();
    let (chunks, done) = parse_events(&body_string(response).await);
    assert!(done);

    let outputs: Vec<&Value> = chunks
        .iter()
        .filter_map(|c| match c {
            UiChunk::ToolOutputAvailable { output, .. } => Some(output),
            _ => None,
        })
        .collect();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0]["location"], "Oslo");
    let temperature = outputs[0]["temperature"].as_i64().unwrap();
    assert!((32..=90).contains(&temperature));
    assert_eq!(outputs[1], &json!({"celsius": 100}));
    assert_eq!(chunks.last(), Some(&UiChunk::Finish));
    assert_eq!(provider.calls().len(), 3);
}

#[tokio::test]
async fn endless_tool_requests_stop_at_step_cap() {
    let provider = Arc::new(ScriptedProvider::new());
    for i in 0..6 {
        provider.push_tool_call(&format!("call_{i}"), "weather", json!({"location": "Oslo"}));
    }

    let response = app(&provider)
        .oneshot(chat_request(&user_body("Loop forever")))
        .await
        .unwrap();
    let (chunks, done) = parse_events(&body_string(response).await);
    assert!(done);

    let calls = provider.calls();
    assert_eq!(calls.len(), 5);
    assert!(!calls[4].tools_offered);
    let outputs = chunks
        .iter()
        .filter(|c| matches!(c, UiChunk::ToolOutputAvailable { .. }))
        .count();
    assert_eq!(outputs, 4);
    assert_eq!(chunks.last(), Some(&UiChunk::Finish));
}

#[tokio::test]
async fn disconnect_before_first_chunk_cancels_run() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_stall();

    let request = tokio::spawn(app(&provider).oneshot(chat_request(&user_body("Hi"))));
    tokio::time::timeout(Duration::from_secs(1), async {
        while provider.calls().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(provider.cancelled(), 0);

    // The client goes away while the handler is still waiting
    request.abort();
    assert!(request.await.unwrap_err().is_cancelled());

    tokio::time::timeout(Duration::from_secs(1), async {
        while provider.cancelled() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn health_check_responds() {
    let provider = Arc::new(ScriptedProvider::new());
    let response = app(&provider)
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}
