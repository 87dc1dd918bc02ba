#![allow(clippy::unwrap_used, clippy::expect_used)]

use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tensorchat_core::{StreamRequest, TensorConfig, TensorchatError};
use tensorchat_stream::{
    create_streaming_manager, SessionOutcome, StreamCallbacks, TensorchatConfig,
    TensorchatStreaming,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "tc-test-key";

fn config(server: &MockServer) -> TensorchatConfig {
    TensorchatConfig::new(KEY)
        .with_base_url(server.uri())
        .with_throttle_ms(0)
}

fn request() -> StreamRequest {
    StreamRequest::new("You are a data analyst.", "google/gemini-2.5-flash-lite")
        .tensor(TensorConfig::new("Summarize the feedback").concise(true))
        .tensor(TensorConfig::new("Extract the sentiment").search(true))
}

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|e| format!("data: {e}\n\n"))
        .collect()
}

fn happy_body() -> String {
    sse(&[
        json!({"type": "start", "totalTensors": 2, "model": "google/gemini-2.5-flash-lite", "searchApplied": true}),
        json!({"type": "search_progress", "index": 1, "query": "sentiment"}),
        json!({"type": "tensor_chunk", "index": 0, "chunk": "Customers "}),
        json!({"type": "tensor_chunk", "index": 1, "chunk": "Mostly "}),
        json!({"type": "tensor_chunk", "index": 0, "chunk": "like it."}),
        json!({"type": "tensor_complete", "index": 0, "result": {"tokens": 4}}),
        json!({"type": "tensor_chunk", "index": 1, "chunk": "positive."}),
        json!({"type": "tensor_complete", "index": 1}),
        json!({"type": "complete", "totalTensors": 2}),
    ])
}

fn error_sink() -> (Arc<Mutex<Vec<String>>>, StreamCallbacks) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    let callbacks = StreamCallbacks::new().on_error(move |e| sink.lock().push(e.to_string()));
    (errors, callbacks)
}

// ---------------------------------------------------------------------------
// 1. Request shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn posts_request_with_both_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/streamProcess"))
        .and(header("authorization", format!("Bearer {KEY}").as_str()))
        .and(header("x-api-key", KEY))
        .and(body_partial_json(json!({
            "context": "You are a data analyst.",
            "model": "google/gemini-2.5-flash-lite",
            "tensors": [
                {"messages": "Summarize the feedback", "concise": true},
                {"messages": "Extract the sentiment", "search": true}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(happy_body(), "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = TensorchatStreaming::new(config(&server)).unwrap();
    let (errors, callbacks) = error_sink();
    let outcome = client.stream_process(&request(), callbacks).await.unwrap();

    assert_eq!(outcome, SessionOutcome::Completed { total_tensors: Some(2) });
    assert!(errors.lock().is_empty());
}

// ---------------------------------------------------------------------------
// 2. Transport failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_success_status_reports_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/streamProcess"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(happy_body(), "text/event-stream"))
        .mount(&server)
        .await;

    let client = TensorchatStreaming::new(config(&server)).unwrap();
    let chunks = Arc::new(Mutex::new(0usize));
    let seen = chunks.clone();
    let (errors, callbacks) = error_sink();
    let callbacks = callbacks.on_tensor_chunk(move |_| *seen.lock() += 1);

    let err = client.stream_process(&request(), callbacks).await.unwrap_err();
    assert!(matches!(err, TensorchatError::Status { status: 401 }));
    assert_eq!(err.status_code(), Some(401));
    assert_eq!(*errors.lock(), vec!["HTTP error! status: 401"]);
    assert_eq!(*chunks.lock(), 0);
}

#[tokio::test]
async fn empty_body_is_missing_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/streamProcess"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/event-stream"))
        .mount(&server)
        .await;

    let client = TensorchatStreaming::new(config(&server)).unwrap();
    let (errors, callbacks) = error_sink();
    let err = client.stream_process(&request(), callbacks).await.unwrap_err();

    assert!(matches!(err, TensorchatError::MissingBody));
    assert_eq!(*errors.lock(), vec!["No response body"]);
}

#[tokio::test]
async fn remote_error_event_is_returned() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"type": "start", "totalTensors": 2}),
        json!({"type": "fatal_error", "error": "Model unavailable", "details": "503 upstream"}),
    ]);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = TensorchatStreaming::new(config(&server)).unwrap();
    let (errors, callbacks) = error_sink();
    let err = client.stream_process(&request(), callbacks).await.unwrap_err();

    assert!(!err.is_transport());
    assert_eq!(*errors.lock(), vec!["Model unavailable"]);
}

// ---------------------------------------------------------------------------
// 3. Collection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn process_single_collects_every_tensor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/streamProcess"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(happy_body(), "text/event-stream"))
        .mount(&server)
        .await;

    let client = TensorchatStreaming::new(config(&server).with_throttle_ms(50)).unwrap();
    let output = client.process_single(&request()).await.unwrap();

    assert_eq!(output.total_tensors, Some(2));
    assert_eq!(output.model.as_deref(), Some("google/gemini-2.5-flash-lite"));
    assert!(output.errors.is_empty());
    assert_eq!(output.tensors.len(), 2);
    assert_eq!(output.tensor(0).unwrap().content, "Customers like it.");
    assert_eq!(output.tensor(0).unwrap().result, Some(json!({"tokens": 4})));
    assert_eq!(output.tensor(1).unwrap().content, "Mostly positive.");
    assert_eq!(output.tensor(1).unwrap().chunks, vec!["Mostly ", "positive."]);
}

#[tokio::test]
async fn process_single_keeps_tensor_errors() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"type": "tensor_error", "index": 1, "error": "context too long"}),
        json!({"type": "tensor_chunk", "index": 0, "chunk": "ok"}),
        json!({"type": "tensor_complete", "index": 0}),
        json!({"type": "complete"}),
    ]);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = TensorchatStreaming::new(config(&server)).unwrap();
    let output = client.process_single(&request()).await.unwrap();

    assert_eq!(output.total_tensors, None);
    assert_eq!(output.tensors.len(), 1);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].index, 1);
    assert_eq!(output.errors[0].error.as_deref(), Some("context too long"));
}

// ---------------------------------------------------------------------------
// 4. Manager
// ---------------------------------------------------------------------------

#[tokio::test]
async fn manager_reuses_client_across_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/streamProcess"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(happy_body(), "text/event-stream"))
        .expect(2)
        .mount(&server)
        .await;

    let manager = create_streaming_manager(config(&server)).unwrap();
    let clone = manager.clone();

    let first = manager.process_single(&request()).await.unwrap();
    manager.destroy();
    let second = clone.process_single(&request()).await.unwrap();

    assert_eq!(first, second);
    assert!(!manager.is_streaming());
    manager.destroy();
    manager.destroy();
}

#[test]
fn manager_rejects_blank_api_key() {
    let err = create_streaming_manager(TensorchatConfig::new("  ")).unwrap_err();
    assert!(matches!(err, TensorchatError::Config(_)));
}
