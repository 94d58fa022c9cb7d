//! Integration tests for the HTTP API over a real listener.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use common::{CannedGenerator, CASUAL_REPLY, FINAL_ANSWER};
use futures::StreamExt;
use tutor_orchestrator::{
    create_router, AppState, ChatResponse, Config, ErrorResponse, HealthResponse,
    SamplesResponse, Subject, GENERIC_ERROR_MESSAGE, STREAM_DONE_DATA,
};

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Spawns the test server and returns its base URL.
async fn spawn_test_server(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");
    let base_url = format!("http://{addr}");

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (base_url, handle)
}

fn state_with(generator: &Arc<CannedGenerator>) -> AppState {
    AppState::from_config(Config::default(), generator.clone())
}

#[tokio::test]
async fn test_health_endpoint() {
    let generator = Arc::new(CannedGenerator::new());
    let (base_url, _handle) = spawn_test_server(state_with(&generator)).await;

    let response = reqwest::get(format!("{base_url}/api/health")).await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let health: HealthResponse = response.json().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.message, "AI Tutor API is running");
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_chat_answers_and_caches() {
    let generator = Arc::new(CannedGenerator::new());
    let (base_url, _handle) = spawn_test_server(state_with(&generator)).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let response = client
            .post(format!("{base_url}/api/chat"))
            .json(&serde_json::json!({ "message": "What is velocity?", "subject": "physics" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let chat: ChatResponse = response.json().await.unwrap();
        assert_eq!(chat.status, "success");
        assert_eq!(chat.response, FINAL_ANSWER);
    }

    assert_eq!(generator.calls(), 4);
}

#[tokio::test]
async fn test_chat_greeting() {
    let generator = Arc::new(CannedGenerator::new());
    let (base_url, _handle) = spawn_test_server(state_with(&generator)).await;

    let response = reqwest::Client::new()
        .post(format!("{base_url}/api/chat"))
        .json(&serde_json::json!({ "message": "hello" }))
        .send()
        .await
        .unwrap();

    let chat: ChatResponse = response.json().await.unwrap();
    assert_eq!(chat.response, CASUAL_REPLY);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_chat_rejects_blank_message() {
    let generator = Arc::new(CannedGenerator::new());
    let (base_url, _handle) = spawn_test_server(state_with(&generator)).await;

    let response = reqwest::Client::new()
        .post(format!("{base_url}/api/chat"))
        .json(&serde_json::json!({ "message": " \n ", "subject": "maths" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.error, "Message cannot be empty");
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_chat_failure_is_generic() {
    let generator = Arc::new(CannedGenerator::failing());
    let (base_url, _handle) = spawn_test_server(state_with(&generator)).await;

    let response = reqwest::Client::new()
        .post(format!("{base_url}/api/chat"))
        .json(&serde_json::json!({ "message": "What is velocity?" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.error, GENERIC_ERROR_MESSAGE);
}

#[tokio::test]
async fn test_chat_stream_delivers_chunks_in_order() {
    let generator = Arc::new(CannedGenerator::new());
    let (base_url, _handle) = spawn_test_server(state_with(&generator)).await;

    let response = reqwest::Client::new()
        .post(format!("{base_url}/api/chat/stream"))
        .json(&serde_json::json!({ "message": "What is velocity?", "subject": "physics" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut body = String::new();
    let mut bytes = response.bytes_stream();
    while let Some(chunk) = tokio::time::timeout(Duration::from_secs(5), bytes.next())
        .await
        .expect("Timeout waiting for stream")
    {
        body.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
    }

    let events = parse_sse(&body);
    let (last_name, last_data) = events.last().unwrap();
    assert_eq!(last_name, "done");
    assert_eq!(last_data, STREAM_DONE_DATA);

    let text: String = events
        .iter()
        .filter(|(name, _)| name == "message")
        .map(|(_, data)| data.as_str())
        .collect();
    assert_eq!(text, FINAL_ANSWER);
    assert!(events.len() > 2);
}

#[tokio::test]
async fn test_chat_stream_failure_emits_error_event() {
    let generator = Arc::new(CannedGenerator::failing());
    let (base_url, _handle) = spawn_test_server(state_with(&generator)).await;

    let body = reqwest::Client::new()
        .post(format!("{base_url}/api/chat/stream"))
        .json(&serde_json::json!({ "message": "What is velocity?" }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let events = parse_sse(&body);
    assert_eq!(
        events,
        vec![("error".to_string(), GENERIC_ERROR_MESSAGE.to_string())]
    );
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let generator = Arc::new(CannedGenerator::new());
    let mut config = Config::default();
    config.rate_limit.requests_per_minute = 2;
    let (base_url, _handle) =
        spawn_test_server(AppState::from_config(config, generator.clone())).await;
    let client = reqwest::Client::new();

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let response = client
            .post(format!("{base_url}/api/chat"))
            .json(&serde_json::json!({ "message": "hi" }))
            .send()
            .await
            .unwrap();
        statuses.push(response.status());
    }

    assert_eq!(
        statuses,
        vec![
            reqwest::StatusCode::OK,
            reqwest::StatusCode::OK,
            reqwest::StatusCode::TOO_MANY_REQUESTS,
        ]
    );
}

#[tokio::test]
async fn test_sample_questions_endpoint() {
    let generator = Arc::new(CannedGenerator::new());
    let (base_url, _handle) = spawn_test_server(state_with(&generator)).await;

    let samples: SamplesResponse = reqwest::get(format!("{base_url}/api/subjects/chemistry/samples"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(samples.subject, Subject::Chemistry);
    assert_eq!(
        samples.samples,
        Subject::Chemistry
            .sample_questions()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    );
}

/// Splits an SSE body into `(event, data)` pairs, joining multi-line data.
fn parse_sse(body: &str) -> Vec<(String, String)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut name = String::from("message");
            let mut data: Vec<&str> = Vec::new();
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    name = value.trim_start().to_string();
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push(value.strip_prefix(' ').unwrap_or(value));
                }
            }
            (!data.is_empty()).then(|| (name, data.join("\n")))
        })
        .collect()
}
