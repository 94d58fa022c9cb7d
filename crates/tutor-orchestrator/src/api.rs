//! HTTP API for the tutor.
//!
//! # Endpoints
//!
//! - `POST /api/chat` - Answer a question in one response
//! - `POST /api/chat/stream` - Answer a question as server-sent events
//! - `GET /api/health` - Liveness check
//! - `GET /api/subjects/:subject/samples` - Sample questions for a subject
//!
//! The two chat endpoints are rate limited per client.
//!
//! # Example
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! use tutor_orchestrator::{create_router, AppState, Config, OpenAiGenerator};
//!
//! # async fn example() {
//! let config = Config::default();
//! let generator = OpenAiGenerator::new(&config, "api-key");
//! let router = create_router(AppState::from_config(config, Arc::new(generator)));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8001").await.unwrap();
//! axum::serve(
//!     listener,
//!     router.into_make_service_with_connect_info::<SocketAddr>(),
//! )
//! .await
//! .unwrap();
//! # }
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::TutorError;
use crate::llm::TextGenerator;
use crate::pipeline::{Tutor, TutoringRequest};
use crate::rate_limit::{rate_limit, ClientRateLimiter};
use crate::subject::Subject;

/// Message returned for any failure that is not the caller's fault.
pub const GENERIC_ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Data of the SSE event closing a successful stream.
pub const STREAM_DONE_DATA: &str = "[DONE]";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for both chat endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The student's message.
    pub message: String,
    /// Subject name; unknown values fall back to maths.
    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_subject() -> String {
    Subject::default().as_str().to_string()
}

/// Response body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The tutor's reply.
    pub response: String,
    /// Always `"success"`.
    pub status: String,
}

/// Response body for `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"`.
    pub status: String,
    /// Human-readable status line.
    pub message: String,
}

/// Response body for the sample-questions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplesResponse {
    /// The normalized subject.
    pub subject: Subject,
    /// Example questions to get a student started.
    pub samples: Vec<String>,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The pipeline runner, holding the shared response cache.
    pub tutor: Tutor,
    /// Configuration the server was started with.
    pub config: Config,
    /// Per-client limiter for the chat endpoints.
    pub limiter: Arc<ClientRateLimiter>,
}

impl AppState {
    /// Creates state around an existing tutor.
    #[must_use]
    pub fn new(tutor: Tutor, config: Config) -> Self {
        let limiter = Arc::new(ClientRateLimiter::per_minute(
            config.rate_limit.requests_per_minute,
        ));
        Self {
            tutor,
            config,
            limiter,
        }
    }

    /// Creates state with a fresh cache and the configured generation timeout.
    #[must_use]
    pub fn from_config(config: Config, generator: Arc<dyn TextGenerator>) -> Self {
        let tutor = Tutor::new(generator, Arc::new(ResponseCache::new()))
            .with_timeout(config.generation_timeout());
        Self::new(tutor, config)
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// The request itself was invalid.
    BadRequest(String),
    /// Anything else; details are logged, not returned.
    Internal,
}

impl From<TutorError> for ApiError {
    fn from(err: TutorError) -> Self {
        if err.is_client_error() {
            warn!(error = %err, "Rejected tutoring request");
            Self::BadRequest(err.to_string())
        } else {
            error!(error = %err, transient = err.is_transient(), "Tutoring request failed");
            Self::Internal
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERIC_ERROR_MESSAGE.to_string(),
            ),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// Routes live under `/api`, with permissive CORS and request tracing on
/// everything and the rate limiter on the chat routes only.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = Arc::new(state);

    let chat_routes = Router::new()
        .route("/chat", post(handle_chat))
        .route("/chat/stream", post(handle_chat_stream))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.limiter),
            rate_limit,
        ));

    let api_routes = Router::new()
        .merge(chat_routes)
        .route("/health", get(handle_health))
        .route("/subjects/:subject/samples", get(handle_samples));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /api/chat`.
async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    info!(
        subject = %request.subject,
        message_len = request.message.len(),
        "Received chat request"
    );

    let reply = state
        .tutor
        .run_pipeline(&request.message, &request.subject)
        .await?;

    Ok(Json(ChatResponse {
        response: reply.response,
        status: "success".to_string(),
    }))
}

/// Handler for `POST /api/chat/stream`.
///
/// Emits one `message` event per chunk, then `done`. A failure after the
/// stream opened becomes a single `error` event.
async fn handle_chat_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request = TutoringRequest::new(request.message, &request.subject)?;
    info!(subject = %request.subject(), "Opening chat stream");

    let mut chunks = state.tutor.run_stream(request);
    let events = stream! {
        while let Some(next) = chunks.next().await {
            match next {
                Ok(chunk) => yield Ok(message_event(&chunk)),
                Err(e) => {
                    error!(error = %e, "Chat stream failed");
                    yield Ok(Event::default().event("error").data(GENERIC_ERROR_MESSAGE));
                    return;
                }
            }
        }
        yield Ok(Event::default().event("done").data(STREAM_DONE_DATA));
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn message_event(chunk: &str) -> Event {
    Event::default()
        .event("message")
        .data(normalize_line_breaks(chunk))
}

/// SSE lines cannot carry carriage returns; `\r\n` and lone `\r` become `\n`.
fn normalize_line_breaks(chunk: &str) -> String {
    chunk.replace("\r\n", "\n").replace('\r', "\n")
}

/// Handler for `GET /api/health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "AI Tutor API is running".to_string(),
    })
}

/// Handler for `GET /api/subjects/:subject/samples`.
async fn handle_samples(Path(subject): Path<String>) -> Json<SamplesResponse> {
    let subject = Subject::from_input(&subject);
    Json(SamplesResponse {
        subject,
        samples: subject
            .sample_questions()
            .iter()
            .map(ToString::to_string)
            .collect(),
    })
}

// ============================================================================
// Tests
// ============================================================================
