//! IIT JEE Tutor Orchestrator
//!
//! Runs the staged tutoring pipeline (classify, analyze, explain, finalize),
//! caches final responses, and serves it all over HTTP.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod llm;
pub mod parse;
pub mod pipeline;
pub mod prompts;
pub mod rate_limit;
pub mod state;
pub mod subject;

pub use api::{
    create_router, AppState, ChatRequest, ChatResponse, ErrorResponse, HealthResponse,
    SamplesResponse, GENERIC_ERROR_MESSAGE, STREAM_DONE_DATA,
};
pub use cache::{CacheKey, CacheStats, ResponseCache};
pub use config::{Config, RateLimitConfig, ServerConfig};
pub use error::{LlmErrorKind, Result, TutorError};
pub use llm::{ChunkStream, Message, OpenAiGenerator, Role, TextGenerator};
pub use pipeline::{ResponseStream, Tutor, TutorOutcome, TutorResponse, TutoringRequest};
pub use prompts::PromptTemplate;
pub use rate_limit::ClientRateLimiter;
pub use state::{PipelineState, QuestionType, Stage};
pub use subject::Subject;
