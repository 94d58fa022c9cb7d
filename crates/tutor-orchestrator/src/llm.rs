//! Text-generation client.
//!
//! [`TextGenerator`] is the single seam between the pipeline and the external
//! generation capability: an ordered list of role-tagged messages goes in,
//! generated text (or a lazy sequence of text chunks) comes out.
//!
//! Implementations own no retry or backoff logic. Failures propagate to the
//! caller unchanged, already classified into [`TutorError::GenerationFailure`].
//!
//! [`OpenAiGenerator`] talks to any OpenAI-compatible chat-completions
//! endpoint via `async-openai`. Model, temperature and token cap are fixed
//! when it is constructed.

use std::fmt;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{LlmErrorKind, Result, TutorError};

// ============================================================================
// Messages
// ============================================================================

/// Role of a message in a generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Persona/instructions; always first.
    System,
    /// Stage-specific request.
    User,
    /// Text produced by the generator.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Generator trait
// ============================================================================

/// A finite, non-restartable sequence of generated text chunks.
pub type ChunkStream = BoxStream<'static, Result<String>>;

/// The external text-generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a complete reply for the given messages.
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Generates a reply as a stream of chunks.
    ///
    /// The default implementation performs a blocking [`generate`] call and
    /// yields its output as a single chunk.
    ///
    /// [`generate`]: TextGenerator::generate
    async fn generate_stream(&self, messages: &[Message]) -> Result<ChunkStream> {
        let text = self.generate(messages).await?;
        Ok(stream::once(async move { Ok(text) }).boxed())
    }
}

// ============================================================================
// OpenAI-compatible implementation
// ============================================================================

/// Generator backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl fmt::Debug for OpenAiGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiGenerator")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl OpenAiGenerator {
    /// Creates a generator from the configuration and a resolved API key.
    #[must_use]
    pub fn new(config: &Config, api_key: &str) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Returns the fixed model identity.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, messages: &[Message]) -> Result<CreateChatCompletionRequest> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| map_openai_error(&e))?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| map_openai_error(&e))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        debug!(model = %self.model, messages = messages.len(), "Calling generation service");

        let request = self.build_request(messages)?;
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!(error = %e, "Generation call failed");
            map_openai_error(&e)
        })?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                TutorError::generation(LlmErrorKind::InvalidResponse, "response contained no text")
            })?;

        debug!(chars = content.len(), "Generation call succeeded");
        Ok(content)
    }

    async fn generate_stream(&self, messages: &[Message]) -> Result<ChunkStream> {
        debug!(model = %self.model, messages = messages.len(), "Opening generation stream");

        let request = self.build_request(messages)?;
        let upstream = self.client.chat().create_stream(request).await.map_err(|e| {
            warn!(error = %e, "Generation stream failed to open");
            map_openai_error(&e)
        })?;

        let chunks = upstream.filter_map(|item| async move {
            match item {
                Ok(response) => {
                    let text: String = response
                        .choices
                        .into_iter()
                        .filter_map(|choice| choice.delta.content)
                        .collect();
                    (!text.is_empty()).then_some(Ok(text))
                }
                Err(e) => {
                    warn!(error = %e, "Generation stream interrupted");
                    Some(Err(map_openai_error(&e)))
                }
            }
        });

        Ok(chunks.boxed())
    }
}

/// Converts a pipeline message into the wire representation.
fn to_request_message(
    message: &Message,
) -> std::result::Result<ChatCompletionRequestMessage, OpenAIError> {
    let content = message.content.as_str();
    Ok(match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    })
}

/// Classifies an `async-openai` error into the tutor error taxonomy.
fn map_openai_error(error: &OpenAIError) -> TutorError {
    let kind = match error {
        OpenAIError::Reqwest(e) => e.status().map_or_else(
            || {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    LlmErrorKind::Network
                } else {
                    LlmErrorKind::Other
                }
            },
            |status| LlmErrorKind::from_status(status.as_u16()),
        ),
        OpenAIError::ApiError(api) => classify_api_error(
            api.r#type.as_deref().unwrap_or_default(),
            api.code.as_deref().unwrap_or_default(),
        ),
        OpenAIError::JSONDeserialize(..) => LlmErrorKind::InvalidResponse,
        _ => LlmErrorKind::Other,
    };
    TutorError::generation(kind, error.to_string())
}

/// Classifies a structured API error by its type and code strings.
fn classify_api_error(error_type: &str, code: &str) -> LlmErrorKind {
    let haystack = format!("{error_type} {code}").to_lowercase();
    if haystack.contains("auth") || haystack.contains("api_key") || haystack.contains("permission")
    {
        LlmErrorKind::Authentication
    } else if haystack.contains("rate") || haystack.contains("quota") || haystack.contains("429") {
        LlmErrorKind::RateLimit
    } else if haystack.contains("server") || haystack.contains("unavailable") {
        LlmErrorKind::Server
    } else {
        LlmErrorKind::Other
    }
}
