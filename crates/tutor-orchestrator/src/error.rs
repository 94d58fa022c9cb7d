//! Error types for the tutoring orchestrator.
//!
//! This module defines the error hierarchy for all orchestrator operations:
//! request validation, text generation, and configuration loading.
//!
//! Malformed stage output is deliberately absent from this hierarchy. Each
//! stage parser has its own degrade path, so only a hard failure of the
//! generation call itself can abort a request.

use std::path::PathBuf;
use std::time::Duration;

/// A specialized `Result` type for tutoring orchestrator operations.
pub type Result<T> = std::result::Result<T, TutorError>;

/// Errors that can occur while answering a tutoring request.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    // ========================================================================
    // Request Validation Errors
    // ========================================================================
    /// The question was blank after trimming.
    ///
    /// Detected before the pipeline starts; no generation call is made.
    #[error("Message cannot be empty")]
    EmptyInput,

    // ========================================================================
    // Generation Errors
    // ========================================================================
    /// The text-generation service returned an error.
    #[error("Generation failed ({kind}): {message}\n\nSuggestion: {suggestion}")]
    GenerationFailure {
        /// The kind of failure (authentication, rate limit, server, ...).
        kind: LlmErrorKind,
        /// Detailed error message from the service.
        message: String,
        /// Actionable suggestion for operators.
        suggestion: String,
    },

    /// A generation call did not complete within the configured bound.
    #[error("Generation timed out after {timeout:?} during the {stage} stage\n\nSuggestion: Raise generationTimeoutSecs in tutor.json or check the generation service")]
    GenerationTimeout {
        /// The pipeline stage that was waiting.
        stage: String,
        /// The configured bound.
        timeout: Duration,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your tutor.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },
}

/// Categories of generation failures for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// Quota or rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The service answered but the payload was unusable.
    InvalidResponse,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::InvalidResponse => write!(f, "invalid_response"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl LlmErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check the API key named by apiKeyEnv in tutor.json",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server => "Retry later; the generation service may be experiencing issues",
            Self::Network => "Check your network connection and apiBaseUrl",
            Self::InvalidResponse => "Check that the configured model supports chat completions",
            Self::Other => "Check the generation provider's status page",
        }
    }

    /// Classifies an HTTP status code returned by the generation service.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl TutorError {
    /// Creates a new `GenerationFailure` with automatic suggestion based on error kind.
    #[must_use]
    pub fn generation(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::GenerationFailure {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Creates a new `GenerationTimeout` error.
    #[must_use]
    pub fn generation_timeout(stage: impl std::fmt::Display, timeout: Duration) -> Self {
        Self::GenerationTimeout {
            stage: stage.to_string(),
            timeout,
        }
    }

    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Returns `true` if this error was caused by the caller's input.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyInput)
    }

    /// Returns `true` if this error is transient and the request may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::GenerationFailure {
                kind: LlmErrorKind::RateLimit | LlmErrorKind::Server | LlmErrorKind::Network,
                ..
            } | Self::GenerationTimeout { .. }
        )
    }
}
