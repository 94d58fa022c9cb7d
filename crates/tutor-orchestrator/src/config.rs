//! Configuration types for the tutoring orchestrator.
//!
//! Generation settings (model, temperature, token cap) are fixed at startup
//! and shared by every pipeline stage so that output style stays consistent.
//! They are never exposed as per-request parameters.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "tutor.json";

/// Default model used for every generation call.
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

/// Default sampling temperature.
const fn default_temperature() -> f32 {
    0.1
}

/// Default completion token cap per call.
const fn default_max_tokens() -> u32 {
    2048
}

/// Default OpenAI-compatible endpoint of the generation service.
fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

/// Default environment variable holding the API key.
fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

/// Default bounded wait for a single generation call, in seconds.
const fn default_generation_timeout() -> u64 {
    120
}

/// Default listener host.
fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Default listener port.
const fn default_port() -> u16 {
    8001
}

/// Default per-client request budget per minute.
const fn default_requests_per_minute() -> u32 {
    30
}

/// Main configuration for the tutor service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Model identity used for all stages.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature used for all stages.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum completion tokens per generation call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Base URL of the OpenAI-compatible generation service.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Name of the environment variable that holds the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Bounded wait per generation call in seconds. `0` waits indefinitely.
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Admission control settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_base_url: default_api_base_url(),
            api_key_env: default_api_key_env(),
            generation_timeout_secs: default_generation_timeout(),
            server: ServerConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `tutor.json` in the current directory. If not found,
    /// returns the default configuration.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            TutorError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `tutor.json` in a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ConfigParseError` if the file exists but contains
    /// invalid JSON, and `TutorError::ConfigValidationError` if the values
    /// are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(TutorError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TutorError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(TutorError::config_validation(
                "model must not be empty",
                "Set model to a chat-capable model name in your tutor.json",
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TutorError::config_validation(
                format!("temperature must be between 0.0 and 2.0 (got {})", self.temperature),
                "Use a low temperature such as 0.1 for consistent explanations",
            ));
        }

        if self.max_tokens == 0 {
            return Err(TutorError::config_validation(
                "maxTokens must be greater than 0",
                "Set maxTokens to at least 256 in your tutor.json",
            ));
        }

        if self.api_base_url.trim().is_empty() {
            return Err(TutorError::config_validation(
                "apiBaseUrl must not be empty",
                "Provide the OpenAI-compatible endpoint of your generation service",
            ));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(TutorError::config_validation(
                "apiKeyEnv must not be empty",
                "Name the environment variable that holds your API key, e.g. GOOGLE_API_KEY",
            ));
        }

        Ok(())
    }

    /// Resolves the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(TutorError::config_validation(
                format!("environment variable {} is not set", self.api_key_env),
                format!("Export {} before starting the tutor", self.api_key_env),
            )),
        }
    }

    /// Returns the bounded wait per generation call, or `None` when disabled.
    #[must_use]
    pub const fn generation_timeout(&self) -> Option<Duration> {
        if self.generation_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.generation_timeout_secs))
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Per-client admission control for the HTTP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Requests allowed per client per minute. `0` disables the limiter.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
        }
    }
}
