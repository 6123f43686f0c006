//! Text generation backends.
//!
//! The narrative agent treats generation as an opaque prompt-in, text-out
//! capability. Backends surface every failure, including timeouts enforced
//! by callers, as a [`GenerationError`].

pub mod anthropic;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use anthropic::AnthropicGenerator;

/// Failures of the generation capability.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Credentials or endpoint are missing.
    #[error("backend not configured: {0}")]
    NotConfigured(String),

    /// The call exceeded its deadline.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The backend answered but the text cannot be used.
    #[error("malformed output: {0}")]
    Malformed(String),
}

/// A prompt-in, text-out generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Generate raw text for a prompt.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Whether the backend has what it needs to accept calls.
    fn is_ready(&self) -> bool {
        true
    }
}
