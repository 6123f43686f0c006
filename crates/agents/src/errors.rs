//! Error types for agent execution.

use thiserror::Error;

use crate::cache::CacheError;
use crate::generation::GenerationError;

/// Result type used throughout the agents crate.
pub type Result<T, E = AgentError> = std::result::Result<T, E>;

/// Failures an agent can report.
///
/// Every variant is converted into an error [`crate::AgentResult`] at the
/// orchestrator boundary; none of them escape a dispatch.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No handler is registered under the requested id.
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// The task context is missing fields or carries invalid values.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The generation backend failed or returned unusable output.
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// The shared cache/store could not be reached.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(#[from] CacheError),

    /// A value could not be converted to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownAgent(_) => "unknown_agent",
            Self::Validation(_) => "validation_error",
            Self::Generation(_) => "generation_error",
            Self::CacheUnavailable(_) => "cache_unavailable",
            Self::Serialization(_) => "serialization_error",
        }
    }

    /// Whether re-running the same task could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Generation(_) | Self::CacheUnavailable(_))
    }
}
