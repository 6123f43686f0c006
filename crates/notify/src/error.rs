//! Error types for the alert system.

use thiserror::Error;

/// Errors that can occur when delivering an alert.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Channel is not configured
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    /// The receiving endpoint rejected the alert
    #[error("Webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Delivery did not finish in time
    #[error("Delivery timed out after {0}ms")]
    Timeout(u128),

    /// Other error
    #[error("{0}")]
    Other(String),
}
