//! Key/value storage with expiry.
//!
//! [`CacheBackend`] is the contract shared by the narrative content cache and
//! the vote/profile stores. Values are JSON strings; callers own the encoding.
//! [`MemoryCache`] is process-local; deployments running more than one broker
//! process need a backend shared between them.

mod content;
mod memory;

pub use content::ContentCache;
pub use memory::MemoryCache;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

const PING_KEY: &str = "health:ping";

/// Cache backend failures.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached or refused the operation
    #[error("backend unreachable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded
    #[error("stored value is not valid: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Get/set storage with optional per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch a live value; expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value. `None` keeps it until overwritten.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Check the backend answers, without writing.
    async fn ping(&self) -> Result<(), CacheError> {
        self.get(PING_KEY).await.map(|_| ())
    }
}
