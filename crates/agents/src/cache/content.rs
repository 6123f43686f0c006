//! Memoized narrative segments keyed by generation fingerprint.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::{CacheBackend, CacheError};
use crate::narrative::NarrativeSegment;

const KEY_PREFIX: &str = "narrative:segment:";

/// Default lifetime of a cached segment.
pub const DEFAULT_CONTENT_TTL: Duration = Duration::from_secs(3600);

/// Cache of generated segments.
#[derive(Clone)]
pub struct ContentCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl ContentCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a segment. A stored value that no longer decodes reads as a miss.
    pub async fn get(&self, fingerprint: &str) -> Result<Option<NarrativeSegment>, CacheError> {
        let Some(raw) = self.backend.get(&Self::key(fingerprint)).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(segment) => Ok(Some(segment)),
            Err(e) => {
                warn!(fingerprint, error = %e, "Discarding undecodable cached segment");
                Ok(None)
            }
        }
    }

    /// Store a segment for the configured TTL.
    pub async fn put(&self, fingerprint: &str, segment: &NarrativeSegment) -> Result<(), CacheError> {
        let raw = serde_json::to_string(segment)?;
        self.backend
            .set(&Self::key(fingerprint), raw, Some(self.ttl))
            .await
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        self.backend.ping().await
    }

    fn key(fingerprint: &str) -> String {
        format!("{KEY_PREFIX}{fingerprint}")
    }
}
