//! Vote tally storage.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheBackend, CacheError};
use crate::locks::KeyedLocks;

const KEY_PREFIX: &str = "votes:";

/// How long a tally survives after its last vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Expire the record this long after the most recent vote
    Expiring(Duration),
    /// Keep the record until it is explicitly replaced
    Permanent,
}

impl RetentionPolicy {
    /// Per-write TTL handed to the cache backend.
    pub fn ttl(self) -> Option<Duration> {
        match self {
            Self::Expiring(ttl) => Some(ttl),
            Self::Permanent => None,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::Expiring(Duration::from_secs(24 * 60 * 60))
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expiring(ttl) => write!(f, "{}s", ttl.as_secs()),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

impl FromStr for RetentionPolicy {
    type Err = String;

    /// Accepts `permanent` or a positive number of seconds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("permanent") {
            return Ok(Self::Permanent);
        }
        match s.parse::<u64>() {
            Ok(0) => Err("vote retention must be positive".to_string()),
            Ok(secs) => Ok(Self::Expiring(Duration::from_secs(secs))),
            Err(_) => Err(format!(
                "invalid vote retention '{s}': expected seconds or 'permanent'"
            )),
        }
    }
}

/// Direction of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl FromStr for VoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(format!("vote_type must be 'up' or 'down', got '{other}'")),
        }
    }
}

/// A comment left alongside a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub user_id: String,
    pub comment: String,
}

/// Aggregate votes for one narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub narrative_id: String,
    pub up: u64,
    pub down: u64,
    pub comments: Vec<Comment>,
}

impl VoteRecord {
    /// An empty tally.
    pub fn new(narrative_id: impl Into<String>) -> Self {
        Self {
            narrative_id: narrative_id.into(),
            up: 0,
            down: 0,
            comments: Vec::new(),
        }
    }

    pub fn total(&self) -> u64 {
        self.up + self.down
    }

    fn apply(&mut self, vote: VoteType, comment: Option<Comment>) {
        match vote {
            VoteType::Up => self.up += 1,
            VoteType::Down => self.down += 1,
        }
        self.comments.extend(comment);
    }
}

/// Read-modify-write access to vote records.
///
/// Updates for one narrative id are serialized by a per-key lock, which covers
/// every writer in this process. Several broker processes sharing a backend
/// need the backend itself to serialize updates.
#[derive(Clone)]
pub struct VoteStore {
    backend: Arc<dyn CacheBackend>,
    locks: KeyedLocks,
    retention: RetentionPolicy,
}

impl VoteStore {
    pub fn new(backend: Arc<dyn CacheBackend>, retention: RetentionPolicy) -> Self {
        Self {
            backend,
            locks: KeyedLocks::new(),
            retention,
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Current tally, if any vote has been recorded and retained.
    pub async fn get(&self, narrative_id: &str) -> Result<Option<VoteRecord>, CacheError> {
        match self.backend.get(&Self::key(narrative_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Count one vote and return the updated tally.
    ///
    /// The stored record's expiry is refreshed on every write.
    pub async fn record(
        &self,
        narrative_id: &str,
        vote: VoteType,
        comment: Option<Comment>,
    ) -> Result<VoteRecord, CacheError> {
        let key = Self::key(narrative_id);
        let _guard = self.locks.lock(&key).await;

        let mut record = self
            .get(narrative_id)
            .await?
            .unwrap_or_else(|| VoteRecord::new(narrative_id));
        record.apply(vote, comment);

        self.backend
            .set(&key, serde_json::to_string(&record)?, self.retention.ttl())
            .await?;

        debug!(
            narrative_id,
            up = record.up,
            down = record.down,
            comments = record.comments.len(),
            "Recorded vote"
        );
        Ok(record)
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        self.backend.ping().await
    }

    fn key(narrative_id: &str) -> String {
        format!("{KEY_PREFIX}{narrative_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn store(retention: RetentionPolicy) -> VoteStore {
        VoteStore::new(Arc::new(MemoryCache::new()), retention)
    }

    #[test]
    fn test_retention_parsing() {
        assert_eq!(
            "permanent".parse::<RetentionPolicy>(),
            Ok(RetentionPolicy::Permanent)
        );
        assert_eq!(
            "86400".parse::<RetentionPolicy>(),
            Ok(RetentionPolicy::Expiring(Duration::from_secs(86400)))
        );
        assert!("0".parse::<RetentionPolicy>().is_err());
        assert!("forever".parse::<RetentionPolicy>().is_err());
        assert_eq!(RetentionPolicy::default().to_string(), "86400s");
    }

    #[test]
    fn test_vote_type_is_strict() {
        assert_eq!("up".parse::<VoteType>(), Ok(VoteType::Up));
        assert_eq!("down".parse::<VoteType>(), Ok(VoteType::Down));
        assert!("UP".parse::<VoteType>().is_err());
        assert!("sideways".parse::<VoteType>().is_err());
    }

    #[tokio::test]
    async fn test_first_vote_creates_record() {
        let store = store(RetentionPolicy::default());
        assert_eq!(store.get("n1").await.unwrap(), None);

        let record = store.record("n1", VoteType::Down, None).await.unwrap();
        assert_eq!((record.up, record.down), (0, 1));
        assert_eq!(store.get("n1").await.unwrap(), Some(record));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiring_retention_resets_tally() {
        let store = store(RetentionPolicy::Expiring(Duration::from_secs(60)));
        store.record("n1", VoteType::Up, None).await.unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;
        let record = store.record("n1", VoteType::Up, None).await.unwrap();
        assert_eq!(record.up, 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.get("n1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_retention_keeps_tally() {
        let store = store(RetentionPolicy::Permanent);
        store.record("n1", VoteType::Up, None).await.unwrap();

        tokio::time::advance(Duration::from_secs(30 * 24 * 3600)).await;
        assert_eq!(store.get("n1").await.unwrap().unwrap().up, 1);
    }

    #[tokio::test]
    async fn test_concurrent_votes_are_not_lost() {
        let store = store(RetentionPolicy::default());
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                let vote = if i % 5 == 0 { VoteType::Down } else { VoteType::Up };
                tokio::spawn(async move { store.record("n1", vote, None).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let record = store.get("n1").await.unwrap().unwrap();
        assert_eq!((record.up, record.down), (40, 10));
        assert_eq!(record.total(), 50);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let backend = Arc::new(MemoryCache::new());
        backend
            .set("votes:n1", "garbage".to_string(), None)
            .await
            .unwrap();
        let store = VoteStore::new(backend, RetentionPolicy::Permanent);

        assert!(matches!(
            store.record("n1", VoteType::Up, None).await,
            Err(CacheError::Encoding(_))
        ));
    }
}
