//! Per-key async locks.
//!
//! Serializes read-modify-write sequences on the same key (a narrative id, an
//! avatar id, a content fingerprint) while leaving different keys independent.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Once this many keys are tracked, idle entries are dropped on release.
const PRUNE_THRESHOLD: usize = 1024;

/// A set of lazily created mutexes, one per key.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let mutex = Arc::clone(self.locks.entry(key.to_string()).or_default().value());
        KeyGuard {
            guard: Some(mutex.lock_owned().await),
            locks: self.clone(),
        }
    }

    /// Drop entries nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds a key's lock until dropped.
pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: KeyedLocks,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        if self.locks.len() >= PRUNE_THRESHOLD {
            self.locks.prune();
        }
    }
}
