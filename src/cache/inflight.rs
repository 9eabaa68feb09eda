//! At most one in-flight build per cache key.
//!
//! Each key being built maps to an async mutex. The builder holds the lock
//! until its capture is committed or dropped; a concurrent request for the
//! same key waits on the lock and then re-checks the store.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type KeyLock = Arc<Mutex<()>>;

/// Registry of keys currently being built.
#[derive(Debug, Clone, Default)]
pub struct InflightBuilds {
    locks: Arc<DashMap<String, KeyLock>>,
}

impl InflightBuilds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no one else is building `key`, then claim it.
    pub async fn acquire(&self, key: &str) -> BuildPermit {
        let lock = self.locks.entry(key.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        BuildPermit {
            key: key.to_string(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Number of keys with a build in progress or queued.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive right to build one key. Released on drop.
#[derive(Debug)]
pub struct BuildPermit {
    key: String,
    locks: Arc<DashMap<String, KeyLock>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl BuildPermit {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for BuildPermit {
    fn drop(&mut self) {
        // Two references left (the map and our guard) means nobody is queued.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) <= 2);
        self.guard.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn second_acquire_waits_for_release() {
        let builds = InflightBuilds::new();
        let first = builds.acquire("a.1.html").await;

        let contender = {
            let builds = builds.clone();
            tokio::spawn(async move { builds.acquire("a.1.html").await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.key(), "a.1.html");
        assert_eq!(builds.len(), 1);

        drop(second);
        assert!(builds.is_empty());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block() {
        let builds = InflightBuilds::new();
        let _a = builds.acquire("a.1.html").await;
        let b = tokio::time::timeout(Duration::from_millis(200), builds.acquire("b.1.html")).await;
        assert!(b.is_ok());
        assert_eq!(builds.len(), 2);
    }
}
