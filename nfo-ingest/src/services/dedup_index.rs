//! In-memory dedup pre-filter
//!
//! Membership sets of registered content hashes and access keys, seeded once
//! from the registry. A miss here is never authoritative: the store's UNIQUE
//! constraints make the final call, so a stale index only costs a wasted
//! registration attempt.

use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Sets {
    hashes: HashSet<String>,
    keys: HashSet<String>,
}

/// Shared dedup index
#[derive(Debug, Default)]
pub struct DedupIndex {
    sets: Mutex<Sets>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted (content hash, access key) pairs
    pub fn seeded<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut sets = Sets::default();
        for (hash, key) in pairs {
            sets.hashes.insert(hash);
            sets.keys.insert(key);
        }
        Self {
            sets: Mutex::new(sets),
        }
    }

    pub fn contains(&self, content_hash: &str) -> bool {
        self.lock().hashes.contains(content_hash)
    }

    pub fn contains_key(&self, access_key: &str) -> bool {
        self.lock().keys.contains(access_key)
    }

    /// Record a committed registration
    pub fn record(&self, content_hash: &str, access_key: &str) {
        let mut sets = self.lock();
        sets.hashes.insert(content_hash.to_string());
        sets.keys.insert(access_key.to_string());
    }

    /// Record only a content hash known to the store
    pub fn record_hash(&self, content_hash: &str) {
        self.lock().hashes.insert(content_hash.to_string());
    }

    /// Record only an access key known to the store
    pub fn record_key(&self, access_key: &str) {
        self.lock().keys.insert(access_key.to_string());
    }

    /// Remove a rolled-back registration so a retried copy is not dropped
    pub fn evict(&self, content_hash: &str, access_key: &str) {
        let mut sets = self.lock();
        sets.hashes.remove(content_hash);
        sets.keys.remove(access_key);
    }

    /// (hash count, key count)
    pub fn len(&self) -> (usize, usize) {
        let sets = self.lock();
        (sets.hashes.len(), sets.keys.len())
    }

    pub fn is_empty(&self) -> bool {
        let sets = self.lock();
        sets.hashes.is_empty() && sets.keys.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sets> {
        // No critical section can leave the sets half-updated
        self.sets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
