use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use strata_types::ObjectHash;

use crate::config::CacheConfig;

struct Inner {
    entries: HashMap<ObjectHash, Instant>,
    target_size: usize,
    target_age: Duration,
}

/// Bounded, aged set of hashes confirmed absent from the backends.
///
/// A membership hit lets the store report absence without touching disk. The
/// record is advisory only: entries are erased the moment a real store for
/// the hash lands, and eviction merely forgets the absence, it never asserts
/// presence.
pub struct MissCache {
    inner: Mutex<Inner>,
}

impl MissCache {
    /// Create a miss cache with default bounds.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a miss cache with the given bounds.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                target_size: config.target_size,
                target_age: config.target_age,
            }),
        }
    }

    /// Returns `true` if the hash is recorded absent, refreshing its recency.
    pub fn touch_if_exists(&self, hash: &ObjectHash) -> bool {
        let mut inner = self.inner.lock().expect("lock poisoned");
        match inner.entries.get_mut(hash) {
            Some(last_access) => {
                *last_access = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Record a hash as absent.
    pub fn insert(&self, hash: ObjectHash) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.entries.insert(hash, Instant::now());
    }

    /// Forget an absence record. Returns `true` if one existed.
    pub fn erase(&self, hash: &ObjectHash) -> bool {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.entries.remove(hash).is_some()
    }

    /// Set the entry count the next sweep reduces the cache to.
    pub fn set_target_size(&self, size: usize) {
        self.inner.lock().expect("lock poisoned").target_size = size;
    }

    /// Set the age past which the next sweep drops untouched entries.
    pub fn set_target_age(&self, age: Duration) {
        self.inner.lock().expect("lock poisoned").target_age = age;
    }

    /// Evict expired entries, then trim least-recently-used down to target size.
    pub fn sweep(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let now = Instant::now();
        let before = inner.entries.len();

        let target_age = inner.target_age;
        inner
            .entries
            .retain(|_, last_access| now.duration_since(*last_access) < target_age);

        let target_size = inner.target_size;
        if inner.entries.len() > target_size {
            let mut by_age: Vec<(ObjectHash, Instant)> = inner
                .entries
                .iter()
                .map(|(hash, last_access)| (*hash, *last_access))
                .collect();
            by_age.sort_by_key(|(_, last_access)| *last_access);
            let excess = inner.entries.len() - target_size;
            for (hash, _) in by_age.into_iter().take(excess) {
                inner.entries.remove(&hash);
            }
        }

        debug!(before, after = inner.entries.len(), "miss cache sweep");
    }

    /// Number of recorded absences.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").entries.len()
    }

    /// Returns `true` if no absences are recorded.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("lock poisoned").entries.is_empty()
    }
}

impl Default for MissCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MissCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MissCache")
            .field("entry_count", &self.len())
            .finish()
    }
}
