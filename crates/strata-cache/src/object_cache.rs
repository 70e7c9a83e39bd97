use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use strata_types::{NodeObject, ObjectHash};

use crate::config::CacheConfig;

struct CacheEntry {
    object: Arc<NodeObject>,
    last_access: Instant,
}

struct Inner {
    entries: HashMap<ObjectHash, CacheEntry>,
    target_size: usize,
    target_age: Duration,
}

/// Bounded, aged map from content hash to a shared object instance.
///
/// The cache is the canonicalization point for the store: concurrent loads of
/// the same hash are funneled through [`canonicalize_insert_if_absent`] so
/// that exactly one `Arc<NodeObject>` wins and every caller shares it. A
/// fresh store uses [`canonicalize_replace`] instead, which always wins over
/// any stale cached copy.
///
/// Eviction happens only in [`sweep`]: entries untouched for longer than the
/// target age are dropped, then the least-recently-used remainder is trimmed
/// down to the target size. Fetching an entry refreshes its recency.
///
/// [`canonicalize_insert_if_absent`]: ObjectCache::canonicalize_insert_if_absent
/// [`canonicalize_replace`]: ObjectCache::canonicalize_replace
/// [`sweep`]: ObjectCache::sweep
pub struct ObjectCache {
    inner: Mutex<Inner>,
}

impl ObjectCache {
    /// Create a cache with default bounds.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a cache with the given bounds.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                target_size: config.target_size,
                target_age: config.target_age,
            }),
        }
    }

    /// Look up an object by hash, refreshing its recency on hit.
    pub fn fetch(&self, hash: &ObjectHash) -> Option<Arc<NodeObject>> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let entry = inner.entries.get_mut(hash)?;
        entry.last_access = Instant::now();
        Some(Arc::clone(&entry.object))
    }

    /// Insert unless the hash is already cached; return the canonical instance.
    ///
    /// If another thread won the race, the offered object is discarded and
    /// the already-cached instance is returned, so every caller observing the
    /// same hash observes pointer-identical data.
    pub fn canonicalize_insert_if_absent(&self, object: Arc<NodeObject>) -> Arc<NodeObject> {
        let hash = *object.hash();
        let mut inner = self.inner.lock().expect("lock poisoned");
        let entry = inner
            .entries
            .entry(hash)
            .and_modify(|e| e.last_access = Instant::now())
            .or_insert_with(|| CacheEntry {
                object,
                last_access: Instant::now(),
            });
        Arc::clone(&entry.object)
    }

    /// Insert, overwriting any cached copy; return the (new) canonical instance.
    pub fn canonicalize_replace(&self, object: Arc<NodeObject>) -> Arc<NodeObject> {
        let hash = *object.hash();
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.entries.insert(
            hash,
            CacheEntry {
                object: Arc::clone(&object),
                last_access: Instant::now(),
            },
        );
        object
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
            .retain(|_, entry| now.duration_since(entry.last_access) < target_age);

        let target_size = inner.target_size;
        if inner.entries.len() > target_size {
            let mut by_age: Vec<(ObjectHash, Instant)> = inner
                .entries
                .iter()
                .map(|(hash, entry)| (*hash, entry.last_access))
                .collect();
            by_age.sort_by_key(|(_, last_access)| *last_access);
            let excess = inner.entries.len() - target_size;
            for (hash, _) in by_age.into_iter().take(excess) {
                inner.entries.remove(&hash);
            }
        }

        debug!(
            before,
            after = inner.entries.len(),
            "object cache sweep"
        );
    }

    /// Number of cached objects.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").entries.len()
    }

    /// Returns `true` if the cache holds no objects.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("lock poisoned").entries.is_empty()
    }
}

impl Default for ObjectCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCache")
            .field("entry_count", &self.len())
            .finish()
    }
}
