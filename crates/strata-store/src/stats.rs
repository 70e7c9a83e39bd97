use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters owned by a store instance, reset only at restart.
///
/// Relaxed ordering throughout: these are telemetry, not synchronization.
#[derive(Default)]
pub(crate) struct Counters {
    store_count: AtomicU64,
    store_bytes: AtomicU64,
    fetch_hit_count: AtomicU64,
    fetch_hit_bytes: AtomicU64,
}

impl Counters {
    pub(crate) fn record_store(&self, bytes: u64) {
        self.store_count.fetch_add(1, Ordering::Relaxed);
        self.store_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch_hit(&self, bytes: u64) {
        self.fetch_hit_count.fetch_add(1, Ordering::Relaxed);
        self.fetch_hit_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StoreStats {
        StoreStats {
            store_count: self.store_count.load(Ordering::Relaxed),
            store_bytes: self.store_bytes.load(Ordering::Relaxed),
            fetch_hit_count: self.fetch_hit_count.load(Ordering::Relaxed),
            fetch_hit_bytes: self.fetch_hit_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a store's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Objects written through this store.
    pub store_count: u64,
    /// Total payload bytes written through this store.
    pub store_bytes: u64,
    /// Fetches answered by a backend (cache hits are not counted).
    pub fetch_hit_count: u64,
    /// Total payload bytes fetched from backends.
    pub fetch_hit_bytes: u64,
}
