use std::time::Duration;

/// Default number of entries a cache aims to hold after a sweep.
pub const DEFAULT_TARGET_SIZE: usize = 16_384;

/// Default age past which an unreferenced entry is swept.
pub const DEFAULT_TARGET_AGE: Duration = Duration::from_secs(300);

/// Capacity and age bounds shared by both cache tiers.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Entry count the sweep pass reduces the cache to.
    pub target_size: usize,
    /// Entries untouched for longer than this are swept.
    pub target_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            target_age: DEFAULT_TARGET_AGE,
        }
    }
}
