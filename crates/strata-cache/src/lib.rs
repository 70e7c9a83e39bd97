//! In-memory caches fronting the Strata object store.
//!
//! Two tiers sit between callers and the storage backends:
//!
//! - [`ObjectCache`] — a capacity-and-age-bounded map from content hash to
//!   [`Arc<NodeObject>`](strata_types::NodeObject). Its canonicalizing insert
//!   operations guarantee that all threads fetching the same hash converge on
//!   a single shared instance.
//! - [`MissCache`] — a capacity-and-age-bounded set of hashes known to be
//!   absent from the backends, so repeated fetches of missing objects do not
//!   touch disk.
//!
//! Neither cache is authoritative: a cache miss never implies backend
//! absence, and eviction never implies deletion. Both caches are internally
//! thread-safe and infallible (memory-only).

pub mod config;
pub mod miss_cache;
pub mod object_cache;

pub use config::CacheConfig;
pub use miss_cache::MissCache;
pub use object_cache::ObjectCache;
