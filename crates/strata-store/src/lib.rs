//! Rotating content-addressed object store for the Strata ledger node.
//!
//! This crate implements the node's immutable-object storage tier: a
//! hash-keyed key/value layer holding ledger objects, fronted by a two-tier
//! in-memory cache and backed by a *pair* of pluggable backends that can be
//! swapped live while the node keeps serving reads and writes.
//!
//! # Components
//!
//! - [`Backend`] — capability trait for a persistent key/value engine;
//!   instances are shared by reference count so a swap changes routing, not
//!   backend lifetime
//! - [`MemoryBackend`] — `HashMap`-based backend for tests and embedding
//! - [`LogBackend`] — append-only single-file backend with CRC-framed
//!   records and crash recovery
//! - [`RotatingStore`] — the core: owns the backend pair, the caches, and
//!   the statistics; implements fetch, store, rotate, import, sweep/tune,
//!   and iteration
//! - [`Dispatcher`] — seam to the node's job-dispatch facility for
//!   asynchronous fetches
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; content-addressing guarantees that
//!    re-storing a hash is a no-op.
//! 2. The store's own mutex guards backend *identity* only. The critical
//!    section is a pointer copy or swap, never I/O, so slow backends
//!    cannot stall rotation and rotation cannot stall readers.
//! 3. Concurrent fetches of one hash converge on a single cached instance
//!    (canonicalization).
//! 4. Absence is remembered in a miss cache but never cached permanently: a
//!    real store erases the absence record.
//! 5. Corruption and backend failure are logged and propagated, never
//!    silently converted into absence.

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod log;
pub mod memory;
pub mod rotating;
pub mod stats;

pub use backend::{Backend, FetchResult};
pub use dispatch::{Dispatcher, InlineDispatcher, ThreadDispatcher};
pub use error::{StoreError, StoreResult};
pub use log::LogBackend;
pub use memory::MemoryBackend;
pub use rotating::{AsyncFetch, RotatingStore};
pub use stats::StoreStats;
