use strata_types::{NodeObject, ObjectHash};

use crate::error::StoreResult;

/// How many objects an import buffers before writing them through.
pub(crate) const IMPORT_BATCH: usize = 256;

/// Outcome of a backend fetch.
///
/// Only transport-level failures are `Err` at the trait boundary; everything
/// the engine itself can say about a key is a status here. The store treats
/// `NotFound` as a normal miss, escalates `Corrupt`, and logs-and-ignores
/// statuses it does not recognize.
#[derive(Debug)]
pub enum FetchResult {
    /// The object was found intact.
    Found(NodeObject),
    /// The backend holds nothing under this hash.
    NotFound,
    /// The backend holds data under this hash that fails integrity checks.
    Corrupt,
    /// The backend reported a status code this layer does not recognize.
    Unrecognized(u32),
}

/// A pluggable persistent key/value engine instance.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written; re-storing the same hash is a no-op.
/// - `fetch` never blocks indefinitely and never invents data: a key is
///   found intact, absent, or reported corrupt.
/// - Concurrent `fetch`/`store`/`for_each` calls are safe.
/// - All engine-level I/O errors are propagated, never silently ignored.
///
/// Instances are shared by reference count. A caller holding a handle keeps
/// a fully functional backend even after the store's routing has moved on;
/// `set_delete_on_drop` schedules physical removal for when the last handle
/// is released.
pub trait Backend: Send + Sync {
    /// Human-readable name for this instance (for file-backed engines,
    /// typically the path).
    fn name(&self) -> &str;

    /// Look up an object by content hash.
    fn fetch(&self, hash: &ObjectHash) -> StoreResult<FetchResult>;

    /// Persist an object under its content hash.
    fn store(&self, object: &NodeObject) -> StoreResult<()>;

    /// Persist a batch of objects.
    ///
    /// Default implementation calls `store()` for each object. Engines may
    /// override for better performance (e.g., a single write lock or fsync).
    fn store_batch(&self, objects: &[NodeObject]) -> StoreResult<()> {
        for object in objects {
            self.store(object)?;
        }
        Ok(())
    }

    /// Invoke the visitor for every object held by this instance.
    fn for_each(&self, visitor: &mut dyn FnMut(&NodeObject)) -> StoreResult<()>;

    /// Pending-write pressure, the caller's only self-throttling signal.
    fn write_load(&self) -> u64;

    /// File descriptors this instance needs while open.
    fn fd_required(&self) -> usize;

    /// Schedule physical removal of this instance's storage for when the
    /// last handle to it is released.
    fn set_delete_on_drop(&self);
}
