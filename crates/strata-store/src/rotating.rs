use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use strata_cache::{CacheConfig, MissCache, ObjectCache};
use strata_types::{NodeObject, ObjectHash};

use crate::backend::{Backend, FetchResult, IMPORT_BATCH};
use crate::dispatch::{Dispatcher, ThreadDispatcher};
use crate::error::{StoreError, StoreResult};
use crate::stats::{Counters, StoreStats};

struct BackendPair {
    writable: Arc<dyn Backend>,
    archive: Option<Arc<dyn Backend>>,
}

/// Result of [`RotatingStore::async_fetch`].
///
/// Cache-answerable fetches resolve synchronously without scheduling any
/// work; everything else is dispatched and completes through a channel.
/// [`wait`](AsyncFetch::wait) unifies both paths.
pub enum AsyncFetch {
    /// Answered from the caches; no work was dispatched.
    Resolved(Option<Arc<NodeObject>>),
    /// A backend read is in flight on the dispatcher.
    Pending(oneshot::Receiver<StoreResult<Option<Arc<NodeObject>>>>),
}

impl AsyncFetch {
    /// Returns `true` if the fetch was answered without dispatching work.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Wait for the result, however it was produced.
    pub async fn wait(self) -> StoreResult<Option<Arc<NodeObject>>> {
        match self {
            Self::Resolved(result) => Ok(result),
            Self::Pending(rx) => rx.await.map_err(|_| StoreError::FetchAbandoned)?,
        }
    }
}

/// Content-addressed object store over a rotating pair of backends.
///
/// All new stores go to the *writable* backend; the *archive* backend is the
/// previous writable, read-only and pending retirement. [`rotate`] swaps in a
/// fresh writable under a mutex that guards backend identity only: the
/// critical section is a pointer swap, never I/O, so slow disks cannot stall
/// rotation and rotation cannot stall readers. Handles are reference-counted:
/// an in-flight operation that copied a handle before a rotation keeps a
/// fully functional backend for as long as it needs it.
///
/// Fetches consult the object cache, then the miss cache, then the writable
/// and archive backends in order. An object found only in the archive is
/// written back into the current writable (promotion) so it survives the
/// archive's retirement. Objects loaded from a backend enter the object
/// cache through a canonicalizing insert, so concurrent fetches of one hash
/// converge on a single shared instance.
///
/// [`rotate`]: RotatingStore::rotate
pub struct RotatingStore {
    object_cache: ObjectCache,
    miss_cache: MissCache,
    backends: Mutex<BackendPair>,
    counters: Counters,
    /// Summed from the initial pair; deliberately not recomputed on rotation.
    fd_required: usize,
    dispatcher: Arc<dyn Dispatcher>,
}

impl RotatingStore {
    /// Create a store with default cache bounds and a thread-per-job
    /// dispatcher for asynchronous fetches.
    pub fn new(writable: Arc<dyn Backend>, archive: Option<Arc<dyn Backend>>) -> Self {
        Self::with_config(
            writable,
            archive,
            CacheConfig::default(),
            Arc::new(ThreadDispatcher),
        )
    }

    /// Create a store with explicit cache bounds and dispatcher.
    pub fn with_config(
        writable: Arc<dyn Backend>,
        archive: Option<Arc<dyn Backend>>,
        cache_config: CacheConfig,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let fd_required =
            writable.fd_required() + archive.as_ref().map_or(0, |a| a.fd_required());
        Self {
            object_cache: ObjectCache::with_config(cache_config.clone()),
            miss_cache: MissCache::with_config(cache_config),
            backends: Mutex::new(BackendPair { writable, archive }),
            counters: Counters::default(),
            fd_required,
            dispatcher,
        }
    }

    /// Copy out both backend handles. Held only for the pointer copies.
    fn backend_pair(&self) -> (Arc<dyn Backend>, Option<Arc<dyn Backend>>) {
        let pair = self.backends.lock().expect("lock poisoned");
        (Arc::clone(&pair.writable), pair.archive.clone())
    }

    /// Copy out the current writable handle.
    fn writable_handle(&self) -> Arc<dyn Backend> {
        let pair = self.backends.lock().expect("lock poisoned");
        Arc::clone(&pair.writable)
    }

    /// Query one backend, translating its status codes.
    ///
    /// `NotFound` and unrecognized statuses fall through as misses; corruption
    /// and engine failure are logged and escalated, never masked as absence.
    fn fetch_from(
        &self,
        backend: &dyn Backend,
        hash: &ObjectHash,
    ) -> StoreResult<Option<NodeObject>> {
        match backend.fetch(hash) {
            Ok(FetchResult::Found(object)) => {
                self.counters.record_fetch_hit(object.size());
                Ok(Some(object))
            }
            Ok(FetchResult::NotFound) => Ok(None),
            Ok(FetchResult::Corrupt) => {
                error!(
                    backend = backend.name(),
                    hash = %hash.short_hex(),
                    "backend holds corrupt object"
                );
                Err(StoreError::Corrupt { hash: *hash })
            }
            Ok(FetchResult::Unrecognized(code)) => {
                warn!(backend = backend.name(), code, "unrecognized backend status");
                Ok(None)
            }
            Err(e) => {
                error!(backend = backend.name(), error = %e, "backend fetch failed");
                Err(e)
            }
        }
    }

    /// Look up an object by content hash.
    ///
    /// Returns `Ok(None)` only when the object is absent from the caches and
    /// both backends; the absence is then remembered in the miss cache.
    pub fn fetch(&self, hash: &ObjectHash) -> StoreResult<Option<Arc<NodeObject>>> {
        if let Some(object) = self.object_cache.fetch(hash) {
            return Ok(Some(object));
        }
        if self.miss_cache.touch_if_exists(hash) {
            return Ok(None);
        }

        let (writable, archive) = self.backend_pair();

        let mut found = self.fetch_from(writable.as_ref(), hash)?;
        if found.is_none() {
            if let Some(archive) = archive {
                found = self.fetch_from(archive.as_ref(), hash)?;
                if let Some(object) = &found {
                    // The writable may have rotated since the copy above;
                    // promote into whichever backend is writable now.
                    let current = self.writable_handle();
                    if let Err(e) = current.store(object) {
                        error!(
                            backend = current.name(),
                            error = %e,
                            "promotion into writable backend failed"
                        );
                        return Err(e);
                    }
                    self.miss_cache.erase(hash);
                    debug!(
                        hash = %hash.short_hex(),
                        backend = current.name(),
                        "promoted object out of archive"
                    );
                }
            }
        }

        match found {
            Some(object) => {
                let canonical = self.object_cache.canonicalize_insert_if_absent(Arc::new(object));
                Ok(Some(canonical))
            }
            None => {
                // A concurrent store may have landed it cache-side after the
                // miss-cache check; only a confirmed double miss is recorded.
                if let Some(object) = self.object_cache.fetch(hash) {
                    return Ok(Some(object));
                }
                self.miss_cache.insert(*hash);
                Ok(None)
            }
        }
    }

    /// Look up an object, resolving synchronously when the caches can answer.
    ///
    /// A cache hit (or a remembered miss) resolves immediately without
    /// touching the dispatcher. Otherwise the backend read runs as a
    /// dispatched job and the result arrives through the returned handle.
    pub fn async_fetch(self: Arc<Self>, hash: &ObjectHash) -> AsyncFetch {
        if let Some(object) = self.object_cache.fetch(hash) {
            return AsyncFetch::Resolved(Some(object));
        }
        if self.miss_cache.touch_if_exists(hash) {
            return AsyncFetch::Resolved(None);
        }

        let (tx, rx) = oneshot::channel();
        let hash = *hash;
        let dispatcher = Arc::clone(&self.dispatcher);
        dispatcher.dispatch(Box::new(move || {
            // Receiver may have been dropped; the result is then discarded.
            let _ = tx.send(self.fetch(&hash));
        }));
        AsyncFetch::Pending(rx)
    }

    /// Persist an object and make it immediately visible to fetches.
    ///
    /// The object enters the cache with replace semantics (a fresh store
    /// always wins over a stale cached copy) before the backend write, and
    /// any remembered absence for its hash is erased. Returns the canonical
    /// cached instance.
    pub fn store(&self, object: NodeObject) -> StoreResult<Arc<NodeObject>> {
        let object = Arc::new(object);
        let canonical = self.object_cache.canonicalize_replace(Arc::clone(&object));

        let writable = self.writable_handle();
        if let Err(e) = writable.store(&object) {
            error!(backend = writable.name(), error = %e, "backend store failed");
            return Err(e);
        }

        self.miss_cache.erase(object.hash());
        self.counters.record_store(object.size());
        Ok(canonical)
    }

    /// Swap in a fresh writable backend.
    ///
    /// The factory receives the current writable's name (to derive naming or
    /// paths) and runs inside the critical section. On success the previous
    /// archive is marked for deletion once unreferenced, the old writable
    /// becomes the archive, and the factory's backend takes over writes. A
    /// factory error propagates with the store's routing unchanged.
    pub fn rotate<F>(&self, factory: F) -> StoreResult<()>
    where
        F: FnOnce(&str) -> StoreResult<Arc<dyn Backend>>,
    {
        let mut pair = self.backends.lock().expect("lock poisoned");
        let fresh = factory(pair.writable.name())?;

        if let Some(retired) = pair.archive.take() {
            retired.set_delete_on_drop();
        }
        let demoted = std::mem::replace(&mut pair.writable, fresh);
        pair.archive = Some(demoted);

        debug!(writable = pair.writable.name(), "backend rotated");
        Ok(())
    }

    /// Bulk-copy every object from a source backend into the current
    /// writable backend, in batches.
    pub fn import(&self, source: &dyn Backend) -> StoreResult<()> {
        let writable = self.writable_handle();
        let mut pending: Vec<NodeObject> = Vec::with_capacity(IMPORT_BATCH);
        let mut failure: Option<StoreError> = None;
        let mut copied = 0usize;

        source.for_each(&mut |object| {
            if failure.is_some() {
                return;
            }
            pending.push(object.clone());
            if pending.len() >= IMPORT_BATCH {
                if let Err(e) = writable.store_batch(&pending) {
                    failure = Some(e);
                    return;
                }
                copied += pending.len();
                pending.clear();
            }
        })?;

        if let Some(e) = failure {
            error!(backend = writable.name(), error = %e, "import aborted");
            return Err(e);
        }
        if !pending.is_empty() {
            writable.store_batch(&pending)?;
            copied += pending.len();
        }

        debug!(
            source = source.name(),
            backend = writable.name(),
            copied,
            "import complete"
        );
        Ok(())
    }

    /// Reconfigure both caches' capacity and age bounds.
    pub fn tune(&self, size: usize, age: Duration) {
        self.object_cache.set_target_size(size);
        self.object_cache.set_target_age(age);
        self.miss_cache.set_target_size(size);
        self.miss_cache.set_target_age(age);
    }

    /// Run an eviction pass on both caches.
    pub fn sweep(&self) {
        self.object_cache.sweep();
        self.miss_cache.sweep();
    }

    /// Visit every object in the writable backend, then every object in the
    /// archive backend.
    ///
    /// No deduplication is performed across the pair: an object promoted out
    /// of the archive exists in both backends and is visited twice. That is
    /// a documented property of iteration, not a fault.
    pub fn for_each(&self, visitor: &mut dyn FnMut(&NodeObject)) -> StoreResult<()> {
        let (writable, archive) = self.backend_pair();
        writable.for_each(visitor)?;
        if let Some(archive) = archive {
            archive.for_each(visitor)?;
        }
        Ok(())
    }

    /// The current writable backend's name.
    pub fn name(&self) -> String {
        self.writable_handle().name().to_string()
    }

    /// Pending-write pressure of the current writable backend only; archive
    /// load is not reflected.
    pub fn write_load(&self) -> u64 {
        self.writable_handle().write_load()
    }

    /// File descriptors required, summed over the construction-time pair.
    ///
    /// Rotation does not recompute this total, so it goes stale if a rotation
    /// installs a backend with a different requirement.
    pub fn fd_required(&self) -> usize {
        self.fd_required
    }

    /// Snapshot of this instance's monotonic counters.
    pub fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }
}

impl std::fmt::Debug for RotatingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingStore")
            .field("writable", &self.name())
            .field("cached_objects", &self.object_cache.len())
            .field("cached_misses", &self.miss_cache.len())
            .finish()
    }
}
