use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use strata_types::{NodeObject, ObjectHash};

use crate::backend::{Backend, FetchResult};
use crate::error::StoreResult;

enum Slot {
    Intact(NodeObject),
    Poisoned,
}

/// In-memory, HashMap-based backend.
///
/// Intended for tests and embedding. Objects are held behind a `RwLock` and
/// cloned on fetch. `poison` plants a corrupt record under a hash so callers
/// can exercise their corruption handling, and `fetch_calls` counts every
/// fetch that reached this backend so tests can observe cache behavior.
pub struct MemoryBackend {
    name: String,
    slots: RwLock<HashMap<ObjectHash, Slot>>,
    delete_on_drop: AtomicBool,
    fetch_calls: AtomicU64,
}

impl MemoryBackend {
    /// Create a new empty backend with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: RwLock::new(HashMap::new()),
            delete_on_drop: AtomicBool::new(false),
            fetch_calls: AtomicU64::new(0),
        }
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.slots.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the backend holds no records.
    pub fn is_empty(&self) -> bool {
        self.slots.read().expect("lock poisoned").is_empty()
    }

    /// Returns `true` if an intact object is held under this hash.
    pub fn contains(&self, hash: &ObjectHash) -> bool {
        matches!(
            self.slots.read().expect("lock poisoned").get(hash),
            Some(Slot::Intact(_))
        )
    }

    /// Plant a corrupt record under a hash (fault injection for tests).
    pub fn poison(&self, hash: ObjectHash) {
        self.slots
            .write()
            .expect("lock poisoned")
            .insert(hash, Slot::Poisoned);
    }

    /// How many fetches reached this backend.
    pub fn fetch_calls(&self) -> u64 {
        self.fetch_calls.load(Ordering::Relaxed)
    }

    /// Returns `true` if this instance has been scheduled for removal.
    pub fn marked_for_delete(&self) -> bool {
        self.delete_on_drop.load(Ordering::Relaxed)
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, hash: &ObjectHash) -> StoreResult<FetchResult> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        let slots = self.slots.read().expect("lock poisoned");
        Ok(match slots.get(hash) {
            Some(Slot::Intact(object)) => FetchResult::Found(object.clone()),
            Some(Slot::Poisoned) => FetchResult::Corrupt,
            None => FetchResult::NotFound,
        })
    }

    fn store(&self, object: &NodeObject) -> StoreResult<()> {
        let mut slots = self.slots.write().expect("lock poisoned");
        // Idempotent: content-addressing guarantees the same hash always
        // maps to the same bytes.
        slots
            .entry(*object.hash())
            .or_insert_with(|| Slot::Intact(object.clone()));
        Ok(())
    }

    fn for_each(&self, visitor: &mut dyn FnMut(&NodeObject)) -> StoreResult<()> {
        let slots = self.slots.read().expect("lock poisoned");
        for slot in slots.values() {
            if let Slot::Intact(object) = slot {
                visitor(object);
            }
        }
        Ok(())
    }

    fn write_load(&self) -> u64 {
        0
    }

    fn fd_required(&self) -> usize {
        0
    }

    fn set_delete_on_drop(&self) {
        self.delete_on_drop.store(true, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("name", &self.name)
            .field("record_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::ObjectType;

    fn make_object(payload: &[u8]) -> NodeObject {
        NodeObject::from_payload(ObjectType::AccountNode, payload.to_vec())
    }

    // -----------------------------------------------------------------------
    // Store and fetch
    // -----------------------------------------------------------------------

    #[test]
    fn store_and_fetch() {
        let backend = MemoryBackend::new("mem");
        let obj = make_object(b"hello");
        backend.store(&obj).unwrap();

        match backend.fetch(obj.hash()).unwrap() {
            FetchResult::Found(found) => assert_eq!(found, obj),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn fetch_missing_is_not_found() {
        let backend = MemoryBackend::new("mem");
        let hash = ObjectHash::compute(ObjectType::Ledger, b"missing");
        assert!(matches!(
            backend.fetch(&hash).unwrap(),
            FetchResult::NotFound
        ));
    }

    #[test]
    fn store_is_idempotent() {
        let backend = MemoryBackend::new("mem");
        let obj = make_object(b"once");
        backend.store(&obj).unwrap();
        backend.store(&obj).unwrap();
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn store_batch_lands_every_object() {
        let backend = MemoryBackend::new("mem");
        let objects = vec![
            make_object(b"batch-1"),
            make_object(b"batch-2"),
            make_object(b"batch-3"),
        ];
        backend.store_batch(&objects).unwrap();
        assert_eq!(backend.len(), 3);
        for obj in &objects {
            assert!(backend.contains(obj.hash()));
        }
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    #[test]
    fn poisoned_record_reports_corrupt() {
        let backend = MemoryBackend::new("mem");
        let hash = ObjectHash::compute(ObjectType::Ledger, b"bad");
        backend.poison(hash);
        assert!(matches!(backend.fetch(&hash).unwrap(), FetchResult::Corrupt));
        assert!(!backend.contains(&hash));
    }

    // -----------------------------------------------------------------------
    // Iteration
    // -----------------------------------------------------------------------

    #[test]
    fn for_each_visits_intact_objects_only() {
        let backend = MemoryBackend::new("mem");
        backend.store(&make_object(b"a")).unwrap();
        backend.store(&make_object(b"b")).unwrap();
        backend.poison(ObjectHash::compute(ObjectType::Ledger, b"bad"));

        let mut seen = 0;
        backend.for_each(&mut |_| seen += 1).unwrap();
        assert_eq!(seen, 2);
    }

    // -----------------------------------------------------------------------
    // Instrumentation and metadata
    // -----------------------------------------------------------------------

    #[test]
    fn fetch_calls_counts_hits_and_misses() {
        let backend = MemoryBackend::new("mem");
        let obj = make_object(b"counted");
        backend.store(&obj).unwrap();

        backend.fetch(obj.hash()).unwrap();
        backend
            .fetch(&ObjectHash::compute(ObjectType::Ledger, b"absent"))
            .unwrap();
        assert_eq!(backend.fetch_calls(), 2);
    }

    #[test]
    fn delete_on_drop_flag() {
        let backend = MemoryBackend::new("mem");
        assert!(!backend.marked_for_delete());
        backend.set_delete_on_drop();
        assert!(backend.marked_for_delete());
    }

    #[test]
    fn reports_no_fd_and_no_write_load() {
        let backend = MemoryBackend::new("mem");
        assert_eq!(backend.fd_required(), 0);
        assert_eq!(backend.write_load(), 0);
    }

    #[test]
    fn debug_format() {
        let backend = MemoryBackend::new("mem");
        backend.store(&make_object(b"x")).unwrap();
        let debug = format!("{backend:?}");
        assert!(debug.contains("MemoryBackend"));
        assert!(debug.contains("record_count"));
    }
}
