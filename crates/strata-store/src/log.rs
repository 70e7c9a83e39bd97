use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use tracing::{debug, warn};

use strata_types::{NodeObject, ObjectHash};

use crate::backend::{Backend, FetchResult};
use crate::error::{StoreError, StoreResult};

/// Header size: 4 bytes payload length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Where a record's payload lives in the log file.
#[derive(Clone, Copy)]
struct RecordLocation {
    offset: u64,
    len: u32,
}

struct LogWriter {
    writer: BufWriter<File>,
    /// Current write offset in the log file.
    offset: u64,
}

/// Append-only, single-file storage backend.
///
/// On-disk format, one record per stored object:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized NodeObject)]
/// ```
///
/// An in-memory index maps content hash to file offset. On open the file is
/// scanned front-to-back to rebuild the index; a torn tail (incomplete record
/// from a crash) is dropped so later appends stay parseable, and records that
/// fail their CRC are skipped. A record that passes recovery but fails its
/// CRC on a later read is reported as [`FetchResult::Corrupt`].
pub struct LogBackend {
    name: String,
    path: PathBuf,
    writer: Mutex<LogWriter>,
    reader: Mutex<File>,
    index: RwLock<HashMap<ObjectHash, RecordLocation>>,
    writes_in_flight: AtomicU64,
    delete_on_drop: AtomicBool,
}

impl LogBackend {
    /// Open (or create) a log file at the given path, rebuilding the index.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (index, valid_end) = Self::recover(&file)?;
        let file_len = file.metadata()?.len();
        if valid_end < file_len {
            // Drop the torn tail so later appends stay parseable.
            warn!(
                path = %path.display(),
                valid_end,
                file_len,
                "truncating torn log tail"
            );
            file.set_len(valid_end)?;
        }

        let reader = File::open(path)?;
        debug!(path = %path.display(), records = index.len(), "log opened");

        Ok(Self {
            name: path.display().to_string(),
            path: path.to_path_buf(),
            writer: Mutex::new(LogWriter {
                writer: BufWriter::new(file),
                offset: valid_end,
            }),
            reader: Mutex::new(reader),
            index: RwLock::new(index),
            writes_in_flight: AtomicU64::new(0),
            delete_on_drop: AtomicBool::new(false),
        })
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.index.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no records are indexed.
    pub fn is_empty(&self) -> bool {
        self.index.read().expect("lock poisoned").is_empty()
    }

    /// Returns `true` if an object is indexed under this hash.
    pub fn contains(&self, hash: &ObjectHash) -> bool {
        self.index.read().expect("lock poisoned").contains_key(hash)
    }

    /// Scan the file front-to-back, returning the index and the offset one
    /// past the last complete record.
    fn recover(file: &File) -> StoreResult<(HashMap<ObjectHash, RecordLocation>, u64)> {
        let file_len = file.metadata()?.len();
        let mut reader = io::BufReader::new(file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut index = HashMap::new();
        let mut offset: u64 = 0;

        while offset + HEADER_SIZE as u64 <= file_len {
            let mut header = [0u8; HEADER_SIZE];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 || offset + HEADER_SIZE as u64 + length as u64 > file_len {
                warn!(offset, length, file_len, "incomplete log record; stopping recovery");
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(offset, "truncated log record; stopping recovery");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let record_end = offset + HEADER_SIZE as u64 + length as u64;

            if crc32fast::hash(&payload) != expected_crc {
                warn!(offset, "CRC mismatch; skipping log record");
                offset = record_end;
                continue;
            }

            match bincode::deserialize::<NodeObject>(&payload) {
                Ok(object) => {
                    index.insert(*object.hash(), RecordLocation { offset, len: length });
                }
                Err(e) => {
                    warn!(offset, error = %e, "undecodable log record; skipping");
                }
            }

            offset = record_end;
        }

        Ok((index, offset))
    }

    /// Read and decode the record at the given location.
    fn read_record(&self, location: RecordLocation) -> StoreResult<FetchResult> {
        let mut payload = vec![0u8; location.len as usize];
        let expected_crc;
        {
            let mut reader = self.reader.lock().expect("lock poisoned");
            reader.seek(SeekFrom::Start(location.offset))?;
            let mut header = [0u8; HEADER_SIZE];
            reader.read_exact(&mut header)?;
            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            if length != location.len {
                return Ok(FetchResult::Corrupt);
            }
            expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            reader.read_exact(&mut payload)?;
        }

        if crc32fast::hash(&payload) != expected_crc {
            return Ok(FetchResult::Corrupt);
        }
        match bincode::deserialize::<NodeObject>(&payload) {
            Ok(object) => Ok(FetchResult::Found(object)),
            Err(_) => Ok(FetchResult::Corrupt),
        }
    }

    fn append_record(w: &mut LogWriter, object: &NodeObject) -> StoreResult<RecordLocation> {
        let payload =
            bincode::serialize(object).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = payload.len() as u32;
        let crc = crc32fast::hash(&payload);
        let offset = w.offset;

        w.writer.write_all(&length.to_le_bytes())?;
        w.writer.write_all(&crc.to_le_bytes())?;
        w.writer.write_all(&payload)?;

        w.offset += HEADER_SIZE as u64 + payload.len() as u64;
        Ok(RecordLocation { offset, len: length })
    }
}

impl Backend for LogBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, hash: &ObjectHash) -> StoreResult<FetchResult> {
        let location = {
            let index = self.index.read().expect("lock poisoned");
            match index.get(hash) {
                Some(location) => *location,
                None => return Ok(FetchResult::NotFound),
            }
        };

        match self.read_record(location)? {
            FetchResult::Found(object) if object.hash() != hash => {
                // The bytes decode but describe a different object.
                Ok(FetchResult::Corrupt)
            }
            result => Ok(result),
        }
    }

    fn store(&self, object: &NodeObject) -> StoreResult<()> {
        if self.contains(object.hash()) {
            return Ok(());
        }

        self.writes_in_flight.fetch_add(1, Ordering::Relaxed);
        let result = (|| {
            let mut w = self.writer.lock().expect("lock poisoned");
            if self.contains(object.hash()) {
                return Ok(());
            }
            let location = Self::append_record(&mut w, object)?;
            w.writer.flush()?;
            self.index
                .write()
                .expect("lock poisoned")
                .insert(*object.hash(), location);
            debug!(offset = location.offset, len = location.len, "log append");
            Ok(())
        })();
        self.writes_in_flight.fetch_sub(1, Ordering::Relaxed);
        result
    }

    fn store_batch(&self, objects: &[NodeObject]) -> StoreResult<()> {
        self.writes_in_flight.fetch_add(1, Ordering::Relaxed);
        let result = (|| {
            let mut w = self.writer.lock().expect("lock poisoned");
            let mut locations = Vec::with_capacity(objects.len());
            for object in objects {
                if self.contains(object.hash()) {
                    continue;
                }
                let location = Self::append_record(&mut w, object)?;
                locations.push((*object.hash(), location));
            }
            w.writer.flush()?;
            let mut index = self.index.write().expect("lock poisoned");
            for (hash, location) in locations {
                index.insert(hash, location);
            }
            Ok(())
        })();
        self.writes_in_flight.fetch_sub(1, Ordering::Relaxed);
        result
    }

    fn for_each(&self, visitor: &mut dyn FnMut(&NodeObject)) -> StoreResult<()> {
        let locations: Vec<RecordLocation> = {
            let index = self.index.read().expect("lock poisoned");
            index.values().copied().collect()
        };

        for location in locations {
            match self.read_record(location)? {
                FetchResult::Found(object) => visitor(&object),
                _ => warn!(
                    offset = location.offset,
                    "skipping unreadable record during iteration"
                ),
            }
        }
        Ok(())
    }

    fn write_load(&self) -> u64 {
        self.writes_in_flight.load(Ordering::Relaxed)
    }

    fn fd_required(&self) -> usize {
        // One append handle, one read handle.
        2
    }

    fn set_delete_on_drop(&self) {
        self.delete_on_drop.store(true, Ordering::Relaxed);
    }
}

impl Drop for LogBackend {
    fn drop(&mut self) {
        if self.delete_on_drop.load(Ordering::Relaxed) {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to delete retired log");
            } else {
                debug!(path = %self.path.display(), "deleted retired log");
            }
        }
    }
}

impl std::fmt::Debug for LogBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBackend")
            .field("path", &self.path)
            .field("record_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::ObjectType;

    fn make_object(payload: &[u8]) -> NodeObject {
        NodeObject::from_payload(ObjectType::TransactionNode, payload.to_vec())
    }

    fn expect_found(result: FetchResult) -> NodeObject {
        match result {
            FetchResult::Found(object) => object,
            other => panic!("expected Found, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Round-trip and recovery
    // -----------------------------------------------------------------------

    #[test]
    fn store_and_fetch_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LogBackend::open(&dir.path().join("objects.log")).unwrap();

        let obj = make_object(b"payload");
        backend.store(&obj).unwrap();

        let found = expect_found(backend.fetch(obj.hash()).unwrap());
        assert_eq!(found, obj);
    }

    #[test]
    fn fetch_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LogBackend::open(&dir.path().join("objects.log")).unwrap();
        let hash = ObjectHash::compute(ObjectType::Ledger, b"missing");
        assert!(matches!(
            backend.fetch(&hash).unwrap(),
            FetchResult::NotFound
        ));
    }

    #[test]
    fn reopen_recovers_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.log");
        let objects: Vec<NodeObject> = (0..3u8).map(|i| make_object(&[i; 16])).collect();

        {
            let backend = LogBackend::open(&path).unwrap();
            for obj in &objects {
                backend.store(obj).unwrap();
            }
        }

        let backend = LogBackend::open(&path).unwrap();
        assert_eq!(backend.len(), 3);
        for obj in &objects {
            let found = expect_found(backend.fetch(obj.hash()).unwrap());
            assert_eq!(&found, obj);
        }
    }

    #[test]
    fn torn_tail_is_dropped_and_appends_continue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.log");
        let first = make_object(b"first");
        let second = make_object(b"second");

        let total_len;
        {
            let backend = LogBackend::open(&path).unwrap();
            backend.store(&first).unwrap();
            backend.store(&second).unwrap();
            total_len = fs::metadata(&path).unwrap().len();
        }

        // Tear the second record mid-payload.
        {
            let file = OpenOptions::new().write(true).open(&path).unwrap();
            file.set_len(total_len - 4).unwrap();
        }

        let backend = LogBackend::open(&path).unwrap();
        assert_eq!(backend.len(), 1);
        assert!(backend.contains(first.hash()));
        assert!(!backend.contains(second.hash()));

        // New appends after the truncated tail survive another reopen.
        let third = make_object(b"third");
        backend.store(&third).unwrap();
        drop(backend);

        let backend = LogBackend::open(&path).unwrap();
        assert_eq!(backend.len(), 2);
        assert!(backend.contains(third.hash()));
    }

    #[test]
    fn store_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.log");
        let backend = LogBackend::open(&path).unwrap();
        let obj = make_object(b"same");

        backend.store(&obj).unwrap();
        let len_after_first = fs::metadata(&path).unwrap().len();
        backend.store(&obj).unwrap();
        // Second store appended nothing.
        assert_eq!(fs::metadata(&path).unwrap().len(), len_after_first);
        assert_eq!(backend.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Corruption
    // -----------------------------------------------------------------------

    #[test]
    fn bit_rot_reports_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.log");
        let backend = LogBackend::open(&path).unwrap();
        let obj = make_object(b"will rot");
        backend.store(&obj).unwrap();

        // Flip a byte inside the stored payload.
        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            let mut b = [0u8; 1];
            file.read_exact(&mut b).unwrap();
            b[0] ^= 0xFF;
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            file.write_all(&b).unwrap();
            file.sync_all().unwrap();
        }

        assert!(matches!(
            backend.fetch(obj.hash()).unwrap(),
            FetchResult::Corrupt
        ));
    }

    // -----------------------------------------------------------------------
    // Batch writes
    // -----------------------------------------------------------------------

    #[test]
    fn store_batch_lands_every_object() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LogBackend::open(&dir.path().join("objects.log")).unwrap();
        let objects: Vec<NodeObject> = (0..10u8).map(|i| make_object(&[i; 8])).collect();

        backend.store_batch(&objects).unwrap();
        assert_eq!(backend.len(), 10);
        for obj in &objects {
            assert!(backend.contains(obj.hash()));
        }
    }

    // -----------------------------------------------------------------------
    // Iteration
    // -----------------------------------------------------------------------

    #[test]
    fn for_each_visits_all_records() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LogBackend::open(&dir.path().join("objects.log")).unwrap();
        let objects: Vec<NodeObject> = (0..5u8).map(|i| make_object(&[i; 4])).collect();
        for obj in &objects {
            backend.store(obj).unwrap();
        }

        let mut seen = Vec::new();
        backend.for_each(&mut |obj| seen.push(*obj.hash())).unwrap();
        assert_eq!(seen.len(), 5);
        for obj in &objects {
            assert!(seen.contains(obj.hash()));
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle and metadata
    // -----------------------------------------------------------------------

    #[test]
    fn delete_on_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retired.log");
        let backend = LogBackend::open(&path).unwrap();
        backend.store(&make_object(b"data")).unwrap();
        assert!(path.exists());

        backend.set_delete_on_drop();
        drop(backend);
        assert!(!path.exists());
    }

    #[test]
    fn file_survives_drop_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kept.log");
        let backend = LogBackend::open(&path).unwrap();
        backend.store(&make_object(b"data")).unwrap();
        drop(backend);
        assert!(path.exists());
    }

    #[test]
    fn name_is_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("named.log");
        let backend = LogBackend::open(&path).unwrap();
        assert_eq!(backend.name(), path.display().to_string());
    }

    #[test]
    fn reports_two_fds_and_idle_write_load() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LogBackend::open(&dir.path().join("objects.log")).unwrap();
        assert_eq!(backend.fd_required(), 2);
        assert_eq!(backend.write_load(), 0);
    }
}
