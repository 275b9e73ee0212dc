//! Append-only log file record store.

use crate::error::{StorageError, StorageResult};
use crate::frame::{Decoded, Frame, LoggedWrite};
use crate::record::{RecordBatch, StoredRecord};
use crate::store::{apply_validated, validate_batch, RecordStore};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A record store persisted as an append-only log file.
///
/// Every [`RecordBatch`] becomes a single CRC-protected frame, so a batch
/// is either fully in the log or not at all. On open the log is replayed
/// into an in-memory table; a torn frame at the tail (from a crash during
/// append) is truncated away.
///
/// # Durability
///
/// - every append is flushed to the OS
/// - with `sync_on_write` the file is also `sync_data`'d before `apply` returns
///
/// # Locking
///
/// The log file is held under an exclusive advisory lock for the lifetime
/// of the store; a second open from another process fails with
/// [`StorageError::Locked`].
///
/// # Example
///
/// ```no_run
/// use evostore_storage::{FileRecordStore, RecordStore};
/// use std::path::Path;
///
/// let store = FileRecordStore::open(Path::new("entities.log")).unwrap();
/// store.ensure_schema("evostore").unwrap();
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    sync_on_write: bool,
    file: Mutex<File>,
    state: RwLock<LogState>,
}

#[derive(Debug, Default)]
struct LogState {
    schema: Option<String>,
    records: BTreeMap<u64, StoredRecord>,
    max_pk: Option<u64>,
    len: u64,
}

impl LogState {
    fn replay(bytes: &[u8]) -> StorageResult<Self> {
        let mut state = Self::default();
        let mut offset = 0usize;

        while offset < bytes.len() {
            match Frame::decode(&bytes[offset..])? {
                Decoded::Frame(frame, frame_len) => {
                    state.apply_frame(frame)?;
                    offset += frame_len;
                }
                Decoded::Truncated => break,
                Decoded::BadChecksum { frame_len } if offset + frame_len == bytes.len() => break,
                Decoded::BadChecksum { .. } => {
                    return Err(StorageError::corrupted(format!(
                        "checksum mismatch in frame at offset {offset}"
                    )))
                }
            }
        }

        state.len = offset as u64;
        Ok(state)
    }

    fn apply_frame(&mut self, frame: Frame) -> StorageResult<()> {
        match frame {
            Frame::Schema(name) => match &self.schema {
                Some(existing) if *existing != name => {
                    return Err(StorageError::corrupted(format!(
                        "log holds two schemas: {existing:?} and {name:?}"
                    )))
                }
                _ => self.schema = Some(name),
            },
            Frame::Batch(writes) => {
                for write in writes {
                    match write {
                        LoggedWrite::Put(record) => {
                            self.max_pk = self.max_pk.max(Some(record.pk));
                            self.records.insert(record.pk, record);
                        }
                        LoggedWrite::Delete(pk) => {
                            self.max_pk = self.max_pk.max(Some(pk));
                            self.records.remove(&pk);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl FileRecordStore {
    /// Opens or creates a log at `path`, syncing on every write.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or locked, or if the
    /// log is corrupted before its tail.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with(path, true)
    }

    /// Opens or creates a log, choosing whether writes are synced.
    ///
    /// # Errors
    ///
    /// Same as [`FileRecordStore::open`].
    pub fn open_with(path: &Path, sync_on_write: bool) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let state = LogState::replay(&bytes)?;

        if state.len < bytes.len() as u64 {
            tracing::warn!(
                path = %path.display(),
                kept = state.len,
                dropped = bytes.len() as u64 - state.len,
                "truncating torn tail of record log"
            );
            file.set_len(state.len)?;
            file.sync_all()?;
        }

        tracing::debug!(
            path = %path.display(),
            records = state.records.len(),
            "record log opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            sync_on_write,
            file: Mutex::new(file),
            state: RwLock::new(state),
        })
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current length of the log in bytes.
    #[must_use]
    pub fn log_len(&self) -> u64 {
        self.state.read().len
    }

    /// Appends `frame` at `at`; on failure the file is cut back to `at`.
    fn append_frame(&self, file: &mut File, at: u64, frame: &[u8]) -> StorageResult<()> {
        let result = (|| -> std::io::Result<()> {
            file.seek(SeekFrom::Start(at))?;
            file.write_all(frame)?;
            file.flush()?;
            if self.sync_on_write {
                file.sync_data()?;
            }
            Ok(())
        })();

        if let Err(err) = result {
            if let Err(rollback) = file.set_len(at) {
                tracing::warn!(error = %rollback, "failed to cut back record log after write error");
            }
            return Err(err.into());
        }
        Ok(())
    }
}

impl RecordStore for FileRecordStore {
    fn ensure_schema(&self, name: &str) -> StorageResult<bool> {
        let mut file = self.file.lock();
        let mut state = self.state.write();

        match &state.schema {
            Some(existing) if existing == name => return Ok(false),
            Some(existing) => {
                return Err(StorageError::SchemaMismatch {
                    existing: existing.clone(),
                    requested: name.to_string(),
                })
            }
            None => {}
        }

        let frame = Frame::encode_schema(name)?;
        self.append_frame(&mut file, state.len, &frame)?;
        state.len += frame.len() as u64;
        state.schema = Some(name.to_string());
        tracing::trace!(schema = name, "schema created");
        Ok(true)
    }

    fn schema_name(&self) -> Option<String> {
        self.state.read().schema.clone()
    }

    fn fetch(&self, pk: u64) -> StorageResult<Option<StoredRecord>> {
        Ok(self.state.read().records.get(&pk).cloned())
    }

    fn pks(&self) -> StorageResult<Vec<u64>> {
        Ok(self.state.read().records.keys().copied().collect())
    }

    fn max_pk(&self) -> StorageResult<Option<u64>> {
        Ok(self.state.read().max_pk)
    }

    fn apply(&self, batch: &RecordBatch) -> StorageResult<()> {
        let mut file = self.file.lock();
        let mut state = self.state.write();

        if state.schema.is_none() {
            return Err(StorageError::SchemaMissing);
        }
        validate_batch(&state.records, batch)?;
        if batch.is_empty() {
            return Ok(());
        }

        let frame = Frame::encode_batch(batch)?;
        self.append_frame(&mut file, state.len, &frame)?;

        state.len += frame.len() as u64;
        apply_validated(&mut state.records, batch);
        let batch_max = batch.writes().iter().map(|w| w.pk()).max();
        state.max_pk = state.max_pk.max(batch_max);
        Ok(())
    }
}
