//! Record store trait definition.

use crate::error::{StorageError, StorageResult};
use crate::record::{RecordBatch, RecordWrite, StoredRecord};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A keyed store of entity records.
///
/// Record stores hold one [`StoredRecord`] per primary key and apply
/// [`RecordBatch`]es atomically. They know nothing about entity types,
/// migration, or payload encoding.
///
/// # Invariants
///
/// - `apply` either makes every write in the batch visible or none of them
/// - every expectation in a batch is checked before anything is written
/// - `ensure_schema` is idempotent
/// - implementations must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::InMemoryRecordStore`] - For testing and ephemeral stores
/// - [`super::FileRecordStore`] - Append-only log file
pub trait RecordStore: Send + Sync {
    /// Creates the named schema if the store has none yet.
    ///
    /// Returns `true` if the schema was created by this call.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::SchemaMismatch`] if the store was
    /// bootstrapped under a different name, or an I/O error.
    fn ensure_schema(&self, name: &str) -> StorageResult<bool>;

    /// Returns the schema name, if the schema exists.
    fn schema_name(&self) -> Option<String>;

    /// Fetches the record stored under `pk`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    fn fetch(&self, pk: u64) -> StorageResult<Option<StoredRecord>>;

    /// Returns a snapshot of all stored primary keys in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the keys cannot be listed.
    fn pks(&self) -> StorageResult<Vec<u64>>;

    /// Returns the highest primary key ever stored, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be inspected.
    fn max_pk(&self) -> StorageResult<Option<u64>>;

    /// Applies a batch atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockMismatch`] if any expectation fails, in
    /// which case nothing is written, or an I/O error after which the store
    /// is left as it was before the call.
    fn apply(&self, batch: &RecordBatch) -> StorageResult<()>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn ensure_schema(&self, name: &str) -> StorageResult<bool> {
        (**self).ensure_schema(name)
    }

    fn schema_name(&self) -> Option<String> {
        (**self).schema_name()
    }

    fn fetch(&self, pk: u64) -> StorageResult<Option<StoredRecord>> {
        (**self).fetch(pk)
    }

    fn pks(&self) -> StorageResult<Vec<u64>> {
        (**self).pks()
    }

    fn max_pk(&self) -> StorageResult<Option<u64>> {
        (**self).max_pk()
    }

    fn apply(&self, batch: &RecordBatch) -> StorageResult<()> {
        (**self).apply(batch)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn ensure_schema(&self, name: &str) -> StorageResult<bool> {
        (**self).ensure_schema(name)
    }

    fn schema_name(&self) -> Option<String> {
        (**self).schema_name()
    }

    fn fetch(&self, pk: u64) -> StorageResult<Option<StoredRecord>> {
        (**self).fetch(pk)
    }

    fn pks(&self) -> StorageResult<Vec<u64>> {
        (**self).pks()
    }

    fn max_pk(&self) -> StorageResult<Option<u64>> {
        (**self).max_pk()
    }

    fn apply(&self, batch: &RecordBatch) -> StorageResult<()> {
        (**self).apply(batch)
    }
}

/// Checks every expectation of `batch` against `records`.
///
/// Writes are evaluated in order, so a batch may insert and then delete
/// the same key.
pub(crate) fn validate_batch(
    records: &BTreeMap<u64, StoredRecord>,
    batch: &RecordBatch,
) -> StorageResult<()> {
    // pk -> lock as seen after the writes processed so far
    let mut overlay: HashMap<u64, Option<u64>> = HashMap::new();

    for write in batch.writes() {
        let pk = write.pk();
        let current = overlay
            .get(&pk)
            .copied()
            .unwrap_or_else(|| records.get(&pk).map(|r| r.lock));

        match write {
            RecordWrite::Put {
                record,
                expected_lock,
            } => {
                if current != *expected_lock {
                    return Err(StorageError::LockMismatch {
                        pk,
                        expected: *expected_lock,
                        actual: current,
                    });
                }
                overlay.insert(pk, Some(record.lock));
            }
            RecordWrite::Delete { expected_lock, .. } => {
                let holds = match (current, expected_lock) {
                    (None, _) => false,
                    (Some(_), None) => true,
                    (Some(actual), Some(expected)) => actual == *expected,
                };
                if !holds {
                    return Err(StorageError::LockMismatch {
                        pk,
                        expected: *expected_lock,
                        actual: current,
                    });
                }
                overlay.insert(pk, None);
            }
        }
    }

    Ok(())
}

/// Applies an already validated batch to `records`.
pub(crate) fn apply_validated(records: &mut BTreeMap<u64, StoredRecord>, batch: &RecordBatch) {
    for write in batch.writes() {
        match write {
            RecordWrite::Put { record, .. } => {
                records.insert(record.pk, record.clone());
            }
            RecordWrite::Delete { pk, .. } => {
                records.remove(pk);
            }
        }
    }
}
