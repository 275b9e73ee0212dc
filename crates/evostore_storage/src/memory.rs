//! In-memory record store for testing.

use crate::error::{StorageError, StorageResult};
use crate::record::{RecordBatch, StoredRecord};
use crate::store::{apply_validated, validate_batch, RecordStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory record store.
///
/// This store keeps all records in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// Batches are validated and applied under a single write lock, so
/// concurrent readers never observe half of a batch.
///
/// # Example
///
/// ```rust
/// use evostore_storage::{InMemoryRecordStore, RecordBatch, RecordStore, StoredRecord};
///
/// let store = InMemoryRecordStore::new();
/// store.ensure_schema("evostore").unwrap();
///
/// let mut batch = RecordBatch::new();
/// batch.insert(StoredRecord::new(1, 0, "1.0", b"state".to_vec()));
/// store.apply(&batch).unwrap();
///
/// assert_eq!(store.fetch(1).unwrap().unwrap().payload, b"state");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    schema: Option<String>,
    records: BTreeMap<u64, StoredRecord>,
    max_pk: Option<u64>,
}

impl InMemoryRecordStore {
    /// Creates a new empty store without a schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with records under `schema`.
    ///
    /// Useful for simulating data written by an older application version.
    #[must_use]
    pub fn with_records(schema: &str, records: impl IntoIterator<Item = StoredRecord>) -> Self {
        let records: BTreeMap<u64, StoredRecord> =
            records.into_iter().map(|r| (r.pk, r)).collect();
        let max_pk = records.keys().next_back().copied();
        Self {
            inner: RwLock::new(MemoryState {
                schema: Some(schema.to_string()),
                records,
                max_pk,
            }),
        }
    }

    /// Returns a copy of every stored record.
    #[must_use]
    pub fn records(&self) -> Vec<StoredRecord> {
        self.inner.read().records.values().cloned().collect()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Returns whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn ensure_schema(&self, name: &str) -> StorageResult<bool> {
        let mut inner = self.inner.write();
        match &inner.schema {
            Some(existing) if existing == name => Ok(false),
            Some(existing) => Err(StorageError::SchemaMismatch {
                existing: existing.clone(),
                requested: name.to_string(),
            }),
            None => {
                inner.schema = Some(name.to_string());
                tracing::trace!(schema = name, "in-memory schema created");
                Ok(true)
            }
        }
    }

    fn schema_name(&self) -> Option<String> {
        self.inner.read().schema.clone()
    }

    fn fetch(&self, pk: u64) -> StorageResult<Option<StoredRecord>> {
        Ok(self.inner.read().records.get(&pk).cloned())
    }

    fn pks(&self) -> StorageResult<Vec<u64>> {
        Ok(self.inner.read().records.keys().copied().collect())
    }

    fn max_pk(&self) -> StorageResult<Option<u64>> {
        Ok(self.inner.read().max_pk)
    }

    fn apply(&self, batch: &RecordBatch) -> StorageResult<()> {
        let mut inner = self.inner.write();
        if inner.schema.is_none() {
            return Err(StorageError::SchemaMissing);
        }

        validate_batch(&inner.records, batch)?;
        apply_validated(&mut inner.records, batch);

        let batch_max = batch.writes().iter().map(|w| w.pk()).max();
        inner.max_pk = inner.max_pk.max(batch_max);
        Ok(())
    }
}
