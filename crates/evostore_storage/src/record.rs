//! Persisted record layout and write batches.

/// One durable record per entity.
///
/// The store treats `version` and `payload` as opaque; only `pk` and
/// `lock` take part in storage-level decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Primary key.
    pub pk: u64,
    /// Optimistic-lock counter, bumped on every committed update.
    pub lock: u64,
    /// Schema version tag the payload was written under.
    pub version: String,
    /// Serialized entity state.
    pub payload: Vec<u8>,
}

impl StoredRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(pk: u64, lock: u64, version: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            pk,
            lock,
            version: version.into(),
            payload,
        }
    }
}

/// A single write inside a [`RecordBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordWrite {
    /// Insert or replace a record.
    Put {
        /// The record to store.
        record: StoredRecord,
        /// Lock counter the existing record must carry, or `None` if the
        /// record must not exist yet.
        expected_lock: Option<u64>,
    },
    /// Delete a record.
    Delete {
        /// Primary key to delete.
        pk: u64,
        /// Lock counter the existing record must carry. `None` only
        /// requires the record to be present.
        expected_lock: Option<u64>,
    },
}

impl RecordWrite {
    /// Returns the primary key this write targets.
    #[must_use]
    pub fn pk(&self) -> u64 {
        match self {
            Self::Put { record, .. } => record.pk,
            Self::Delete { pk, .. } => *pk,
        }
    }
}

/// An ordered group of writes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBatch {
    writes: Vec<RecordWrite>,
}

impl RecordBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an insert of a record that must not exist yet.
    pub fn insert(&mut self, record: StoredRecord) {
        self.writes.push(RecordWrite::Put {
            record,
            expected_lock: None,
        });
    }

    /// Stages a replacement of a record currently holding `expected_lock`.
    pub fn update(&mut self, record: StoredRecord, expected_lock: u64) {
        self.writes.push(RecordWrite::Put {
            record,
            expected_lock: Some(expected_lock),
        });
    }

    /// Stages a delete.
    pub fn delete(&mut self, pk: u64, expected_lock: Option<u64>) {
        self.writes.push(RecordWrite::Delete { pk, expected_lock });
    }

    /// Returns the staged writes in order.
    #[must_use]
    pub fn writes(&self) -> &[RecordWrite] {
        &self.writes
    }

    /// Returns the number of staged writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Returns whether the batch holds no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}
