//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stored data is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A write expectation did not hold when the batch was applied.
    ///
    /// `expected` is the lock counter the writer observed (`None` when the
    /// writer expected the record to be absent); `actual` is what the store
    /// currently holds (`None` when the record is absent).
    #[error("lock mismatch on record {pk}: expected {expected:?}, found {actual:?}")]
    LockMismatch {
        /// Primary key of the record.
        pk: u64,
        /// Lock counter the writer expected.
        expected: Option<u64>,
        /// Lock counter currently stored.
        actual: Option<u64>,
    },

    /// The store was bootstrapped under a different schema name.
    #[error("schema mismatch: store holds {existing:?}, requested {requested:?}")]
    SchemaMismatch {
        /// Schema name already recorded in the store.
        existing: String,
        /// Schema name requested by the caller.
        requested: String,
    },

    /// The schema has not been created yet.
    #[error("schema not initialized")]
    SchemaMissing,

    /// A length or count does not fit its on-disk field.
    #[error("{field} length {len} exceeds the log frame limit")]
    TooLarge {
        /// Which field overflowed.
        field: &'static str,
        /// The offending length.
        len: usize,
    },

    /// Another process holds the store's exclusive lock.
    #[error("store locked: another process has exclusive access")]
    Locked,
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Returns whether this error reports a failed optimistic-lock check.
    #[must_use]
    pub fn is_lock_mismatch(&self) -> bool {
        matches!(self, Self::LockMismatch { .. })
    }
}
