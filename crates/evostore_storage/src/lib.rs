//! # EvoStore Storage
//!
//! Record-level storage contract and implementations for EvoStore.
//!
//! This crate defines the persisted layout of an entity store: one
//! [`StoredRecord`] per entity carrying a primary key, an optimistic-lock
//! counter, the schema version tag it was written under, and an opaque
//! payload. Stores apply [`RecordBatch`]es all-or-nothing.
//!
//! ## Design Principles
//!
//! - Stores never interpret payloads or version tags
//! - Lock expectations are checked inside the store, under its own lock
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryRecordStore`] - For testing and ephemeral storage
//! - [`FileRecordStore`] - Append-only log file with CRC-framed batches
//!
//! ## Example
//!
//! ```rust
//! use evostore_storage::{InMemoryRecordStore, RecordBatch, RecordStore, StoredRecord};
//!
//! let store = InMemoryRecordStore::new();
//! store.ensure_schema("evostore").unwrap();
//!
//! let mut batch = RecordBatch::new();
//! batch.insert(StoredRecord::new(1, 0, "1.0", vec![0xA0]));
//! store.apply(&batch).unwrap();
//!
//! let mut stale = RecordBatch::new();
//! stale.update(StoredRecord::new(1, 1, "1.0", vec![0xA0]), 7);
//! assert!(store.apply(&stale).unwrap_err().is_lock_mismatch());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod frame;
mod memory;
mod record;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileRecordStore;
pub use memory::InMemoryRecordStore;
pub use record::{RecordBatch, RecordWrite, StoredRecord};
pub use store::RecordStore;
