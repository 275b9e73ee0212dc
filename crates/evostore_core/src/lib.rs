//! # EvoStore Core
//!
//! Schema-migration rule engine and commit protocol for EvoStore.
//!
//! This crate provides:
//! - Entity state with lifecycle status and optimistic-lock counter
//! - Migration rules on a version graph, and a fluent builder to declare them
//! - Primary key allocation
//! - The single-use commit protocol every backend implements
//! - [`RecordBackend`], an adapter over any [`evostore_storage::RecordStore`]
//! - [`EntityStore`] and [`UnitOfWork`], which migrate states on load
//!
//! ## Example
//!
//! ```rust
//! use evostore_core::{
//!     EntityStore, MigrationBuilder, MigrationRuleSet, RecordBackend, StoreConfig,
//! };
//! use evostore_storage::InMemoryRecordStore;
//! use std::sync::Arc;
//!
//! let mut rules = MigrationRuleSet::new();
//! rules
//!     .register(
//!         MigrationBuilder::from_version("1.0")
//!             .to_version("2.0")
//!             .rename_entity("Customer", "Client"),
//!     )
//!     .unwrap();
//!
//! // data written by the 1.0 application
//! let records = Arc::new(InMemoryRecordStore::new());
//! let old_config = StoreConfig::new("1.0");
//! let old = EntityStore::new(
//!     RecordBackend::open(Arc::clone(&records), &old_config).unwrap(),
//!     Arc::new(MigrationRuleSet::new()),
//!     old_config,
//! );
//! let mut unit = old.unit_of_work();
//! let id = unit.new_entity("Customer").unwrap().id();
//! unit.complete().unwrap();
//!
//! // read back by the 2.0 application
//! let config = StoreConfig::new("2.0");
//! let store = EntityStore::new(
//!     RecordBackend::open(records, &config).unwrap(),
//!     Arc::new(rules),
//!     config,
//! );
//! assert_eq!(store.load(id).unwrap().entity_type(), "Client");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod committer;
mod config;
mod entity;
mod error;
mod migration;
mod pk;
mod store;
mod types;
mod version;

pub use committer::{CommitPhase, CommitProtocol, StagedChanges, StateCommitter};
pub use config::{StoreConfig, DEFAULT_SCHEMA_NAME};
pub use entity::{Association, EntityId, EntityState, EntityStatus, Value};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use migration::{
    apply_rules, EntityFilter, MigrationBuilder, MigrationRule, MigrationRuleSet, PendingStage,
    RuleOperation,
};
pub use pk::PkAllocator;
pub use store::{
    EntityBackend, EntityStore, MigratingIter, RecordBackend, RecordCommitter, RecordIter,
    UnitOfWork,
};
pub use types::Version;
pub use version::{DottedNumeric, Lexicographic, VersionComparator};
