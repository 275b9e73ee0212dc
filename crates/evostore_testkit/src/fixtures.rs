//! Test fixtures and store helpers.
//!
//! Provides ready-made entity stores over in-memory and temporary file
//! storage, and the reference migration scenario used across the test
//! suites.

use evostore_core::{
    EntityId, EntityStore, MigrationBuilder, MigrationRuleSet, RecordBackend, StoreConfig, Value,
    DEFAULT_SCHEMA_NAME,
};
use evostore_storage::{FileRecordStore, InMemoryRecordStore, StoredRecord};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Entity store over shared in-memory records.
pub type MemoryEntityStore = EntityStore<RecordBackend<Arc<InMemoryRecordStore>>>;

/// Entity store over a log file.
pub type FileEntityStore = EntityStore<RecordBackend<FileRecordStore>>;

/// Versions of the reference scenario, oldest first.
pub const REFERENCE_VERSIONS: [&str; 3] = ["1.0", "1.1", "2.0"];

/// The reference migration rules.
///
/// - `1.0 -> 1.1`: `TestEntity1_0` becomes `TestEntity1_1`, whose `foo`
///   property is renamed to `newFoo`
/// - `1.1 -> 2.0`: `TestEntity1_1` becomes `TestEntity2_0`, which gains
///   `bar = "Some value"` and loses `newFoo`
pub fn reference_rules() -> MigrationRuleSet {
    let mut rules = MigrationRuleSet::new();
    rules
        .register(reference_builder())
        .expect("reference rules are acyclic");
    rules
}

/// The builder declaring [`reference_rules`].
pub fn reference_builder() -> MigrationBuilder {
    MigrationBuilder::from_version("1.0")
        .to_version("1.1")
        .rename_entity("TestEntity1_0", "TestEntity1_1")
        .for_entities(["TestEntity1_1"])
        .rename_property("foo", "newFoo")
        .to_version("2.0")
        .rename_entity("TestEntity1_1", "TestEntity2_0")
        .for_entities(["TestEntity2_0"])
        .add_property("bar", "Some value")
        .remove_property("newFoo", "Some value")
}

/// An in-memory entity store whose records can be shared with other
/// application versions.
pub struct TestStore {
    /// The entity store.
    pub store: MemoryEntityStore,
    /// The records behind it.
    pub records: Arc<InMemoryRecordStore>,
}

impl TestStore {
    /// Creates an empty store for `version` without migration rules.
    pub fn memory(version: &str) -> Self {
        Self::memory_with_rules(version, Arc::new(MigrationRuleSet::new()))
    }

    /// Creates an empty store for `version`.
    pub fn memory_with_rules(version: &str, rules: Arc<MigrationRuleSet>) -> Self {
        Self::over(Arc::new(InMemoryRecordStore::new()), version, rules)
    }

    /// Creates a store for `version` over previously exported records.
    pub fn import(records: Vec<StoredRecord>, version: &str, rules: Arc<MigrationRuleSet>) -> Self {
        let records = InMemoryRecordStore::with_records(DEFAULT_SCHEMA_NAME, records);
        Self::over(Arc::new(records), version, rules)
    }

    /// Creates a store for `version` over existing records.
    pub fn over(
        records: Arc<InMemoryRecordStore>,
        version: &str,
        rules: Arc<MigrationRuleSet>,
    ) -> Self {
        let config = StoreConfig::new(version);
        let backend = RecordBackend::open(Arc::clone(&records), &config)
            .expect("Failed to open in-memory backend");
        Self {
            store: EntityStore::new(backend, rules, config),
            records,
        }
    }

    /// Opens another application version over the same records.
    pub fn reopen(&self, version: &str, rules: Arc<MigrationRuleSet>) -> Self {
        Self::over(Arc::clone(&self.records), version, rules)
    }

    /// Returns a copy of every stored record.
    pub fn export(&self) -> Vec<StoredRecord> {
        self.records.records()
    }
}

impl Deref for TestStore {
    type Target = MemoryEntityStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A file-backed entity store in a temporary directory.
pub struct TestFileStore {
    /// The entity store.
    pub store: FileEntityStore,
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestFileStore {
    /// Creates a fresh log file for `version`.
    pub fn open(version: &str, rules: Arc<MigrationRuleSet>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store").join("records.log");
        let store = open_file_store(&path, version, rules);
        Self {
            store,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Closes the store and reopens the same file as `version`.
    pub fn reopen(self, version: &str, rules: Arc<MigrationRuleSet>) -> Self {
        let Self {
            store,
            path,
            _temp_dir,
        } = self;
        // release the file lock first
        drop(store);
        let store = open_file_store(&path, version, rules);
        Self {
            store,
            path,
            _temp_dir,
        }
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Deref for TestFileStore {
    type Target = FileEntityStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

fn open_file_store(path: &Path, version: &str, rules: Arc<MigrationRuleSet>) -> FileEntityStore {
    let config = StoreConfig::new(version).sync_on_commit(false);
    let backend = RecordBackend::open_file(path, &config).expect("Failed to open file backend");
    EntityStore::new(backend, rules, config)
}

/// Runs a test with a temporary in-memory store.
pub fn with_memory_store<F, R>(version: &str, f: F) -> R
where
    F: FnOnce(&MemoryEntityStore) -> R,
{
    let test_store = TestStore::memory(version);
    f(&test_store.store)
}

/// Runs a test with a temporary file store.
pub fn with_file_store<F, R>(version: &str, f: F) -> R
where
    F: FnOnce(&FileEntityStore, &Path) -> R,
{
    let test_store = TestFileStore::open(version, Arc::new(MigrationRuleSet::new()));
    f(&test_store.store, test_store.path())
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use evostore_core::EntityBackend;

    /// Creates `count` entities of `entity_type`, each with an `index`
    /// property, in one unit of work.
    pub fn populate<B: EntityBackend>(
        store: &EntityStore<B>,
        entity_type: &str,
        count: usize,
    ) -> Vec<EntityId> {
        let mut unit = store.unit_of_work();
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let state = unit.new_entity(entity_type).expect("Failed to create entity");
            let index = i64::try_from(i).expect("index fits in i64");
            state
                .set_property("index", index)
                .expect("Failed to set property");
            ids.push(state.id());
        }
        unit.complete().expect("Failed to complete unit of work");
        ids
    }

    /// Writes one `TestEntity1_0` with `foo = "Some value"` as the 1.0
    /// application would, and returns the exported records with its id.
    pub fn reference_v1_data() -> (Vec<StoredRecord>, EntityId) {
        let v1 = TestStore::memory_with_rules("1.0", Arc::new(reference_rules()));
        let mut unit = v1.unit_of_work();
        let entity = unit
            .new_entity("TestEntity1_0")
            .expect("Failed to create entity");
        entity
            .set_property("foo", Value::from("Some value"))
            .expect("Failed to set property");
        let id = entity.id();
        unit.complete().expect("Failed to complete unit of work");
        (v1.export(), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evostore_core::Version;

    #[test]
    fn test_reference_rules_shape() {
        let rules = reference_rules();
        assert_eq!(rules.len(), 5);
        let targets: Vec<&str> = rules
            .target_versions()
            .into_iter()
            .map(Version::as_str)
            .collect();
        assert_eq!(targets, vec!["1.1", "2.0"]);
    }

    #[test]
    fn test_with_memory_store() {
        let count = with_memory_store("1.0", |store| {
            scenarios::populate(store, "Person", 3);
            store.iter().unwrap().count()
        });
        assert_eq!(count, 3);
    }

    #[test]
    fn test_export_import() {
        let (records, id) = scenarios::reference_v1_data();
        assert_eq!(records.len(), 1);

        let v1 = TestStore::import(records, "1.0", Arc::new(reference_rules()));
        assert_eq!(v1.load(id).unwrap().entity_type(), "TestEntity1_0");
    }

    #[test]
    fn test_file_store_reopen() {
        let store = TestFileStore::open("1.0", Arc::new(MigrationRuleSet::new()));
        let ids = scenarios::populate(&store.store, "Person", 2);

        let store = store.reopen("1.0", Arc::new(MigrationRuleSet::new()));
        assert!(store.path().exists());
        assert_eq!(
            store.load(ids[1]).unwrap().property("index"),
            Some(&Value::Integer(1))
        );
    }
}
