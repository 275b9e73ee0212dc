//! Entity stores.
//!
//! [`EntityStore`] sits on top of an [`EntityBackend`] and makes every
//! state it hands out conform to the application version: stored states
//! are migrated on the way out, and a state whose version has no migration
//! path is reported as an error instead of being returned half-migrated.

mod backend;
mod codec;
mod record;
mod unit;

pub use backend::EntityBackend;
pub use record::{RecordBackend, RecordCommitter, RecordIter};
pub use unit::UnitOfWork;

use crate::config::StoreConfig;
use crate::entity::{EntityId, EntityState};
use crate::error::CoreResult;
use crate::migration::{apply_rules, MigrationRuleSet};
use crate::types::Version;
use std::sync::Arc;
use tracing::debug;

/// Migrating front end of an [`EntityBackend`].
#[derive(Debug)]
pub struct EntityStore<B> {
    backend: B,
    rules: Arc<MigrationRuleSet>,
    config: StoreConfig,
}

impl<B: EntityBackend> EntityStore<B> {
    /// Creates a store over `backend`.
    pub fn new(backend: B, rules: Arc<MigrationRuleSet>, config: StoreConfig) -> Self {
        Self {
            backend,
            rules,
            config,
        }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the migration rules.
    pub fn rules(&self) -> &MigrationRuleSet {
        &self.rules
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the version loaded states are migrated to.
    pub fn application_version(&self) -> &Version {
        &self.config.application_version
    }

    /// Loads `id` and migrates it to the application version.
    ///
    /// The migrated state keeps status `Loaded`; it is written back only if
    /// a unit of work changes and commits it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`](crate::CoreError::EntityNotFound)
    /// if absent, [`CoreError::NoMigrationPath`](crate::CoreError::NoMigrationPath)
    /// if the stored version cannot be migrated, or a storage error.
    pub fn load(&self, id: EntityId) -> CoreResult<EntityState> {
        let mut state = self.backend.load(id)?;
        self.migrate(&mut state)?;
        Ok(state)
    }

    /// Iterates every stored entity, migrating each one lazily.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the pass cannot be started. Per-entity
    /// failures are yielded by the iterator.
    pub fn iter(&self) -> CoreResult<MigratingIter<'_, B>> {
        Ok(MigratingIter {
            inner: self.backend.iterate()?,
            store: self,
        })
    }

    /// Migrates `state` in place to the application version.
    ///
    /// Returns the number of rules that changed the state. The chain is
    /// resolved before anything is touched, so on error the state is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoMigrationPath`](crate::CoreError::NoMigrationPath)
    /// if no chain leads to the application version.
    pub fn migrate(&self, state: &mut EntityState) -> CoreResult<usize> {
        let target = &self.config.application_version;
        if state.version() == target {
            return Ok(0);
        }

        let chain = self.rules.get_rules(state.version(), target)?;
        let changed = apply_rules(&chain, state);
        debug!(
            id = %state.id(),
            from = %state.version(),
            to = %target,
            rules = chain.len(),
            changed,
            "migrated entity state"
        );
        state.set_version(target.clone());
        Ok(changed)
    }

    /// Starts a unit of work.
    pub fn unit_of_work(&self) -> UnitOfWork<'_, B> {
        UnitOfWork::new(self)
    }
}

/// Iterator returned by [`EntityStore::iter`].
pub struct MigratingIter<'a, B>
where
    B: EntityBackend + 'a,
{
    inner: B::Iter<'a>,
    store: &'a EntityStore<B>,
}

impl<'a, B> Iterator for MigratingIter<'a, B>
where
    B: EntityBackend + 'a,
{
    type Item = CoreResult<EntityState>;

    fn next(&mut self) -> Option<Self::Item> {
        let store = self.store;
        self.inner.next().map(|loaded| {
            let mut state = loaded?;
            store.migrate(&mut state)?;
            Ok(state)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::committer::StateCommitter;
    use crate::entity::{EntityStatus, Value};
    use crate::error::{CoreError, ErrorKind};
    use crate::migration::MigrationBuilder;
    use evostore_storage::{InMemoryRecordStore, RecordStore};

    fn rules() -> Arc<MigrationRuleSet> {
        let mut rules = MigrationRuleSet::new();
        rules
            .register(
                MigrationBuilder::from_version("1.0")
                    .to_version("2.0")
                    .rename_entity("Old", "New")
                    .for_entities(["New"])
                    .rename_property("a", "b"),
            )
            .unwrap();
        Arc::new(rules)
    }

    fn seed(store: &InMemoryRecordStore, entity_type: &str, version: &str) -> EntityId {
        let backend = RecordBackend::open(store, &StoreConfig::new(version)).unwrap();
        let id = backend.allocate_identity().unwrap();
        let state = EntityState::new(id, entity_type, version).with_property("a", 1i64);
        backend
            .prepare_commit(vec![state], Vec::new())
            .commit()
            .unwrap();
        id
    }

    fn open<'a>(
        store: &'a InMemoryRecordStore,
        version: &str,
    ) -> EntityStore<RecordBackend<&'a InMemoryRecordStore>> {
        let config = StoreConfig::new(version);
        let backend = RecordBackend::open(store, &config).unwrap();
        EntityStore::new(backend, rules(), config)
    }

    #[test]
    fn load_migrates_to_application_version() {
        let records = InMemoryRecordStore::new();
        let id = seed(&records, "Old", "1.0");
        let store = open(&records, "2.0");

        let state = store.load(id).unwrap();
        assert_eq!(state.entity_type(), "New");
        assert_eq!(state.version().as_str(), "2.0");
        assert_eq!(state.property("b"), Some(&Value::Integer(1)));
        assert_eq!(state.status(), EntityStatus::Loaded);

        // not written back
        assert_eq!(records.fetch(id.as_u64()).unwrap().unwrap().version, "1.0");
    }

    #[test]
    fn load_without_path_fails() {
        let records = InMemoryRecordStore::new();
        let id = seed(&records, "Old", "0.5");
        let store = open(&records, "2.0");

        let err = store.load(id).unwrap_err();
        assert!(matches!(err, CoreError::NoMigrationPath { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn current_version_is_untouched() {
        let records = InMemoryRecordStore::new();
        let id = seed(&records, "Old", "2.0");
        let store = open(&records, "2.0");

        let state = store.load(id).unwrap();
        assert_eq!(state.entity_type(), "Old");
        assert!(state.property("a").is_some());
    }

    #[test]
    fn iter_migrates_lazily() {
        let records = InMemoryRecordStore::new();
        seed(&records, "Old", "1.0");
        seed(&records, "Old", "0.5");
        let store = open(&records, "2.0");

        let results: Vec<_> = store.iter().unwrap().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().entity_type(), "New");
        assert!(results[1].is_err());
    }

    #[test]
    fn failed_migration_leaves_state_untouched() {
        let records = InMemoryRecordStore::new();
        let store = open(&records, "2.0");
        let mut state = EntityState::new(EntityId::new(1), "Old", "0.1").with_property("a", 1i64);
        let before = state.clone();

        assert!(store.migrate(&mut state).is_err());
        assert_eq!(state, before);
    }
}
