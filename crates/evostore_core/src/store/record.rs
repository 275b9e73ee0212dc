//! Entity backend over a record store.

use crate::committer::{CommitProtocol, StagedChanges, StateCommitter};
use crate::config::StoreConfig;
use crate::entity::{EntityId, EntityState, EntityStatus};
use crate::error::{CoreError, CoreResult};
use crate::pk::PkAllocator;
use crate::store::backend::EntityBackend;
use crate::store::codec::{decode_record, encode_payload};
use evostore_storage::{FileRecordStore, RecordBatch, RecordStore, StoredRecord};
use std::path::Path;
use tracing::{debug, trace, warn};

/// Stores each entity as one [`StoredRecord`].
///
/// New entities are inserted with lock 0. Updates must still find the lock
/// they loaded and write it incremented, and so must removed states.
/// Removals by identity only require the record to exist. Every commit is
/// a single [`RecordStore::apply`].
#[derive(Debug)]
pub struct RecordBackend<S> {
    store: S,
    schema: String,
    pks: PkAllocator,
}

impl<S: RecordStore> RecordBackend<S> {
    /// Opens a backend over `store`.
    ///
    /// Bootstraps the schema, then seeds the key allocator from the highest
    /// key the store has seen.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created or the store
    /// cannot be inspected. No backend is returned in that case.
    pub fn open(store: S, config: &StoreConfig) -> CoreResult<Self> {
        let schema = config.effective_schema_name().to_string();
        if store.ensure_schema(&schema)? {
            debug!(schema = %schema, "created schema");
        } else {
            trace!(schema = %schema, "schema already present");
        }

        let next = match store.max_pk()? {
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| CoreError::configuration("primary key space exhausted"))?,
            None => 1,
        };
        let pks = PkAllocator::new();
        pks.initialize(next);

        Ok(Self { store, schema, pks })
    }

    /// Returns the underlying record store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the schema name records are stored under.
    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    /// Returns the key the next allocation would hand out.
    pub fn next_pk(&self) -> Option<u64> {
        self.pks.peek_next()
    }
}

impl RecordBackend<FileRecordStore> {
    /// Opens a backend over a log file at `path`, honoring
    /// [`StoreConfig::sync_on_commit`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is locked by
    /// another store.
    pub fn open_file(path: &Path, config: &StoreConfig) -> CoreResult<Self> {
        let store = FileRecordStore::open_with(path, config.sync_on_commit)?;
        Self::open(store, config)
    }
}

impl<S: RecordStore> EntityBackend for RecordBackend<S> {
    type Committer<'a>
        = RecordCommitter<'a, S>
    where
        Self: 'a;

    type Iter<'a>
        = RecordIter<'a, S>
    where
        Self: 'a;

    fn ensure_schema(&self) -> CoreResult<bool> {
        Ok(self.store.ensure_schema(&self.schema)?)
    }

    fn load(&self, id: EntityId) -> CoreResult<EntityState> {
        let record = self
            .store
            .fetch(id.as_u64())?
            .ok_or_else(|| CoreError::not_found(id))?;
        decode_record(&record)
    }

    fn iterate(&self) -> CoreResult<Self::Iter<'_>> {
        let pks = self.store.pks()?;
        Ok(RecordIter {
            store: &self.store,
            pks: pks.into_iter(),
        })
    }

    fn prepare_commit(
        &self,
        updated: Vec<EntityState>,
        removed: Vec<EntityId>,
    ) -> Self::Committer<'_> {
        RecordCommitter {
            store: &self.store,
            changes: StagedChanges::new(updated, removed),
            protocol: CommitProtocol::new(),
        }
    }

    fn allocate_identity(&self) -> CoreResult<EntityId> {
        self.pks.new_pk().map(EntityId::new)
    }
}

/// Lazy pass over the records of a [`RecordBackend`].
///
/// Records deleted after the pass started are skipped.
#[derive(Debug)]
pub struct RecordIter<'a, S> {
    store: &'a S,
    pks: std::vec::IntoIter<u64>,
}

impl<S: RecordStore> Iterator for RecordIter<'_, S> {
    type Item = CoreResult<EntityState>;

    fn next(&mut self) -> Option<Self::Item> {
        for pk in self.pks.by_ref() {
            match self.store.fetch(pk) {
                Ok(Some(record)) => return Some(decode_record(&record)),
                Ok(None) => {}
                Err(err) => return Some(Err(err.into())),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.pks.len()))
    }
}

/// Committer for a [`RecordBackend`].
#[derive(Debug)]
pub struct RecordCommitter<'a, S> {
    store: &'a S,
    changes: StagedChanges,
    protocol: CommitProtocol,
}

impl<S> RecordCommitter<'_, S> {
    /// Returns the staged changes.
    pub fn changes(&self) -> &StagedChanges {
        &self.changes
    }

    /// Returns the protocol guard.
    pub fn protocol(&self) -> &CommitProtocol {
        &self.protocol
    }
}

impl<S: RecordStore> StateCommitter for RecordCommitter<'_, S> {
    fn commit(&mut self) -> CoreResult<()> {
        let store = self.store;
        let changes = &self.changes;
        self.protocol.commit_with(|| {
            let batch = build_batch(changes)?;
            if batch.is_empty() {
                trace!("empty commit");
                return Ok(());
            }
            match store.apply(&batch) {
                Ok(()) => {
                    debug!(writes = batch.len(), "committed entity changes");
                    Ok(())
                }
                Err(err) => {
                    let err = CoreError::from(err);
                    if let CoreError::Concurrency { id, .. } = &err {
                        warn!(%id, "optimistic lock conflict, commit rejected");
                    }
                    Err(err)
                }
            }
        })
    }

    fn cancel(&mut self) -> CoreResult<()> {
        self.protocol.cancel()?;
        trace!(changes = self.changes.len(), "discarded staged entity changes");
        Ok(())
    }
}

fn build_batch(changes: &StagedChanges) -> CoreResult<RecordBatch> {
    let mut batch = RecordBatch::new();

    for state in &changes.updates {
        let pk = state.id().as_u64();
        match state.status() {
            EntityStatus::New => {
                let payload = encode_payload(state)?;
                batch.insert(StoredRecord::new(pk, 0, state.version().as_str(), payload));
            }
            EntityStatus::Loaded | EntityStatus::Updated => {
                let next_lock = state.lock().checked_add(1).ok_or_else(|| {
                    CoreError::configuration(format!("lock counter of {} exhausted", state.id()))
                })?;
                let payload = encode_payload(state)?;
                batch.update(
                    StoredRecord::new(pk, next_lock, state.version().as_str(), payload),
                    state.lock(),
                );
            }
            EntityStatus::Removed => batch.delete(pk, Some(state.lock())),
        }
    }
    for id in &changes.removals {
        batch.delete(id.as_u64(), None);
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use evostore_storage::InMemoryRecordStore;
    use std::sync::Arc;

    fn open() -> RecordBackend<InMemoryRecordStore> {
        RecordBackend::open(InMemoryRecordStore::new(), &StoreConfig::new("1.0")).unwrap()
    }

    fn commit_new(backend: &RecordBackend<impl RecordStore>, entity_type: &str) -> EntityId {
        let id = backend.allocate_identity().unwrap();
        let state = EntityState::new(id, entity_type, "1.0").with_property("n", 1i64);
        backend
            .prepare_commit(vec![state], Vec::new())
            .commit()
            .unwrap();
        id
    }

    #[test]
    fn open_bootstraps_schema_and_allocator() {
        let backend = open();
        assert_eq!(backend.store().schema_name().as_deref(), Some("evostore"));
        assert_eq!(backend.next_pk(), Some(1));
        assert!(!backend.ensure_schema().unwrap());
    }

    #[test]
    fn open_seeds_allocator_past_existing_keys() {
        let store = InMemoryRecordStore::with_records(
            "evostore",
            [StoredRecord::new(41, 0, "1.0", Vec::new())],
        );
        let backend = RecordBackend::open(store, &StoreConfig::new("1.0")).unwrap();
        assert_eq!(backend.allocate_identity().unwrap(), EntityId::new(42));
    }

    #[test]
    fn open_fails_on_schema_mismatch() {
        let store = InMemoryRecordStore::new();
        store.ensure_schema("other").unwrap();
        let err = RecordBackend::open(store, &StoreConfig::new("1.0")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn insert_then_load() {
        let backend = open();
        let id = commit_new(&backend, "Person");

        let loaded = backend.load(id).unwrap();
        assert_eq!(loaded.status(), EntityStatus::Loaded);
        assert_eq!(loaded.lock(), 0);
        assert_eq!(loaded.entity_type(), "Person");
    }

    #[test]
    fn load_missing_is_not_found() {
        let backend = open();
        let err = backend.load(EntityId::new(77)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn update_bumps_lock() {
        let backend = open();
        let id = commit_new(&backend, "Person");

        let mut state = backend.load(id).unwrap();
        state.set_property("n", 2i64).unwrap();
        backend
            .prepare_commit(vec![state], Vec::new())
            .commit()
            .unwrap();

        assert_eq!(backend.load(id).unwrap().lock(), 1);
    }

    #[test]
    fn stale_update_is_concurrency_error() {
        let backend = open();
        let id = commit_new(&backend, "Person");

        let mut first = backend.load(id).unwrap();
        let mut second = backend.load(id).unwrap();
        first.set_property("n", 2i64).unwrap();
        second.set_property("n", 3i64).unwrap();

        backend
            .prepare_commit(vec![first], Vec::new())
            .commit()
            .unwrap();
        let err = backend
            .prepare_commit(vec![second], Vec::new())
            .commit()
            .unwrap_err();
        assert!(matches!(err, CoreError::Concurrency { id: conflict, .. } if conflict == id));
    }

    #[test]
    fn failed_batch_applies_nothing() {
        let backend = open();
        let existing = commit_new(&backend, "Person");

        let fresh = backend.allocate_identity().unwrap();
        let new_state = EntityState::new(fresh, "Person", "1.0");
        let mut committer = backend.prepare_commit(vec![new_state], vec![EntityId::new(999)]);
        assert!(committer.commit().is_err());

        assert!(backend.load(fresh).is_err());
        assert!(backend.load(existing).is_ok());
    }

    #[test]
    fn removal_by_id_and_by_state() {
        let backend = open();
        let a = commit_new(&backend, "A");
        let b = commit_new(&backend, "B");

        let mut state_b = backend.load(b).unwrap();
        state_b.mark_removed().unwrap();
        backend
            .prepare_commit(vec![state_b], vec![a])
            .commit()
            .unwrap();

        assert_eq!(backend.iterate().unwrap().count(), 0);
    }

    #[test]
    fn empty_commit_is_noop() {
        let backend = open();
        let mut committer = backend.prepare_commit(Vec::new(), Vec::new());
        assert!(committer.changes().is_empty());
        committer.commit().unwrap();
        assert!(backend.store().is_empty());
    }

    #[test]
    fn second_terminal_call_is_protocol_error() {
        let backend = open();
        let mut committer = backend.prepare_commit(Vec::new(), Vec::new());
        committer.cancel().unwrap();
        assert_eq!(committer.commit().unwrap_err().kind(), ErrorKind::Protocol);
        assert_eq!(committer.cancel().unwrap_err().kind(), ErrorKind::Protocol);
    }

    #[test]
    fn cancel_writes_nothing() {
        let backend = open();
        let id = backend.allocate_identity().unwrap();
        let mut committer =
            backend.prepare_commit(vec![EntityState::new(id, "A", "1.0")], Vec::new());
        committer.cancel().unwrap();
        assert!(backend.store().is_empty());
    }

    #[test]
    fn iterate_is_restartable() {
        let backend = open();
        commit_new(&backend, "A");
        commit_new(&backend, "B");

        let types: Vec<_> = backend
            .iterate()
            .unwrap()
            .map(|s| s.unwrap().entity_type().to_string())
            .collect();
        assert_eq!(types, vec!["A", "B"]);
        assert_eq!(backend.iterate().unwrap().count(), 2);
    }

    #[test]
    fn backends_sharing_a_store_conflict() {
        let store = Arc::new(InMemoryRecordStore::new());
        let config = StoreConfig::new("1.0");
        let left = RecordBackend::open(Arc::clone(&store), &config).unwrap();
        let right = RecordBackend::open(Arc::clone(&store), &config).unwrap();

        let id = commit_new(&left, "A");
        let mut from_right = right.load(id).unwrap();
        from_right.set_property("n", 5i64).unwrap();
        right
            .prepare_commit(vec![from_right], Vec::new())
            .commit()
            .unwrap();

        let mut from_left = left.load(id).unwrap();
        assert_eq!(from_left.lock(), 1);
        from_left.mark_removed().unwrap();
        left.prepare_commit(vec![from_left], Vec::new())
            .commit()
            .unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn file_backend_resumes_keys_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.log");
        let config = StoreConfig::new("1.0").sync_on_commit(false);

        let first = {
            let backend = RecordBackend::open_file(&path, &config).unwrap();
            commit_new(&backend, "A")
        };

        let backend = RecordBackend::open_file(&path, &config).unwrap();
        assert!(!backend.ensure_schema().unwrap());
        assert_eq!(backend.load(first).unwrap().entity_type(), "A");
        assert!(backend.allocate_identity().unwrap() > first);
    }
}
