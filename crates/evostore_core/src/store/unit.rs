//! Units of work.

use crate::committer::StateCommitter;
use crate::entity::{EntityId, EntityState, EntityStatus};
use crate::error::{CoreError, CoreResult};
use crate::store::{EntityBackend, EntityStore};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::debug;

/// A batch of entity changes committed together.
///
/// States are loaded (and migrated) on first access and cached, so repeated
/// access within one unit sees the same state. Nothing reaches the backend
/// until [`complete`](Self::complete).
pub struct UnitOfWork<'s, B> {
    store: &'s EntityStore<B>,
    states: BTreeMap<EntityId, EntityState>,
    removed: Vec<EntityId>,
}

impl<'s, B: EntityBackend> UnitOfWork<'s, B> {
    pub(crate) fn new(store: &'s EntityStore<B>) -> Self {
        Self {
            store,
            states: BTreeMap::new(),
            removed: Vec::new(),
        }
    }

    /// Creates an entity of `entity_type` at the application version.
    ///
    /// # Errors
    ///
    /// Returns an error if no identity can be allocated.
    pub fn new_entity(&mut self, entity_type: impl Into<String>) -> CoreResult<&mut EntityState> {
        let id = self.store.backend().allocate_identity()?;
        let state = EntityState::new(id, entity_type, self.store.application_version());
        Ok(self.states.entry(id).or_insert(state))
    }

    /// Returns the state of `id`, loading it on first access.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] if the entity does not exist
    /// or was removed in this unit, or any load error.
    pub fn get(&mut self, id: EntityId) -> CoreResult<&EntityState> {
        self.cached(id).map(|state| &*state)
    }

    /// Returns the state of `id` for modification.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_mut(&mut self, id: EntityId) -> CoreResult<&mut EntityState> {
        self.cached(id)
    }

    /// Removes `id`.
    ///
    /// An entity created in this unit is simply forgotten. A cached state is
    /// marked removed; an uncached one is removed by identity without being
    /// loaded.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the entity was already removed in this
    /// unit.
    pub fn remove(&mut self, id: EntityId) -> CoreResult<()> {
        if self.removed.contains(&id) {
            return Err(CoreError::protocol(format!("entity {id} already removed")));
        }
        match self.states.entry(id) {
            Entry::Occupied(entry) if entry.get().status() == EntityStatus::New => {
                entry.remove();
                Ok(())
            }
            Entry::Occupied(mut entry) => entry.get_mut().mark_removed(),
            Entry::Vacant(_) => {
                self.removed.push(id);
                Ok(())
            }
        }
    }

    /// Returns the number of changes [`complete`](Self::complete) would stage.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.states
            .values()
            .filter(|s| s.is_dirty() || s.status() == EntityStatus::Removed)
            .count()
            + self.removed.len()
    }

    /// Commits every change made in this unit.
    ///
    /// # Errors
    ///
    /// Returns a storage or concurrency error if the commit failed, in which
    /// case nothing was applied.
    pub fn complete(self) -> CoreResult<()> {
        let (updated, removed) = self.staged_changes();
        let (updates, removals) = (updated.len(), removed.len());
        let mut committer = self.store_backend().prepare_commit(updated, removed);
        committer.commit()?;
        debug!(updates, removals, "unit of work completed");
        Ok(())
    }

    /// Drops every change made in this unit.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the committer rejects the cancel.
    pub fn discard(self) -> CoreResult<()> {
        let (updated, removed) = self.staged_changes();
        let mut committer = self.store_backend().prepare_commit(updated, removed);
        committer.cancel()?;
        debug!("unit of work discarded");
        Ok(())
    }

    fn store_backend(&self) -> &'s B {
        self.store.backend()
    }

    fn staged_changes(&self) -> (Vec<EntityState>, Vec<EntityId>) {
        let mut updated = Vec::new();
        let removed = self.removed.clone();
        for state in self.states.values() {
            match state.status() {
                // removed states carry their lock so the delete is checked
                EntityStatus::New | EntityStatus::Updated | EntityStatus::Removed => {
                    updated.push(state.clone());
                }
                EntityStatus::Loaded => {}
            }
        }
        (updated, removed)
    }

    fn cached(&mut self, id: EntityId) -> CoreResult<&mut EntityState> {
        if self.removed.contains(&id) {
            return Err(CoreError::not_found(id));
        }
        let state = match self.states.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.store.load(id)?),
        };
        if state.status() == EntityStatus::Removed {
            return Err(CoreError::not_found(id));
        }
        Ok(state)
    }
}
