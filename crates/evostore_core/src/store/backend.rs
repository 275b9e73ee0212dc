//! Backend adapter contract.

use crate::committer::StateCommitter;
use crate::entity::{EntityId, EntityState};
use crate::error::CoreResult;

/// A storage technology that can hold entity states.
///
/// States come back exactly as stored: status `Loaded`, carrying the
/// version tag they were written under. Migration to the application
/// version happens above this layer, in [`EntityStore`](crate::EntityStore).
///
/// # Implementors
///
/// - [`RecordBackend`](crate::RecordBackend) - Any [`RecordStore`](evostore_storage::RecordStore)
pub trait EntityBackend: Send + Sync {
    /// Committer returned by [`prepare_commit`](Self::prepare_commit).
    type Committer<'a>: StateCommitter
    where
        Self: 'a;

    /// Iterator returned by [`iterate`](Self::iterate).
    type Iter<'a>: Iterator<Item = CoreResult<EntityState>>
    where
        Self: 'a;

    /// Bootstraps the backend's schema. Idempotent.
    ///
    /// Returns `true` if the schema was created by this call.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the schema cannot be created.
    fn ensure_schema(&self) -> CoreResult<bool>;

    /// Loads the stored state of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`](crate::CoreError::EntityNotFound)
    /// if absent, or a storage or codec error.
    fn load(&self, id: EntityId) -> CoreResult<EntityState>;

    /// Iterates every stored entity.
    ///
    /// Each call starts a fresh pass over a snapshot of the identities
    /// present at call time.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the pass cannot be started.
    fn iterate(&self) -> CoreResult<Self::Iter<'_>>;

    /// Stages a batch of changes. Performs no I/O.
    fn prepare_commit(
        &self,
        updated: Vec<EntityState>,
        removed: Vec<EntityId>,
    ) -> Self::Committer<'_>;

    /// Allocates a fresh identity.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if identities cannot be allocated.
    fn allocate_identity(&self) -> CoreResult<EntityId>;
}
