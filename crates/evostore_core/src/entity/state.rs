//! In-memory entity state.

use crate::entity::{Association, EntityId, Value};
use crate::error::{CoreError, CoreResult};
use crate::types::Version;
use std::collections::BTreeMap;

/// Lifecycle status of an [`EntityState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityStatus {
    /// Created in this unit of work, not yet persisted.
    New,
    /// Loaded from the backend and unchanged.
    Loaded,
    /// Loaded from the backend and changed since.
    Updated,
    /// Marked for removal.
    Removed,
}

/// Snapshot of one entity's fields, links, status and schema version.
///
/// Mutators follow the status machine `Loaded -> Updated`, keep `New`
/// as `New`, and refuse to touch a `Removed` state. Migration rewrites
/// the structure without changing the status.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    id: EntityId,
    entity_type: String,
    version: Version,
    status: EntityStatus,
    lock: u64,
    properties: BTreeMap<String, Value>,
    associations: BTreeMap<String, Association>,
}

impl EntityState {
    /// Creates the state of a brand new entity.
    #[must_use]
    pub fn new(id: EntityId, entity_type: impl Into<String>, version: impl Into<Version>) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            version: version.into(),
            status: EntityStatus::New,
            lock: 0,
            properties: BTreeMap::new(),
            associations: BTreeMap::new(),
        }
    }

    /// Creates the state of an entity read from a backend.
    ///
    /// `lock` is the optimistic-lock counter the record carried.
    #[must_use]
    pub fn loaded(
        id: EntityId,
        entity_type: impl Into<String>,
        version: impl Into<Version>,
        lock: u64,
        properties: BTreeMap<String, Value>,
        associations: BTreeMap<String, Association>,
    ) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            version: version.into(),
            status: EntityStatus::Loaded,
            lock,
            properties,
            associations,
        }
    }

    /// Adds a property while building a state, without touching its status.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Adds an association while building a state, without touching its status.
    #[must_use]
    pub fn with_association(mut self, name: impl Into<String>, association: Association) -> Self {
        self.associations.insert(name.into(), association);
        self
    }

    /// Returns the identity.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the schema version the state conforms to.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub fn status(&self) -> EntityStatus {
        self.status
    }

    /// Returns the optimistic-lock counter observed at load time.
    #[must_use]
    pub fn lock(&self) -> u64 {
        self.lock
    }

    /// Returns all properties.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Returns all associations.
    #[must_use]
    pub fn associations(&self) -> &BTreeMap<String, Association> {
        &self.associations
    }

    /// Returns a property value.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Returns an association.
    #[must_use]
    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.get(name)
    }

    /// Returns whether the state must be written on commit.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        matches!(self.status, EntityStatus::New | EntityStatus::Updated)
    }

    /// Sets a property, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the state is marked removed.
    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> CoreResult<Option<Value>> {
        self.touch()?;
        Ok(self.properties.insert(name.into(), value.into()))
    }

    /// Removes a property, returning its value.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the state is marked removed.
    pub fn remove_property(&mut self, name: &str) -> CoreResult<Option<Value>> {
        self.touch()?;
        Ok(self.properties.remove(name))
    }

    /// Sets an association, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the state is marked removed.
    pub fn set_association(
        &mut self,
        name: impl Into<String>,
        association: Association,
    ) -> CoreResult<Option<Association>> {
        self.touch()?;
        Ok(self.associations.insert(name.into(), association))
    }

    /// Marks the state for removal.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the state is already marked removed.
    pub fn mark_removed(&mut self) -> CoreResult<()> {
        self.ensure_not_removed()?;
        self.status = EntityStatus::Removed;
        Ok(())
    }

    pub(crate) fn set_entity_type(&mut self, entity_type: String) {
        self.entity_type = entity_type;
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub(crate) fn properties_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.properties
    }

    fn touch(&mut self) -> CoreResult<()> {
        self.ensure_not_removed()?;
        if self.status == EntityStatus::Loaded {
            self.status = EntityStatus::Updated;
        }
        Ok(())
    }

    fn ensure_not_removed(&self) -> CoreResult<()> {
        if self.status == EntityStatus::Removed {
            return Err(CoreError::protocol(format!(
                "entity {} is marked removed",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_state() -> EntityState {
        EntityState::loaded(
            EntityId::new(1),
            "Person",
            "1.0",
            3,
            BTreeMap::new(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn new_state_starts_new_and_dirty() {
        let state = EntityState::new(EntityId::new(1), "Person", "1.0");
        assert_eq!(state.status(), EntityStatus::New);
        assert_eq!(state.lock(), 0);
        assert!(state.is_dirty());
    }

    #[test]
    fn builder_helpers_keep_status() {
        let state = loaded_state()
            .with_property("name", "Ada")
            .with_association("friend", Association::One(None));
        assert_eq!(state.status(), EntityStatus::Loaded);
        assert_eq!(state.property("name"), Some(&Value::from("Ada")));
        assert!(state.association("friend").is_some());
    }

    #[test]
    fn set_property_marks_loaded_as_updated() {
        let mut state = loaded_state();
        assert!(!state.is_dirty());

        let previous = state.set_property("name", "Ada").unwrap();
        assert!(previous.is_none());
        assert_eq!(state.status(), EntityStatus::Updated);
    }

    #[test]
    fn set_property_keeps_new_as_new() {
        let mut state = EntityState::new(EntityId::new(1), "Person", "1.0");
        state.set_property("name", "Ada").unwrap();
        assert_eq!(state.status(), EntityStatus::New);
    }

    #[test]
    fn removed_state_rejects_changes() {
        let mut state = loaded_state();
        state.mark_removed().unwrap();

        assert_eq!(state.status(), EntityStatus::Removed);
        assert!(state.set_property("name", "Ada").is_err());
        assert!(state.remove_property("name").is_err());
        assert!(state.mark_removed().is_err());
    }

    #[test]
    fn set_association_returns_previous() {
        let mut state = loaded_state();
        state
            .set_association("friend", Association::One(Some(EntityId::new(2))))
            .unwrap();
        let previous = state
            .set_association("friend", Association::One(None))
            .unwrap();
        assert_eq!(previous, Some(Association::One(Some(EntityId::new(2)))));
    }
}
