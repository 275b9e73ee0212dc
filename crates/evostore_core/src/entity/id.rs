//! Entity identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an entity.
///
/// The identity doubles as the storage primary key. Identities are:
/// - Handed out by the backend's [`PkAllocator`](crate::PkAllocator)
/// - Immutable once assigned
/// - Never reused, even after the entity is removed
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates an entity ID from its primary key.
    #[inline]
    #[must_use]
    pub const fn new(pk: u64) -> Self {
        Self(pk)
    }

    /// Returns the primary key.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(pk: u64) -> Self {
        Self::new(pk)
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}
