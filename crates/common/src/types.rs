use std::hash::Hash;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an entity, aggregate or event stream.
///
/// Wraps a UUID to provide type safety and prevent mixing up
/// entity IDs with other UUID-based identifiers. Equality and hashing
/// derive solely from the wrapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EntityId> for Uuid {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// An object whose equality is defined by its identity alone.
///
/// Implementors compare equal when their ids do, regardless of any other
/// (mutable) attribute.
pub trait Entity {
    /// The identity type.
    type Id: Eq + Hash + Copy;

    /// Returns the identity of this entity.
    fn id(&self) -> Self::Id;

    /// Returns true if both entities share the same identity.
    fn same_identity_as(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

/// Marker for immutable, attribute-equal values with no identity.
///
/// The bounds require the full attribute tuple to drive equality and hashing,
/// which `#[derive(PartialEq, Eq, Hash)]` provides.
pub trait ValueObject: Clone + Eq + Hash {}

impl ValueObject for EntityId {}
