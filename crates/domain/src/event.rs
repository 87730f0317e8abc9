//! Domain events and their runtime type identity.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Access to the concrete type behind a `dyn DomainEvent`.
///
/// Implemented for every sized `'static` type; never implement it by hand.
pub trait AsAny: Any + Send + Sync {
    /// Returns `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the `TypeId` of the concrete type.
    fn concrete_type_id(&self) -> TypeId;

    /// Returns the name of the concrete type.
    fn concrete_type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn concrete_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn concrete_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense. Each event type is
/// its own Rust type, so handlers are selected by concrete type rather than
/// by name.
pub trait DomainEvent: AsAny + fmt::Debug {
    /// Returns the event type name.
    ///
    /// This is the discriminator persisted with the event and used to pick a
    /// mapper when reading it back.
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload for persistence.
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error>;
}

impl dyn DomainEvent {
    /// Returns true if the event is of concrete type `E`.
    pub fn is<E: DomainEvent>(&self) -> bool {
        self.concrete_type_id() == TypeId::of::<E>()
    }

    /// Downcasts to the concrete event type `E`.
    pub fn downcast_ref<E: DomainEvent>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    /// Returns the kind (concrete type) of this event.
    pub fn kind(&self) -> EventKind {
        EventKind {
            type_id: self.concrete_type_id(),
            name: self.concrete_type_name(),
        }
    }
}

/// Runtime identity of a concrete event type.
///
/// Two kinds are equal when they denote the same Rust type; the name is only
/// carried for diagnostics.
#[derive(Clone, Copy)]
pub struct EventKind {
    type_id: TypeId,
    name: &'static str,
}

impl EventKind {
    /// Returns the kind of event type `E`.
    pub fn of<E: DomainEvent>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for EventKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EventKind {}

impl Hash for EventKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventKind").field(&self.name).finish()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
