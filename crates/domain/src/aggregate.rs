//! Event-sourced aggregate roots.

use std::fmt;
use std::sync::Arc;

use common::{Entity, EntityId};
use event_store::Version;

use crate::error::Result;
use crate::event::DomainEvent;
use crate::handlers::EventHandlers;

/// Trait for aggregate state in an event-sourced system.
///
/// An aggregate is a cluster of domain objects that can be treated as a single unit.
/// Its state changes only by applying domain events:
/// - Rebuilt by replaying events
/// - Changed by raising new events
/// - Apply routines are pure and deterministic
///
/// The apply routine for each event is selected by the event's concrete type
/// through the table returned by [`Aggregate::event_handlers`].
pub trait Aggregate: Default + Send + Sync + Sized + 'static {
    /// Returns the aggregate type name.
    ///
    /// Stored as the stream type of every event the aggregate raises.
    fn aggregate_type() -> &'static str;

    /// Returns the apply routines for every event this aggregate understands.
    fn event_handlers() -> EventHandlers<Self>;
}

/// An aggregate's identity, persisted version, state and pending changes.
///
/// `version` counts the events persisted for this identity. Raising an event
/// applies it to the state at once and queues it in `changes`, but the
/// version only moves when [`clear_changes`](Self::clear_changes) is called
/// after a successful append.
pub struct AggregateRoot<A: Aggregate> {
    id: EntityId,
    version: Version,
    state: A,
    changes: Vec<Arc<dyn DomainEvent>>,
    handlers: EventHandlers<A>,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Creates a new aggregate at version 0 with default state.
    pub fn new(id: EntityId) -> Self {
        Self::with_state(id, A::default())
    }

    /// Creates a new aggregate at version 0 with the given initial state.
    pub fn with_state(id: EntityId, state: A) -> Self {
        Self {
            id,
            version: Version::initial(),
            state,
            changes: Vec::new(),
            handlers: A::event_handlers(),
        }
    }

    /// Rebuilds an aggregate at a historical `version`.
    ///
    /// `events` are applied to `state` in order through the apply routines
    /// only; nothing is queued as a pending change.
    pub fn load<I>(id: EntityId, version: Version, state: A, events: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn DomainEvent>>,
    {
        let mut root = Self::with_state(id, state);
        for event in events {
            root.handlers.apply(&mut root.state, event.as_ref())?;
        }
        root.version = version;
        Ok(root)
    }

    /// Applies one historical event read from the stream and counts it as persisted.
    pub fn replay(&mut self, event: &dyn DomainEvent) -> Result<()> {
        self.handlers.apply(&mut self.state, event)?;
        self.version = self.version.next();
        Ok(())
    }

    /// Applies a new event to the state and queues it for persistence.
    ///
    /// Fails with `UnknownEvent` if the aggregate has no apply routine for
    /// the event's type, in which case nothing is queued.
    pub fn raise<E: DomainEvent>(&mut self, event: E) -> Result<()> {
        self.raise_shared(Arc::new(event))
    }

    /// Like [`raise`](Self::raise) for an already type-erased event.
    pub fn raise_shared(&mut self, event: Arc<dyn DomainEvent>) -> Result<()> {
        self.handlers.apply(&mut self.state, event.as_ref())?;
        tracing::trace!(
            aggregate_type = A::aggregate_type(),
            aggregate_id = %self.id,
            event_type = event.event_type(),
            "Event raised"
        );
        self.changes.push(event);
        Ok(())
    }

    /// Events raised since the last successful save, in raise order.
    pub fn changes(&self) -> &[Arc<dyn DomainEvent>] {
        &self.changes
    }

    /// Returns true if events were raised since the last save.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Drops the pending changes after they were appended to the store.
    ///
    /// Advances the version by the number of changes and returns them.
    pub fn clear_changes(&mut self) -> Vec<Arc<dyn DomainEvent>> {
        let changes = std::mem::take(&mut self.changes);
        self.version = self.version.advance(changes.len());
        changes
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Number of events persisted for this aggregate.
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    /// Consumes the root, returning its state.
    pub fn into_state(self) -> A {
        self.state
    }
}

impl<A: Aggregate> Entity for AggregateRoot<A> {
    type Id = EntityId;

    fn id(&self) -> EntityId {
        self.id
    }
}

impl<A: Aggregate> PartialEq for AggregateRoot<A> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<A: Aggregate> Eq for AggregateRoot<A> {}

impl<A: Aggregate + fmt::Debug> fmt::Debug for AggregateRoot<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRoot")
            .field("aggregate_type", &A::aggregate_type())
            .field("id", &self.id)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("changes", &self.changes)
            .finish()
    }
}
