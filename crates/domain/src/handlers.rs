//! Type-dispatched apply table.

use std::collections::HashMap;
use std::fmt;

use crate::error::{DomainError, Result};
use crate::event::{DomainEvent, EventKind};

type ApplyFn<S> = Box<dyn Fn(&mut S, &dyn DomainEvent) + Send + Sync>;

/// Maps concrete event types to the routine that applies them to a state `S`.
///
/// Aggregates and projections declare the events they understand by
/// registering one handler per event type. Applying an event without a
/// registered handler fails with [`DomainError::UnknownEvent`].
pub struct EventHandlers<S> {
    target: &'static str,
    handlers: HashMap<EventKind, ApplyFn<S>>,
    kinds: Vec<EventKind>,
}

impl<S: 'static> EventHandlers<S> {
    /// Creates an empty table for `target` (named in `UnknownEvent` errors).
    pub fn new(target: &'static str) -> Self {
        Self {
            target,
            handlers: HashMap::new(),
            kinds: Vec::new(),
        }
    }

    /// Registers the apply routine for event type `E`.
    ///
    /// Registering the same event type again replaces the previous routine.
    pub fn on<E, F>(mut self, apply: F) -> Self
    where
        E: DomainEvent,
        F: Fn(&mut S, &E) + Send + Sync + 'static,
    {
        let kind = EventKind::of::<E>();
        let handler: ApplyFn<S> = Box::new(move |state, event| {
            if let Some(event) = event.downcast_ref::<E>() {
                apply(state, event);
            }
        });

        if self.handlers.insert(kind, handler).is_none() {
            self.kinds.push(kind);
        }
        self
    }

    /// Declares event type `E` as understood but without effect on the state.
    pub fn ignore<E: DomainEvent>(self) -> Self {
        self.on(|_: &mut S, _: &E| {})
    }

    /// Applies `event` to `state` with the routine registered for its concrete type.
    pub fn apply(&self, state: &mut S, event: &dyn DomainEvent) -> Result<()> {
        match self.handlers.get(&event.kind()) {
            Some(handler) => {
                handler(state, event);
                Ok(())
            }
            None => Err(DomainError::UnknownEvent {
                target: self.target.to_string(),
                event_type: event.event_type().to_string(),
            }),
        }
    }

    /// Returns true if an apply routine is registered for `kind`.
    pub fn handles(&self, kind: &EventKind) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Event kinds in registration order.
    pub fn kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    /// Name of the object the table applies events to.
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Returns true if no event type is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<S> fmt::Debug for EventHandlers<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("target", &self.target)
            .field("kinds", &self.kinds)
            .finish()
    }
}
