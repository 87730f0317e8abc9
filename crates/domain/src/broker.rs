//! In-process publish/subscribe for freshly raised domain events.
//!
//! The broker notifies same-process listeners (side effects, integrations)
//! synchronously. It is not durable and does not feed projections; those are
//! driven from the event store.

use std::collections::HashMap;
use std::sync::Arc;

use event_store::Position;

use crate::error::{DomainError, Result};
use crate::event::{DomainEvent, EventKind};

/// Type-erased consumer registered with an [`EventBroker`].
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;

    /// The concrete event type this subscriber consumes.
    ///
    /// Returning `None` makes the subscriber unroutable and it is refused at
    /// subscription.
    fn subscribed_event(&self) -> Option<EventKind>;

    /// Handles an event of the subscribed type.
    fn handle(&self, event: &dyn DomainEvent, position: Position) -> anyhow::Result<()>;
}

/// Typed consumer of a single domain event type.
pub trait DomainEventHandler: Send + Sync + 'static {
    /// The event type this handler processes.
    type Event: DomainEvent;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Processes an event. `position` lets the handler detect redeliveries.
    fn process(&self, event: &Self::Event, position: Position) -> anyhow::Result<()>;
}

struct TypedSubscriber<H> {
    handler: H,
}

impl<H: DomainEventHandler> EventSubscriber for TypedSubscriber<H> {
    fn name(&self) -> &str {
        self.handler.name()
    }

    fn subscribed_event(&self) -> Option<EventKind> {
        Some(EventKind::of::<H::Event>())
    }

    fn handle(&self, event: &dyn DomainEvent, position: Position) -> anyhow::Result<()> {
        match event.downcast_ref::<H::Event>() {
            Some(event) => self.handler.process(event, position),
            None => anyhow::bail!(
                "{} cannot process {}",
                self.handler.name(),
                event.event_type()
            ),
        }
    }
}

/// A handler failure caught during [`EventBroker::publish`].
#[derive(Debug)]
pub struct HandlerFailure {
    pub handler: String,
    pub error: anyhow::Error,
}

/// Outcome of publishing one event.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Handlers that processed the event successfully.
    pub delivered: usize,
    /// Handlers that failed, in registration order.
    pub failures: Vec<HandlerFailure>,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Routes published events to the subscribers of their concrete type.
///
/// Subscribers are invoked synchronously in registration order. The registry
/// is filled during startup and only read afterwards.
#[derive(Default)]
pub struct EventBroker {
    subscribers: HashMap<EventKind, Vec<Arc<dyn EventSubscriber>>>,
}

impl EventBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a type-erased consumer.
    ///
    /// Fails with `UnsupportedEventHandler` if it declares no event type.
    pub fn subscribe(&mut self, subscriber: Arc<dyn EventSubscriber>) -> Result<()> {
        let Some(kind) = subscriber.subscribed_event() else {
            return Err(DomainError::UnsupportedEventHandler(
                subscriber.name().to_string(),
            ));
        };

        tracing::debug!(subscriber = subscriber.name(), event = %kind, "Subscriber registered");
        self.subscribers.entry(kind).or_default().push(subscriber);
        Ok(())
    }

    /// Subscribes a typed handler for `H::Event`.
    pub fn subscribe_handler<H: DomainEventHandler>(&mut self, handler: H) -> Result<()> {
        self.subscribe(Arc::new(TypedSubscriber { handler }))
    }

    /// Invokes every subscriber of `event`'s concrete type.
    ///
    /// A failing subscriber is logged and reported; the remaining subscribers
    /// still run.
    #[tracing::instrument(skip(self, event), fields(event_type = event.event_type()))]
    pub fn publish(&self, event: &dyn DomainEvent, position: Position) -> PublishReport {
        let mut report = PublishReport::default();
        let Some(subscribers) = self.subscribers.get(&event.kind()) else {
            return report;
        };

        for subscriber in subscribers {
            match subscriber.handle(event, position) {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    tracing::warn!(
                        subscriber = subscriber.name(),
                        error = %error,
                        "Event handler failed"
                    );
                    metrics::counter!("broker_handler_failures").increment(1);
                    report.failures.push(HandlerFailure {
                        handler: subscriber.name().to_string(),
                        error,
                    });
                }
            }
        }

        report
    }

    /// Number of subscribers for event type `kind`.
    pub fn subscriber_count(&self, kind: &EventKind) -> usize {
        self.subscribers.get(kind).map_or(0, Vec::len)
    }
}
