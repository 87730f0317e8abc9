//! Domain layer of the event-sourcing toolkit.
//!
//! This crate provides the write-side abstractions:
//! - [`DomainEvent`] and [`EventKind`] for type-identified domain events
//! - [`EventHandlers`], the per-type apply table shared by aggregates and projections
//! - [`Aggregate`] / [`AggregateRoot`] for event-sourced roots with pending changes
//! - [`MappingPipeline`] turning stored [`RawEvent`](event_store::RawEvent)s into domain events
//! - [`AggregateRepository`] loading and saving aggregates through an [`EventStore`](event_store::EventStore)
//! - [`EventBroker`] for same-process notification of freshly committed events

pub mod aggregate;
pub mod broker;
pub mod error;
pub mod event;
pub mod handlers;
pub mod mapping;
pub mod repository;

pub use aggregate::{Aggregate, AggregateRoot};
pub use broker::{DomainEventHandler, EventBroker, EventSubscriber, HandlerFailure, PublishReport};
pub use error::{BoxError, DomainError, Result};
pub use event::{AsAny, DomainEvent, EventKind};
pub use handlers::EventHandlers;
pub use mapping::{EventMapper, JsonMapper, MappingPipeline};
pub use repository::{AggregateRepository, CommandResult};
