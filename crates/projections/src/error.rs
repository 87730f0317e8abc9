//! Projection error types.

use common::EntityId;
use domain::DomainError;
use event_store::{EventStoreError, Position};
use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An event arrived past the next expected position for its cursor.
    ///
    /// The gap does not close by itself; the event is not applied and the
    /// cursor keeps its last applied value.
    #[error(
        "{event_type} at position {actual} is out of order in projection {projection} \
         for entity {entity_id}: expected position {expected}"
    )]
    OutOfOrderEvent {
        projection: String,
        entity_id: EntityId,
        event_type: String,
        expected: Position,
        actual: Position,
    },

    /// The projection declares no event it can apply.
    #[error("Cannot subscribe `{0}` because it does not handle any event")]
    UnprocessableListener(String),

    /// Mapping or applying the event failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The projection's cursor or read-model storage failed.
    #[error("Projection storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl ProjectionError {
    /// Wraps a failure of projection-owned storage.
    pub fn storage(error: impl Into<anyhow::Error>) -> Self {
        ProjectionError::Storage(error.into())
    }

    /// Returns true for a detected gap in an event sequence.
    pub fn is_out_of_order(&self) -> bool {
        matches!(self, ProjectionError::OutOfOrderEvent { .. })
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
