use thiserror::Error;

use crate::{EntityId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A concurrency conflict occurred when appending events.
    /// The expected version did not match the stream's stored version.
    #[error(
        "Concurrency conflict for stream {stream_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        stream_id: EntityId,
        expected: Version,
        actual: Version,
    },

    /// An append was attempted with no events.
    #[error("Cannot append an empty event batch to stream {0}")]
    EmptyAppend(EntityId),

    /// The batch of events is not appendable as a unit.
    #[error("Invalid event batch: {0}")]
    InvalidBatch(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
