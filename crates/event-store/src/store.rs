use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::TryStreamExt;

use crate::{EntityId, EventStoreError, PendingEvent, RawEvent, Result, StreamState, Version};

/// A lazy, ordered, finite stream of stored events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RawEvent>> + Send>>;

/// Core trait for event store implementations.
///
/// An event store is an append-only log of events, one stream per entity.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to a stream.
    ///
    /// Events are appended atomically - either all succeed or none do.
    /// Fails with `ConcurrencyConflict` if the stream's current version is not
    /// `expected_version`. On success the events receive consecutive positions
    /// starting at `expected_version`, and the new stream version is returned.
    async fn append(
        &self,
        stream_id: EntityId,
        expected_version: Version,
        events: Vec<PendingEvent>,
    ) -> Result<Version>;

    /// Streams the events of a stream starting at `from_version`.
    ///
    /// Events are yielded in append order. The stream ends at the last event
    /// stored when this call was made; calling again restarts the replay.
    async fn get_all(&self, stream_id: EntityId, from_version: Version) -> Result<EventStream>;

    /// Gets the current version of a stream (0 if it has no events).
    async fn current_version(&self, stream_id: EntityId) -> Result<Version>;

    /// Retrieves the most recent event of a stream whose type is one of `event_types`.
    async fn get_last(
        &self,
        stream_id: EntityId,
        event_types: &[&str],
    ) -> Result<Option<RawEvent>>;

    /// Streams every stored event across all streams in insertion order.
    async fn stream_all(&self) -> Result<EventStream>;

    /// Retrieves the state of a stream, or `None` if nothing was appended to it.
    async fn get_stream(&self, stream_id: EntityId) -> Result<Option<StreamState>>;

    /// Streams of type `stream_type` whose slug is `slug`, in creation order.
    async fn get_streams_by_slug(&self, slug: &str, stream_type: &str)
    -> Result<Vec<StreamState>>;

    /// Every stream of type `stream_type`, in creation order.
    async fn get_streams_by_type(&self, stream_type: &str) -> Result<Vec<StreamState>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event to a stream.
    async fn append_event(
        &self,
        stream_id: EntityId,
        expected_version: Version,
        event: PendingEvent,
    ) -> Result<Version> {
        self.append(stream_id, expected_version, vec![event]).await
    }

    /// Checks if a stream exists (has any events).
    async fn stream_exists(&self, stream_id: EntityId) -> Result<bool> {
        Ok(self.current_version(stream_id).await? > Version::initial())
    }

    /// Reads a whole stream into memory.
    ///
    /// Prefer [`EventStore::get_all`] for long streams.
    async fn read_stream(&self, stream_id: EntityId) -> Result<Vec<RawEvent>> {
        self.get_all(stream_id, Version::initial())
            .await?
            .try_collect()
            .await
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before appending.
///
/// The batch must be non-empty and every event must carry the same stream type.
pub fn validate_events_for_append(stream_id: EntityId, events: &[PendingEvent]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::EmptyAppend(stream_id));
    };

    if let Some(other) = events
        .iter()
        .skip(1)
        .find(|e| e.stream_type != first.stream_type)
    {
        return Err(EventStoreError::InvalidBatch(format!(
            "all events must have the same stream type, found {} and {}",
            first.stream_type, other.stream_type
        )));
    }

    if let Some(event) = events.iter().find(|e| e.event_type.is_empty()) {
        return Err(EventStoreError::InvalidBatch(format!(
            "event {} has an empty event type",
            event.event_id
        )));
    }

    Ok(())
}
