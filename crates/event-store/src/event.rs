use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::EntityId;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of events persisted to a stream, used for optimistic concurrency control.
///
/// A stream that has never been written to is at version 0. Appending `n`
/// events at version `v` moves the stream to version `v + n`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of an empty stream.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns this version advanced by `count` events.
    pub fn advance(&self, count: usize) -> Self {
        Self(self.0 + count as u64)
    }

    /// Position the next appended event receives.
    pub fn next_position(&self) -> Position {
        Position(self.0)
    }

    /// Returns the raw version value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// Zero-based offset of an event within its stream.
///
/// Positions are assigned by the store on append and strictly increase in
/// append order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Position(u64);

impl Position {
    /// Creates a position from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the first position (0) of a stream.
    pub fn first() -> Self {
        Self(0)
    }

    /// Returns the following position.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw position value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Position {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A persisted event record as read back from the store.
///
/// Immutable once stored; the payload is kept in its serialized form and
/// turned into a domain event by a mapping stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The stream (entity) this event belongs to.
    pub stream_id: EntityId,

    /// The type of stream (e.g., "Order", "Customer").
    pub stream_type: String,

    /// The event type discriminator (e.g., "OrderCreated").
    pub event_type: String,

    /// Zero-based position within the stream.
    pub position: Position,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// When the event was stored.
    pub created_at: DateTime<Utc>,

    /// Correlation ID of the operation that produced the event.
    pub correlation_id: Option<Uuid>,

    /// Additional metadata about the event.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RawEvent {
    /// Deserializes the payload into a concrete type.
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Stream version after this event was appended.
    pub fn version(&self) -> Version {
        Version(self.position.0 + 1)
    }
}

/// An event waiting to be appended.
///
/// Carries everything but the store-assigned position and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub event_id: EventId,
    pub stream_type: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub correlation_id: Option<Uuid>,
    /// Human-readable identifier recorded on the stream, e.g. `"john-doe"`.
    pub stream_slug: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl PendingEvent {
    /// Creates a pending event from a raw JSON payload.
    pub fn new(
        stream_type: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            stream_type: stream_type.into(),
            event_type: event_type.into(),
            payload,
            correlation_id: None,
            stream_slug: None,
            metadata: HashMap::new(),
        }
    }

    /// Creates a pending event by serializing `payload`.
    pub fn from_serializable<T: Serialize>(
        stream_type: impl Into<String>,
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            stream_type,
            event_type,
            serde_json::to_value(payload)?,
        ))
    }

    /// Sets the correlation ID.
    pub fn correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Sets the slug recorded on the stream.
    pub fn stream_slug(mut self, slug: impl Into<String>) -> Self {
        self.stream_slug = Some(slug.into());
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Stamps the event with its stream and position.
    pub(crate) fn into_raw(
        self,
        stream_id: EntityId,
        position: Position,
        created_at: DateTime<Utc>,
    ) -> RawEvent {
        RawEvent {
            event_id: self.event_id,
            stream_id,
            stream_type: self.stream_type,
            event_type: self.event_type,
            position,
            payload: self.payload,
            created_at,
            correlation_id: self.correlation_id,
            metadata: self.metadata,
        }
    }
}

/// What the store knows about a stream besides its events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    pub stream_id: EntityId,
    pub stream_type: String,
    /// Latest slug given on append, if any.
    pub slug: Option<String>,
    pub version: Version,
}
