//! Conversion of stored raw events into typed domain events.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use event_store::RawEvent;
use serde::de::DeserializeOwned;

use crate::error::{BoxError, DomainError, Result};
use crate::event::DomainEvent;

/// Converts a [`RawEvent`] into a concrete domain event.
///
/// Mappers must be pure and fail loudly on a malformed payload instead of
/// producing a partially populated event.
pub trait EventMapper: Send + Sync {
    fn map(&self, raw: &RawEvent) -> std::result::Result<Arc<dyn DomainEvent>, BoxError>;
}

impl<F> EventMapper for F
where
    F: Fn(&RawEvent) -> std::result::Result<Arc<dyn DomainEvent>, BoxError> + Send + Sync,
{
    fn map(&self, raw: &RawEvent) -> std::result::Result<Arc<dyn DomainEvent>, BoxError> {
        self(raw)
    }
}

/// Mapper that deserializes the JSON payload straight into `E`.
pub struct JsonMapper<E> {
    _event: PhantomData<fn() -> E>,
}

impl<E> JsonMapper<E> {
    pub fn new() -> Self {
        Self {
            _event: PhantomData,
        }
    }
}

impl<E> Default for JsonMapper<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventMapper for JsonMapper<E>
where
    E: DomainEvent + DeserializeOwned,
{
    fn map(&self, raw: &RawEvent) -> std::result::Result<Arc<dyn DomainEvent>, BoxError> {
        let event: E = raw.deserialize_payload()?;
        Ok(Arc::new(event))
    }
}

/// Registry of mappers keyed by the stored event type discriminator.
///
/// Populated at startup, then shared read-only (usually behind an `Arc`) by
/// the repository and the dispatcher.
#[derive(Default)]
pub struct MappingPipeline {
    mappers: HashMap<String, Arc<dyn EventMapper>>,
}

impl MappingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `mapper` for raw events of type `event_type`.
    ///
    /// Fails with `MapperAlreadyRegistered` if the type already has a mapper.
    pub fn register<M>(&mut self, event_type: impl Into<String>, mapper: M) -> Result<()>
    where
        M: EventMapper + 'static,
    {
        let event_type = event_type.into();
        if self.mappers.contains_key(&event_type) {
            return Err(DomainError::MapperAlreadyRegistered(event_type));
        }

        tracing::debug!(event_type = %event_type, "Event mapper registered");
        self.mappers.insert(event_type, Arc::new(mapper));
        Ok(())
    }

    /// Registers a [`JsonMapper`] for `E` under `event_type`.
    pub fn register_json<E>(&mut self, event_type: impl Into<String>) -> Result<()>
    where
        E: DomainEvent + DeserializeOwned,
    {
        self.register(event_type, JsonMapper::<E>::new())
    }

    /// Maps a raw event to its domain event.
    ///
    /// Fails with `MapperNotFound` when no mapper is registered for the raw
    /// event type, and with `MappingError` when the mapper rejects the payload.
    pub fn map(&self, raw: &RawEvent) -> Result<Arc<dyn DomainEvent>> {
        let mapper = self
            .mappers
            .get(&raw.event_type)
            .ok_or_else(|| DomainError::MapperNotFound(raw.event_type.clone()))?;

        mapper.map(raw).map_err(|source| DomainError::MappingError {
            event_type: raw.event_type.clone(),
            source,
        })
    }

    /// Returns true if a mapper is registered for `event_type`.
    pub fn contains(&self, event_type: &str) -> bool {
        self.mappers.contains_key(event_type)
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

impl fmt::Debug for MappingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut event_types: Vec<_> = self.mappers.keys().collect();
        event_types.sort();
        f.debug_struct("MappingPipeline")
            .field("event_types", &event_types)
            .finish()
    }
}
