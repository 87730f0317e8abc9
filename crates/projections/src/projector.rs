//! Ordered, idempotent delivery to a single projection.

use std::fmt;
use std::sync::Arc;

use common::EntityId;
use domain::{DomainEvent, EventKind};
use event_store::Position;
use tokio::sync::Mutex;

use crate::error::{ProjectionError, Result};
use crate::projection::Projection;

/// What a projector did with a delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectorOutcome {
    /// The event was applied and the cursor moved to its position.
    Applied,
    /// The event was at or behind the cursor and was skipped.
    Skipped,
}

/// Wraps a [`Projection`] and guards it against duplicates and gaps.
///
/// For a cursor `c` (absent meaning nothing applied yet) and an event at
/// position `p`:
/// - `p == c + 1`: the event is applied, then the cursor moves to `p`
/// - `p <= c`: the event was already applied and is skipped
/// - `p > c + 1`: fails with `OutOfOrderEvent`; the cursor stays at `c`
///
/// Each cursor read and update happen under the projector's lock, so
/// concurrent deliveries cannot lose an update.
pub struct Projector {
    projection: Arc<dyn Projection>,
    handles: Vec<EventKind>,
    gate: Mutex<()>,
}

impl Projector {
    /// Creates a projector for `projection`.
    pub fn new(projection: Arc<dyn Projection>) -> Self {
        let handles = projection.handles();
        Self {
            projection,
            handles,
            gate: Mutex::new(()),
        }
    }

    /// Name of the wrapped projection.
    pub fn name(&self) -> &str {
        self.projection.name()
    }

    /// Event types the wrapped projection declared at construction.
    pub fn handles(&self) -> &[EventKind] {
        &self.handles
    }

    /// Returns true if events of type `kind` should be delivered here.
    pub fn accepts(&self, kind: &EventKind) -> bool {
        self.handles.contains(kind)
    }

    pub fn projection(&self) -> &Arc<dyn Projection> {
        &self.projection
    }

    /// Delivers `event`, stored at `position` in the stream of `entity_id`.
    #[tracing::instrument(
        skip(self, event),
        fields(projection = self.projection.name(), event_type = event.event_type())
    )]
    pub async fn process(
        &self,
        event: &dyn DomainEvent,
        position: Position,
        entity_id: EntityId,
    ) -> Result<ProjectorOutcome> {
        let _guard = self.gate.lock().await;
        let event_type = event.event_type();

        let current = self
            .projection
            .get_position(entity_id, event_type)
            .await?;
        let expected = current.map_or(Position::first(), |c| c.next());

        if position < expected {
            tracing::debug!("Event already applied, skipping");
            metrics::counter!("projector_events_skipped").increment(1);
            return Ok(ProjectorOutcome::Skipped);
        }

        if position > expected {
            tracing::error!(expected = %expected, "Event is out of order");
            metrics::counter!("projector_out_of_order").increment(1);
            return Err(ProjectionError::OutOfOrderEvent {
                projection: self.projection.name().to_string(),
                entity_id,
                event_type: event_type.to_string(),
                expected,
                actual: position,
            });
        }

        self.projection.apply(event).await?;
        tracing::info!("Event projected");

        self.projection
            .update_position(entity_id, event_type, position)
            .await?;
        metrics::counter!("projector_events_applied").increment(1);

        Ok(ProjectorOutcome::Applied)
    }
}

impl fmt::Debug for Projector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projector")
            .field("projection", &self.projection.name())
            .field("handles", &self.handles)
            .finish()
    }
}
