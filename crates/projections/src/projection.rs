//! Core projection trait.

use async_trait::async_trait;
use common::EntityId;
use domain::{DomainEvent, EventKind};
use event_store::Position;

use crate::Result;

/// A read model builder fed with domain events.
///
/// Projections are the mechanism by which events are transformed into
/// denormalized read models optimized for queries. Besides applying events,
/// a projection owns the cursor recording the last position it applied for
/// each (entity, event type) pair; [`Projector`](crate::Projector) consults
/// it to keep delivery ordered and idempotent.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &str;

    /// The concrete event types this projection can apply.
    fn handles(&self) -> Vec<EventKind>;

    /// Applies an event to the read model.
    ///
    /// Must depend only on the current read-model state and the event.
    async fn apply(&self, event: &dyn DomainEvent) -> Result<()>;

    /// Last position applied for the pair, or `None` if nothing was applied yet.
    async fn get_position(&self, entity_id: EntityId, event_type: &str)
    -> Result<Option<Position>>;

    /// Records `position` as applied for the pair.
    ///
    /// The write must be durable when this returns.
    async fn update_position(
        &self,
        entity_id: EntityId,
        event_type: &str,
        position: Position,
    ) -> Result<()>;
}
