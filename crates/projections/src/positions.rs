//! In-memory projection cursors.

use std::collections::HashMap;
use std::sync::Arc;

use common::EntityId;
use event_store::Position;
use tokio::sync::RwLock;

/// Granularity of the cursors kept by a [`PositionTable`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorScope {
    /// One cursor per entity, shared by every event type.
    ///
    /// Suits read models that declare every event type of the streams they
    /// follow, since stream positions interleave across types.
    #[default]
    Entity,

    /// One cursor per (entity, event type) pair.
    EventType,
}

type CursorKey = (EntityId, Option<String>);

/// Last applied position per cursor, for projections kept in memory.
///
/// Cloning shares the underlying table.
#[derive(Debug, Clone, Default)]
pub struct PositionTable {
    scope: CursorScope,
    cursors: Arc<RwLock<HashMap<CursorKey, Position>>>,
}

impl PositionTable {
    /// Creates a table with one cursor per entity.
    ///
    /// The cursor still answers for every (entity, event type) pair, but all
    /// pairs of one entity share it. A table keyed literally per pair would
    /// see the positions of the other event types in the stream as gaps; use
    /// [`CursorScope::EventType`] for projections that follow a single type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with the given cursor scope.
    pub fn with_scope(scope: CursorScope) -> Self {
        Self {
            scope,
            cursors: Arc::default(),
        }
    }

    pub fn scope(&self) -> CursorScope {
        self.scope
    }

    /// Last applied position, or `None` if nothing was applied yet.
    pub async fn get(&self, entity_id: EntityId, event_type: &str) -> Option<Position> {
        self.cursors
            .read()
            .await
            .get(&self.key(entity_id, event_type))
            .copied()
    }

    /// Records `position` as the last applied one.
    pub async fn set(&self, entity_id: EntityId, event_type: &str, position: Position) {
        let key = self.key(entity_id, event_type);
        self.cursors.write().await.insert(key, position);
    }

    /// Number of cursors held.
    pub async fn len(&self) -> usize {
        self.cursors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cursors.read().await.is_empty()
    }

    /// Forgets every cursor.
    pub async fn clear(&self) {
        self.cursors.write().await.clear();
    }

    fn key(&self, entity_id: EntityId, event_type: &str) -> CursorKey {
        match self.scope {
            CursorScope::Entity => (entity_id, None),
            CursorScope::EventType => (entity_id, Some(event_type.to_string())),
        }
    }
}
