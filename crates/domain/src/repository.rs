//! Loading and saving aggregates through an event store.

use std::marker::PhantomData;
use std::sync::Arc;

use common::EntityId;
use event_store::{EventStore, PendingEvent, Position, Version};
use futures_util::TryStreamExt;
use uuid::Uuid;

use crate::aggregate::{Aggregate, AggregateRoot};
use crate::error::Result;
use crate::event::DomainEvent;
use crate::mapping::MappingPipeline;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after the new events were persisted.
    pub aggregate: AggregateRoot<A>,

    /// The events that were raised and persisted, in order.
    pub events: Vec<Arc<dyn DomainEvent>>,

    /// The stream version before the command.
    pub previous_version: Version,

    /// The stream version after the command.
    pub new_version: Version,
}

impl<A: Aggregate> CommandResult<A> {
    /// Pairs each persisted event with the stream position it was stored at.
    pub fn committed(&self) -> impl Iterator<Item = (Position, &Arc<dyn DomainEvent>)> {
        let first = self.previous_version.as_u64();
        self.events
            .iter()
            .enumerate()
            .map(move |(i, event)| (Position::new(first + i as u64), event))
    }
}

/// Persistence collaborator for aggregates of type `A`.
///
/// The repository is responsible for:
/// 1. Rehydrating an aggregate by mapping and replaying its stream
/// 2. Appending pending changes with the aggregate's version as the expected version
/// 3. Clearing the changes once the append succeeded
///
/// A `ConcurrencyConflict` from the store is returned unchanged; reloading
/// and retrying the command is up to the caller.
pub struct AggregateRepository<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    pipeline: Arc<MappingPipeline>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<S, A> AggregateRepository<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a repository over `store` reading events through `pipeline`.
    pub fn new(store: S, pipeline: Arc<MappingPipeline>) -> Self {
        Self {
            store,
            pipeline,
            _aggregate: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate by replaying its stream.
    ///
    /// Returns `None` if the stream has no events.
    #[tracing::instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn load(&self, id: EntityId) -> Result<Option<AggregateRoot<A>>> {
        let mut events = self.store.get_all(id, Version::initial()).await?;
        let mut root = AggregateRoot::<A>::new(id);

        while let Some(raw) = events.try_next().await? {
            let event = self.pipeline.map(&raw)?;
            root.replay(event.as_ref())?;
        }

        if root.version() == Version::initial() {
            return Ok(None);
        }

        tracing::debug!(version = %root.version(), "Aggregate loaded");
        Ok(Some(root))
    }

    /// Appends the aggregate's pending changes and clears them.
    ///
    /// Returns the persisted events. Nothing is appended when there are no
    /// pending changes.
    #[tracing::instrument(
        skip(self, root),
        fields(aggregate_type = A::aggregate_type(), aggregate_id = %root.id())
    )]
    pub async fn save(
        &self,
        root: &mut AggregateRoot<A>,
        correlation_id: Option<Uuid>,
    ) -> Result<Vec<Arc<dyn DomainEvent>>> {
        if !root.has_changes() {
            return Ok(Vec::new());
        }

        let mut pending = Vec::with_capacity(root.changes().len());
        for event in root.changes() {
            let mut record = PendingEvent::new(
                A::aggregate_type(),
                event.event_type(),
                event.to_payload()?,
            );
            if let Some(correlation_id) = correlation_id {
                record = record.correlation_id(correlation_id);
            }
            pending.push(record);
        }

        let new_version = self.store.append(root.id(), root.version(), pending).await?;
        let events = root.clear_changes();
        debug_assert_eq!(new_version, root.version());

        tracing::debug!(
            events = events.len(),
            version = %new_version,
            "Aggregate saved"
        );
        Ok(events)
    }

    /// Loads (or creates) an aggregate, runs `command` on it and saves the result.
    ///
    /// If `command` fails nothing is persisted.
    pub async fn execute<F>(&self, id: EntityId, command: F) -> Result<CommandResult<A>>
    where
        F: FnOnce(&mut AggregateRoot<A>) -> Result<()>,
    {
        self.execute_correlated(id, None, command).await
    }

    /// Like [`execute`](Self::execute), stamping every stored event with
    /// `correlation_id`.
    pub async fn execute_correlated<F>(
        &self,
        id: EntityId,
        correlation_id: Option<Uuid>,
        command: F,
    ) -> Result<CommandResult<A>>
    where
        F: FnOnce(&mut AggregateRoot<A>) -> Result<()>,
    {
        let mut root = match self.load(id).await? {
            Some(root) => root,
            None => AggregateRoot::new(id),
        };
        let previous_version = root.version();

        command(&mut root)?;

        let events = self.save(&mut root, correlation_id).await?;
        let new_version = root.version();

        Ok(CommandResult {
            aggregate: root,
            events,
            previous_version,
            new_version,
        })
    }
}
