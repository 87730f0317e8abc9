//! Feeding stored events to projectors.

use std::sync::Arc;

use common::EntityId;
use domain::MappingPipeline;
use event_store::{EventStore, EventStream, Position, RawEvent, Version};
use futures_util::StreamExt;

use crate::error::{ProjectionError, Result};
use crate::projector::{Projector, ProjectorOutcome};

/// A delivery that failed while dispatching.
#[derive(Debug)]
pub struct DispatchFailure {
    pub stream_id: EntityId,
    pub position: Position,
    pub event_type: String,
    /// The failing projection, or `None` when the event could not be mapped.
    pub projection: Option<String>,
    pub error: ProjectionError,
}

/// Tally of a dispatch run.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Raw events read.
    pub events: usize,
    /// Deliveries that were applied.
    pub applied: usize,
    /// Deliveries skipped as already applied.
    pub skipped: usize,
    /// Mapping and projector failures, in the order they happened.
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(&mut self, other: DispatchReport) {
        self.events += other.events;
        self.applied += other.applied;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }
}

/// Reads raw events, maps them and fans them out to subscribed projectors.
///
/// The dispatcher supports:
/// - Single event delivery: [`dispatch`](Self::dispatch)
/// - Stream replay: [`dispatch_stream`](Self::dispatch_stream)
/// - Catch-up: [`run_catch_up`](Self::run_catch_up) replays every stored event
///
/// Events of one stream are delivered in position order. A failing projector
/// does not keep the others from receiving the same event, and an event that
/// cannot be mapped does not stop the events after it.
pub struct EventDispatcher<S: EventStore> {
    store: S,
    pipeline: Arc<MappingPipeline>,
    projectors: Vec<Arc<Projector>>,
}

impl<S: EventStore> EventDispatcher<S> {
    /// Creates a dispatcher reading from `store` and mapping through `pipeline`.
    pub fn new(store: S, pipeline: Arc<MappingPipeline>) -> Self {
        Self {
            store,
            pipeline,
            projectors: Vec::new(),
        }
    }

    /// Subscribes a projector to the event types its projection declares.
    ///
    /// Fails with `UnprocessableListener` if it declares none.
    pub fn subscribe(&mut self, projector: Projector) -> Result<()> {
        if projector.handles().is_empty() {
            return Err(ProjectionError::UnprocessableListener(
                projector.name().to_string(),
            ));
        }

        tracing::debug!(
            projection = projector.name(),
            events = projector.handles().len(),
            "Projector subscribed"
        );
        self.projectors.push(Arc::new(projector));
        Ok(())
    }

    /// Returns the number of subscribed projectors.
    pub fn projector_count(&self) -> usize {
        self.projectors.len()
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Maps `raw` and delivers it to every projector handling its type.
    ///
    /// Fails only when the event cannot be mapped; projector failures are
    /// collected in the report.
    #[tracing::instrument(
        skip(self, raw),
        fields(stream_id = %raw.stream_id, position = %raw.position, event_type = %raw.event_type)
    )]
    pub async fn dispatch(&self, raw: &RawEvent) -> Result<DispatchReport> {
        let event = self.pipeline.map(raw).inspect_err(|error| {
            tracing::error!(error = %error, "Event could not be mapped");
            metrics::counter!("dispatcher_mapping_failures").increment(1);
        })?;
        let kind = event.kind();

        let mut report = DispatchReport {
            events: 1,
            ..Default::default()
        };

        for projector in self.projectors.iter().filter(|p| p.accepts(&kind)) {
            match projector
                .process(event.as_ref(), raw.position, raw.stream_id)
                .await
            {
                Ok(ProjectorOutcome::Applied) => report.applied += 1,
                Ok(ProjectorOutcome::Skipped) => report.skipped += 1,
                Err(error) => {
                    tracing::warn!(
                        projection = projector.name(),
                        error = %error,
                        "Projector failed"
                    );
                    report.failures.push(DispatchFailure {
                        stream_id: raw.stream_id,
                        position: raw.position,
                        event_type: raw.event_type.clone(),
                        projection: Some(projector.name().to_string()),
                        error,
                    });
                }
            }
        }

        metrics::counter!("dispatcher_events_dispatched").increment(1);
        Ok(report)
    }

    /// Dispatches the events of one stream starting at `from`.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch_stream(&self, stream_id: EntityId, from: Version) -> Result<DispatchReport> {
        let events = self.store.get_all(stream_id, from).await?;
        self.dispatch_all(events).await
    }

    /// Dispatches every stored event in insertion order.
    ///
    /// Projectors skip what they already applied, so running catch-up again
    /// is harmless.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<DispatchReport> {
        let events = self.store.stream_all().await?;
        let report = self.dispatch_all(events).await?;

        tracing::info!(
            events = report.events,
            applied = report.applied,
            skipped = report.skipped,
            failures = report.failures.len(),
            "Catch-up complete"
        );
        Ok(report)
    }

    async fn dispatch_all(&self, mut events: EventStream) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();

        while let Some(raw) = events.next().await {
            let raw = raw?;
            match self.dispatch(&raw).await {
                Ok(delivered) => report.merge(delivered),
                Err(error) => {
                    report.events += 1;
                    report.failures.push(DispatchFailure {
                        stream_id: raw.stream_id,
                        position: raw.position,
                        event_type: raw.event_type.clone(),
                        projection: None,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }
}
