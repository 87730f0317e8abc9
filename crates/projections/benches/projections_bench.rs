use std::sync::Arc;

use async_trait::async_trait;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{DomainEvent, EventHandlers, EventKind, MappingPipeline};
use event_store::{EntityId, EventStore, InMemoryEventStore, PendingEvent, Position, Version};
use projections::{EventDispatcher, PositionTable, Projection, Projector, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Serialize, Deserialize)]
struct Ticked {
    n: u64,
}

impl DomainEvent for Ticked {
    fn event_type(&self) -> &'static str {
        "Ticked"
    }

    fn to_payload(&self) -> std::result::Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

struct TickCount {
    total: RwLock<u64>,
    handlers: EventHandlers<u64>,
    positions: PositionTable,
}

impl TickCount {
    fn new() -> Self {
        Self {
            total: RwLock::new(0),
            handlers: EventHandlers::new("TickCount").on(|total: &mut u64, e: &Ticked| *total += e.n),
            positions: PositionTable::new(),
        }
    }
}

#[async_trait]
impl Projection for TickCount {
    fn name(&self) -> &str {
        "TickCount"
    }

    fn handles(&self) -> Vec<EventKind> {
        self.handlers.kinds().to_vec()
    }

    async fn apply(&self, event: &dyn DomainEvent) -> Result<()> {
        let mut total = self.total.write().await;
        self.handlers.apply(&mut total, event)?;
        Ok(())
    }

    async fn get_position(&self, entity_id: EntityId, event_type: &str) -> Result<Option<Position>> {
        Ok(self.positions.get(entity_id, event_type).await)
    }

    async fn update_position(
        &self,
        entity_id: EntityId,
        event_type: &str,
        position: Position,
    ) -> Result<()> {
        self.positions.set(entity_id, event_type, position).await;
        Ok(())
    }
}

fn pipeline() -> Arc<MappingPipeline> {
    let mut pipeline = MappingPipeline::new();
    pipeline.register_json::<Ticked>("Ticked").unwrap();
    Arc::new(pipeline)
}

/// Populate a store with `streams` streams of 3 events each.
async fn populate_store(store: &InMemoryEventStore, streams: usize) {
    for _ in 0..streams {
        let events = (0..3)
            .map(|n| PendingEvent::from_serializable("Clock", "Ticked", &Ticked { n }).unwrap())
            .collect();
        store
            .append(EntityId::new(), Version::initial(), events)
            .await
            .unwrap();
    }
}

fn dispatcher(store: InMemoryEventStore) -> EventDispatcher<InMemoryEventStore> {
    let mut dispatcher = EventDispatcher::new(store, pipeline());
    dispatcher
        .subscribe(Projector::new(Arc::new(TickCount::new())))
        .unwrap();
    dispatcher
}

fn bench_catch_up_300_events(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, 100));

    c.bench_function("projections/catch_up_300_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                dispatcher(store.clone()).run_catch_up().await.unwrap();
            });
        });
    });
}

fn bench_catch_up_3000_events(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, 1000));

    let mut group = c.benchmark_group("projections");
    group.sample_size(10);
    group.bench_function("catch_up_3000_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                dispatcher(store.clone()).run_catch_up().await.unwrap();
            });
        });
    });
    group.finish();
}

fn bench_skip_already_applied(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, 100));
    let warm = dispatcher(store);
    rt.block_on(warm.run_catch_up()).unwrap();

    c.bench_function("projections/skip_300_applied_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                warm.run_catch_up().await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_catch_up_300_events,
    bench_catch_up_3000_events,
    bench_skip_already_applied
);
criterion_main!(benches);
