//! Integration tests: aggregate repository → event store → dispatcher → projections.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::EntityId;
use domain::{
    Aggregate, AggregateRepository, AggregateRoot, DomainEvent, EventHandlers, EventKind,
    MappingPipeline,
};
use event_store::{EventStore, EventStoreExt, InMemoryEventStore, Position, Version};
use futures_util::TryStreamExt;
use projections::{CursorScope, EventDispatcher, PositionTable, Projection, Projector, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderCreated {
    order_id: EntityId,
    customer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemAdded {
    order_id: EntityId,
    sku: String,
    quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderPlaced {
    order_id: EntityId,
}

macro_rules! impl_event {
    ($($ty:ident),*) => {$(
        impl DomainEvent for $ty {
            fn event_type(&self) -> &'static str {
                stringify!($ty)
            }

            fn to_payload(&self) -> std::result::Result<serde_json::Value, serde_json::Error> {
                serde_json::to_value(self)
            }
        }
    )*};
}

impl_event!(OrderCreated, ItemAdded, OrderPlaced);

#[derive(Debug, Default)]
struct Order {
    items: u32,
    placed: bool,
}

impl Aggregate for Order {
    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn event_handlers() -> EventHandlers<Self> {
        EventHandlers::new("Order")
            .ignore::<OrderCreated>()
            .on(|o: &mut Order, e: &ItemAdded| o.items += e.quantity)
            .on(|o: &mut Order, _: &OrderPlaced| o.placed = true)
    }
}

fn pipeline() -> Arc<MappingPipeline> {
    let mut pipeline = MappingPipeline::new();
    pipeline.register_json::<OrderCreated>("OrderCreated").unwrap();
    pipeline.register_json::<ItemAdded>("ItemAdded").unwrap();
    pipeline.register_json::<OrderPlaced>("OrderPlaced").unwrap();
    Arc::new(pipeline)
}

#[derive(Debug, Clone, Default, PartialEq)]
struct OrderSummary {
    customer: String,
    item_count: u32,
    placed: bool,
}

type Summaries = HashMap<EntityId, OrderSummary>;

/// Read model of every order, following whole Order streams.
struct OrderSummaries {
    orders: RwLock<Summaries>,
    handlers: EventHandlers<Summaries>,
    positions: PositionTable,
}

impl OrderSummaries {
    fn new() -> Self {
        Self {
            orders: RwLock::default(),
            handlers: EventHandlers::new("OrderSummaries")
                .on(|orders: &mut Summaries, e: &OrderCreated| {
                    orders.entry(e.order_id).or_default().customer = e.customer.clone();
                })
                .on(|orders: &mut Summaries, e: &ItemAdded| {
                    orders.entry(e.order_id).or_default().item_count += e.quantity;
                })
                .on(|orders: &mut Summaries, e: &OrderPlaced| {
                    orders.entry(e.order_id).or_default().placed = true;
                }),
            positions: PositionTable::new(),
        }
    }

    async fn get(&self, id: EntityId) -> Option<OrderSummary> {
        self.orders.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl Projection for OrderSummaries {
    fn name(&self) -> &str {
        "OrderSummaries"
    }

    fn handles(&self) -> Vec<EventKind> {
        self.handlers.kinds().to_vec()
    }

    async fn apply(&self, event: &dyn DomainEvent) -> Result<()> {
        let mut orders = self.orders.write().await;
        self.handlers.apply(&mut orders, event)?;
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

/// Counts order creations, one cursor per (order, event type).
struct CreatedCounter {
    count: RwLock<u32>,
    handlers: EventHandlers<u32>,
    positions: PositionTable,
}

impl CreatedCounter {
    fn new() -> Self {
        Self {
            count: RwLock::new(0),
            handlers: EventHandlers::new("CreatedCounter")
                .on(|count: &mut u32, _: &OrderCreated| *count += 1),
            positions: PositionTable::with_scope(CursorScope::EventType),
        }
    }
}

#[async_trait]
impl Projection for CreatedCounter {
    fn name(&self) -> &str {
        "CreatedCounter"
    }

    fn handles(&self) -> Vec<EventKind> {
        self.handlers.kinds().to_vec()
    }

    async fn apply(&self, event: &dyn DomainEvent) -> Result<()> {
        let mut count = self.count.write().await;
        self.handlers.apply(&mut count, event)?;
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

struct Setup {
    repo: AggregateRepository<InMemoryEventStore, Order>,
    dispatcher: EventDispatcher<InMemoryEventStore>,
    summaries: Arc<OrderSummaries>,
    created: Arc<CreatedCounter>,
}

fn setup() -> Setup {
    let store = InMemoryEventStore::new();
    let pipeline = pipeline();
    let repo = AggregateRepository::new(store.clone(), pipeline.clone());

    let summaries = Arc::new(OrderSummaries::new());
    let created = Arc::new(CreatedCounter::new());
    let mut dispatcher = EventDispatcher::new(store, pipeline);
    dispatcher
        .subscribe(Projector::new(summaries.clone()))
        .unwrap();
    dispatcher.subscribe(Projector::new(created.clone())).unwrap();

    Setup {
        repo,
        dispatcher,
        summaries,
        created,
    }
}

#[tokio::test]
async fn created_order_reaches_projection_at_position_zero() {
    let Setup {
        repo,
        dispatcher,
        summaries,
        created,
    } = setup();
    let order_id = EntityId::new();

    let mut order = AggregateRoot::<Order>::new(order_id);
    order
        .raise(OrderCreated {
            order_id,
            customer: "ada".to_string(),
        })
        .unwrap();
    assert_eq!(order.version(), Version::initial());
    repo.save(&mut order, None).await.unwrap();
    assert_eq!(
        repo.store().current_version(order_id).await.unwrap(),
        Version::new(1)
    );

    let stored: Vec<_> = repo
        .store()
        .get_all(order_id, Version::initial())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].position, Position::first());

    let report = dispatcher.dispatch(&stored[0]).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.applied, 2);
    assert_eq!(
        summaries.get_position(order_id, "OrderCreated").await.unwrap(),
        Some(Position::first())
    );
    assert_eq!(summaries.get(order_id).await.unwrap().customer, "ada");
    assert_eq!(*created.count.read().await, 1);
}

#[tokio::test]
async fn interleaved_streams_project_consistently() {
    let Setup {
        repo,
        dispatcher,
        summaries,
        created,
    } = setup();
    let first = EntityId::new();
    let second = EntityId::new();

    for (id, customer) in [(first, "ada"), (second, "grace")] {
        repo.execute(id, |o| {
            o.raise(OrderCreated {
                order_id: id,
                customer: customer.to_string(),
            })
        })
        .await
        .unwrap();
    }
    repo.execute(first, |o| {
        o.raise(ItemAdded {
            order_id: first,
            sku: "SKU-1".to_string(),
            quantity: 2,
        })?;
        o.raise(ItemAdded {
            order_id: first,
            sku: "SKU-2".to_string(),
            quantity: 1,
        })
    })
    .await
    .unwrap();
    repo.execute(second, |o| o.raise(OrderPlaced { order_id: second }))
        .await
        .unwrap();

    let report = dispatcher.run_catch_up().await.unwrap();

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.events, 5);
    assert_eq!(report.applied, 7);
    assert_eq!(
        summaries.get(first).await.unwrap(),
        OrderSummary {
            customer: "ada".to_string(),
            item_count: 3,
            placed: false,
        }
    );
    assert!(summaries.get(second).await.unwrap().placed);
    assert_eq!(*created.count.read().await, 2);

    let again = dispatcher.run_catch_up().await.unwrap();
    assert_eq!(again.applied, 0);
    assert_eq!(again.skipped, 7);
    assert_eq!(summaries.get(first).await.unwrap().item_count, 3);
}

#[tokio::test]
async fn replaying_from_a_later_version_into_a_fresh_projection_is_out_of_order() {
    let Setup { repo, .. } = setup();
    let order_id = EntityId::new();
    repo.execute(order_id, |o| {
        o.raise(OrderCreated {
            order_id,
            customer: "ada".to_string(),
        })?;
        o.raise(ItemAdded {
            order_id,
            sku: "SKU-1".to_string(),
            quantity: 1,
        })
    })
    .await
    .unwrap();

    let fresh = Arc::new(OrderSummaries::new());
    let mut dispatcher = EventDispatcher::new(repo.store().clone(), pipeline());
    dispatcher.subscribe(Projector::new(fresh.clone())).unwrap();

    let report = dispatcher
        .dispatch_stream(order_id, Version::new(1))
        .await
        .unwrap();

    assert_eq!(report.applied, 0);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.is_out_of_order());
    assert!(fresh.get(order_id).await.is_none());

    let report = dispatcher
        .dispatch_stream(order_id, Version::initial())
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(fresh.get(order_id).await.unwrap().item_count, 1);
}

#[tokio::test]
async fn aggregate_and_projection_agree_after_replay() {
    let Setup {
        repo,
        dispatcher,
        summaries,
        ..
    } = setup();
    let order_id = EntityId::new();
    repo.execute(order_id, |o| {
        o.raise(OrderCreated {
            order_id,
            customer: "ada".to_string(),
        })?;
        o.raise(ItemAdded {
            order_id,
            sku: "SKU-1".to_string(),
            quantity: 4,
        })?;
        o.raise(OrderPlaced { order_id })
    })
    .await
    .unwrap();

    dispatcher
        .dispatch_stream(order_id, Version::initial())
        .await
        .unwrap();

    let order = repo.load(order_id).await.unwrap().unwrap();
    let summary = summaries.get(order_id).await.unwrap();
    assert_eq!(order.state().items, summary.item_count);
    assert_eq!(order.state().placed, summary.placed);
    assert_eq!(repo.store().read_stream(order_id).await.unwrap().len(), 3);
}
