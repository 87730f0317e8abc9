use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream;
use tokio::sync::RwLock;

use crate::{
    EntityId, EventStoreError, PendingEvent, RawEvent, Result, StreamState, Version,
    store::{EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Log {
    /// Every event in insertion order.
    events: Vec<RawEvent>,
    /// Per stream, the indexes into `events` in position order.
    streams: HashMap<EntityId, Vec<usize>>,
    /// Stream states in creation order.
    states: Vec<StreamState>,
    state_index: HashMap<EntityId, usize>,
}

impl Log {
    fn version_of(&self, stream_id: &EntityId) -> Version {
        self.streams
            .get(stream_id)
            .map(|indexes| Version::initial().advance(indexes.len()))
            .unwrap_or_default()
    }

    fn record_state(
        &mut self,
        stream_id: EntityId,
        stream_type: &str,
        slug: Option<String>,
        version: Version,
    ) {
        match self.state_index.get(&stream_id) {
            Some(&i) => {
                let state = &mut self.states[i];
                state.version = version;
                if slug.is_some() {
                    state.slug = slug;
                }
            }
            None => {
                self.state_index.insert(stream_id, self.states.len());
                self.states.push(StreamState {
                    stream_id,
                    stream_type: stream_type.to_string(),
                    slug,
                    version,
                });
            }
        }
    }

    fn states_where(&self, matches: impl Fn(&StreamState) -> bool) -> Vec<StreamState> {
        self.states.iter().filter(|s| matches(s)).cloned().collect()
    }

    fn stream_event(&self, stream_id: &EntityId, offset: usize) -> Option<RawEvent> {
        let index = *self.streams.get(stream_id)?.get(offset)?;
        self.events.get(index).cloned()
    }
}

/// In-memory event store implementation.
///
/// Appends are serialized by a single write lock, so of several concurrent
/// appends at the same expected version exactly one succeeds. Replays read
/// one event per poll instead of cloning the whole stream up front.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        let mut log = self.log.write().await;
        log.events.clear();
        log.streams.clear();
        log.states.clear();
        log.state_index.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn append(
        &self,
        stream_id: EntityId,
        expected_version: Version,
        events: Vec<PendingEvent>,
    ) -> Result<Version> {
        validate_events_for_append(stream_id, &events)?;

        let mut log = self.log.write().await;

        let current_version = log.version_of(&stream_id);
        if current_version != expected_version {
            metrics::counter!("event_store_concurrency_conflicts").increment(1);
            tracing::debug!(%current_version, %expected_version, "append rejected");
            return Err(EventStoreError::ConcurrencyConflict {
                stream_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        let created_at = Utc::now();
        let mut position = expected_version.next_position();
        let count = events.len();
        let stream_type = events[0].stream_type.clone();
        let slug = events.iter().rev().find_map(|e| e.stream_slug.clone());

        for event in events {
            let index = log.events.len();
            log.events.push(event.into_raw(stream_id, position, created_at));
            log.streams.entry(stream_id).or_default().push(index);
            position = position.next();
        }

        let new_version = expected_version.advance(count);
        log.record_state(stream_id, &stream_type, slug, new_version);

        metrics::counter!("event_store_events_appended").increment(count as u64);

        Ok(new_version)
    }

    async fn get_all(&self, stream_id: EntityId, from_version: Version) -> Result<EventStream> {
        let end = self.log.read().await.version_of(&stream_id).as_u64() as usize;
        let start = from_version.as_u64() as usize;
        let log = Arc::clone(&self.log);

        let events = stream::unfold(start, move |offset| {
            let log = Arc::clone(&log);
            async move {
                if offset >= end {
                    return None;
                }
                let event = log.read().await.stream_event(&stream_id, offset)?;
                Some((Ok(event), offset + 1))
            }
        });

        Ok(Box::pin(events))
    }

    async fn current_version(&self, stream_id: EntityId) -> Result<Version> {
        Ok(self.log.read().await.version_of(&stream_id))
    }

    async fn get_last(
        &self,
        stream_id: EntityId,
        event_types: &[&str],
    ) -> Result<Option<RawEvent>> {
        let log = self.log.read().await;
        let last = log.streams.get(&stream_id).and_then(|indexes| {
            indexes
                .iter()
                .rev()
                .map(|&i| &log.events[i])
                .find(|e| event_types.contains(&e.event_type.as_str()))
                .cloned()
        });
        Ok(last)
    }

    async fn stream_all(&self) -> Result<EventStream> {
        let end = self.log.read().await.events.len();
        let log = Arc::clone(&self.log);

        let events = stream::unfold(0usize, move |index| {
            let log = Arc::clone(&log);
            async move {
                if index >= end {
                    return None;
                }
                let event = log.read().await.events.get(index).cloned()?;
                Some((Ok(event), index + 1))
            }
        });

        Ok(Box::pin(events))
    }

    async fn get_stream(&self, stream_id: EntityId) -> Result<Option<StreamState>> {
        let log = self.log.read().await;
        Ok(log
            .state_index
            .get(&stream_id)
            .map(|&i| log.states[i].clone()))
    }

    async fn get_streams_by_slug(
        &self,
        slug: &str,
        stream_type: &str,
    ) -> Result<Vec<StreamState>> {
        let log = self.log.read().await;
        Ok(log.states_where(|s| s.stream_type == stream_type && s.slug.as_deref() == Some(slug)))
    }

    async fn get_streams_by_type(&self, stream_type: &str) -> Result<Vec<StreamState>> {
        let log = self.log.read().await;
        Ok(log.states_where(|s| s.stream_type == stream_type))
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::{Position, store::EventStoreExt};

    fn create_test_event(event_type: &str) -> PendingEvent {
        PendingEvent::new("TestStream", event_type, serde_json::json!({"test": true}))
    }

    #[tokio::test]
    async fn append_single_event() {
        let store = InMemoryEventStore::new();
        let stream_id = EntityId::new();

        let version = store
            .append(stream_id, Version::initial(), vec![create_test_event("Event1")])
            .await
            .unwrap();
        assert_eq!(version, Version::new(1));

        let events = store.read_stream(stream_id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].position, Position::first());
    }

    #[tokio::test]
    async fn append_assigns_positions_from_expected_version() {
        let store = InMemoryEventStore::new();
        let stream_id = EntityId::new();

        store
            .append(
                stream_id,
                Version::initial(),
                vec![create_test_event("Event1"), create_test_event("Event2")],
            )
            .await
            .unwrap();
        let version = store
            .append(stream_id, Version::new(2), vec![create_test_event("Event3")])
            .await
            .unwrap();
        assert_eq!(version, Version::new(3));

        let positions: Vec<u64> = store
            .read_stream(stream_id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.position.as_u64())
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn concurrency_conflict_on_wrong_version() {
        let store = InMemoryEventStore::new();
        let stream_id = EntityId::new();

        store
            .append(stream_id, Version::initial(), vec![create_test_event("Event1")])
            .await
            .unwrap();

        let result = store
            .append(stream_id, Version::initial(), vec![create_test_event("Event2")])
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { expected, actual, .. })
                if expected == Version::initial() && actual == Version::new(1)
        ));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn empty_append_is_rejected() {
        let store = InMemoryEventStore::new();
        let result = store
            .append(EntityId::new(), Version::initial(), vec![])
            .await;
        assert!(matches!(result, Err(EventStoreError::EmptyAppend(_))));
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_partial_writes() {
        let store = InMemoryEventStore::new();
        let stream_id = EntityId::new();

        let batch = vec![
            create_test_event("Event1"),
            PendingEvent::new("OtherStream", "Event2", serde_json::json!({})),
        ];
        assert!(store.append(stream_id, Version::initial(), batch).await.is_err());
        assert_eq!(store.current_version(stream_id).await.unwrap(), Version::initial());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn get_all_from_version() {
        let store = InMemoryEventStore::new();
        let stream_id = EntityId::new();

        let events = vec![
            create_test_event("Event1"),
            create_test_event("Event2"),
            create_test_event("Event3"),
        ];
        store
            .append(stream_id, Version::initial(), events)
            .await
            .unwrap();

        let from_v2: Vec<_> = store
            .get_all(stream_id, Version::new(1))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(from_v2.len(), 2);
        assert_eq!(from_v2[0].as_ref().unwrap().event_type, "Event2");
        assert_eq!(from_v2[1].as_ref().unwrap().position, Position::new(2));
    }

    #[tokio::test]
    async fn get_all_is_restartable_and_bounded() {
        let store = InMemoryEventStore::new();
        let stream_id = EntityId::new();
        store
            .append(stream_id, Version::initial(), vec![create_test_event("Event1")])
            .await
            .unwrap();

        let stream = store.get_all(stream_id, Version::initial()).await.unwrap();

        // Appended after the replay started: not part of it.
        store
            .append(stream_id, Version::new(1), vec![create_test_event("Event2")])
            .await
            .unwrap();

        let first: Vec<_> = stream.collect().await;
        assert_eq!(first.len(), 1);

        let second: Vec<_> = store
            .get_all(stream_id, Version::initial())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn get_all_on_unknown_stream_is_empty() {
        let store = InMemoryEventStore::new();
        let events: Vec<_> = store
            .get_all(EntityId::new(), Version::initial())
            .await
            .unwrap()
            .collect()
            .await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn get_last_finds_latest_of_types() {
        let store = InMemoryEventStore::new();
        let stream_id = EntityId::new();
        store
            .append(
                stream_id,
                Version::initial(),
                vec![
                    create_test_event("Created"),
                    create_test_event("Renamed"),
                    create_test_event("Renamed"),
                    create_test_event("Archived"),
                ],
            )
            .await
            .unwrap();

        let last = store
            .get_last(stream_id, &["Renamed", "Created"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.event_type, "Renamed");
        assert_eq!(last.position, Position::new(2));

        assert!(store.get_last(stream_id, &["Deleted"]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stream_all_events_in_insertion_order() {
        let store = InMemoryEventStore::new();
        let id1 = EntityId::new();
        let id2 = EntityId::new();

        store
            .append(id1, Version::initial(), vec![create_test_event("Event1")])
            .await
            .unwrap();
        store
            .append(id2, Version::initial(), vec![create_test_event("Event2")])
            .await
            .unwrap();

        let events: Vec<_> = store.stream_all().await.unwrap().collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().stream_id, id1);
        assert_eq!(events[1].as_ref().unwrap().stream_id, id2);
    }

    #[tokio::test]
    async fn current_version_and_exists() {
        let store = InMemoryEventStore::new();
        let stream_id = EntityId::new();

        assert_eq!(store.current_version(stream_id).await.unwrap(), Version::initial());
        assert!(!store.stream_exists(stream_id).await.unwrap());

        store
            .append(
                stream_id,
                Version::initial(),
                vec![create_test_event("Event1"), create_test_event("Event2")],
            )
            .await
            .unwrap();

        assert_eq!(store.current_version(stream_id).await.unwrap(), Version::new(2));
        assert!(store.stream_exists(stream_id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_at_same_version_have_one_winner() {
        let store = InMemoryEventStore::new();
        let stream_id = EntityId::new();

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .append(
                        stream_id,
                        Version::initial(),
                        vec![create_test_event("A1"), create_test_event("A2")],
                    )
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .append(stream_id, Version::initial(), vec![create_test_event("B1")])
                    .await
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_ok() != b.is_ok(), "exactly one append must win");

        let loser = if a.is_ok() { &b } else { &a };
        assert!(matches!(
            loser,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));

        let winner_version = a.as_ref().or(b.as_ref()).unwrap();
        assert_eq!(
            store.current_version(stream_id).await.unwrap(),
            *winner_version
        );
        let types: Vec<String> = store
            .read_stream(stream_id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert!(types == ["A1", "A2"] || types == ["B1"]);
    }

    #[tokio::test]
    async fn stream_state_tracks_type_slug_and_version() {
        let store = InMemoryEventStore::new();
        let stream_id = EntityId::new();
        assert!(store.get_stream(stream_id).await.unwrap().is_none());

        store
            .append(
                stream_id,
                Version::initial(),
                vec![create_test_event("Registered").stream_slug("john-doe")],
            )
            .await
            .unwrap();
        store
            .append(stream_id, Version::new(1), vec![create_test_event("Renamed")])
            .await
            .unwrap();

        let state = store.get_stream(stream_id).await.unwrap().unwrap();
        assert_eq!(state.stream_type, "TestStream");
        assert_eq!(state.slug.as_deref(), Some("john-doe"));
        assert_eq!(state.version, Version::new(2));

        store
            .append(
                stream_id,
                Version::new(2),
                vec![create_test_event("Renamed").stream_slug("john-smith")],
            )
            .await
            .unwrap();
        let state = store.get_stream(stream_id).await.unwrap().unwrap();
        assert_eq!(state.slug.as_deref(), Some("john-smith"));
    }

    #[tokio::test]
    async fn streams_are_found_by_slug_and_type() {
        let store = InMemoryEventStore::new();
        let first = EntityId::new();
        let second = EntityId::new();
        let other_type = EntityId::new();

        for (id, slug) in [(first, "ada"), (second, "grace")] {
            store
                .append(
                    id,
                    Version::initial(),
                    vec![create_test_event("Registered").stream_slug(slug)],
                )
                .await
                .unwrap();
        }
        store
            .append(
                other_type,
                Version::initial(),
                vec![PendingEvent::new("Team", "Formed", serde_json::json!({})).stream_slug("ada")],
            )
            .await
            .unwrap();

        let by_slug = store.get_streams_by_slug("ada", "TestStream").await.unwrap();
        assert_eq!(by_slug.len(), 1);
        assert_eq!(by_slug[0].stream_id, first);

        let ids: Vec<_> = store
            .get_streams_by_type("TestStream")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.stream_id)
            .collect();
        assert_eq!(ids, [first, second]);
        assert!(store.get_streams_by_type("Unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_append_leaves_stream_state_untouched() {
        let store = InMemoryEventStore::new();
        let stream_id = EntityId::new();
        store
            .append(stream_id, Version::initial(), vec![create_test_event("A")])
            .await
            .unwrap();

        let result = store
            .append(
                stream_id,
                Version::initial(),
                vec![create_test_event("B").stream_slug("late")],
            )
            .await;

        assert!(result.is_err());
        let state = store.get_stream(stream_id).await.unwrap().unwrap();
        assert_eq!(state.version, Version::new(1));
        assert!(state.slug.is_none());
    }
}
