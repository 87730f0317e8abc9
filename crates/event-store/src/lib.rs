//! Append-only, per-stream event log.
//!
//! - [`EventStore`] is the storage contract: optimistic-concurrency `append`
//!   and a lazy, restartable `get_all` replay stream, plus per-stream
//!   [`StreamState`] lookups by id, slug and type.
//! - [`InMemoryEventStore`] implements it for tests and single-process hosts.

pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use common::EntityId;
pub use error::{EventStoreError, Result};
pub use event::{EventId, PendingEvent, Position, RawEvent, StreamState, Version};
pub use memory::InMemoryEventStore;
pub use store::{EventStore, EventStoreExt, EventStream};
