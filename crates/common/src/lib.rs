//! Shared identity types and process telemetry for the event-sourcing toolkit.

pub mod telemetry;
pub mod types;

pub use telemetry::{Config, LogFormat, init_tracing};
pub use types::{Entity, EntityId, ValueObject};
