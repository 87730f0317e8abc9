//! Read-model projections for the CQRS query side.
//!
//! This crate delivers stored events to read models:
//! - [`Projection`] trait for applying domain events to a read model and owning its cursors
//! - [`PositionTable`] for in-memory cursors
//! - [`Projector`] enforcing ordered, idempotent application per cursor
//! - [`EventDispatcher`] mapping raw events and fanning them out to projectors

pub mod dispatcher;
pub mod error;
pub mod positions;
pub mod projection;
pub mod projector;

pub use dispatcher::{DispatchFailure, DispatchReport, EventDispatcher};
pub use error::{ProjectionError, Result};
pub use positions::{CursorScope, PositionTable};
pub use projection::Projection;
pub use projector::{Projector, ProjectorOutcome};
