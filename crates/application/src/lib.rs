//! Application layer of the event-sourcing toolkit.
//!
//! Commands and queries enter through the [`ServiceBus`], which runs the
//! registered [`Validator`]s for the request type and then hands the request
//! to its single [`Handler`]. Refusals come back as a [`Rejection`] with an
//! HTTP-like status code; a miswired bus fails with a [`ServiceBusError`].

pub mod bus;
pub mod error;
pub mod handler;
pub mod request;
pub mod response;
pub mod validation;

pub use bus::{Outcome, ServiceBus};
pub use error::{Result, ServiceBusError};
pub use handler::{Handler, HandlerError, RequestHandler};
pub use request::{Command, Query, Request, RequestContext, RequestKind};
pub use response::{Acknowledgement, CommandStatus, Error, ReadModelList, Rejection};
pub use validation::{ValidationResult, Validator};
