//! Service bus configuration errors.

use thiserror::Error;

/// Fatal service bus errors.
///
/// These report a miswired bus, not a refused request; refusals are
/// returned as [`Rejection`](crate::Rejection)s.
#[derive(Debug, Error)]
pub enum ServiceBusError {
    /// A handler is already registered for the request type.
    #[error("A handler has already been registered for `{0}`")]
    HandlerAlreadyRegistered(String),

    /// The handler does not declare the request type it handles.
    #[error("`{0}` cannot be registered to ServiceBus")]
    UnsupportedHandler(String),

    /// No handler is registered for the request type.
    #[error("Request `{0}` has no handler registered in the ServiceBus")]
    NoHandlerRegistered(String),

    /// The handler answered with a value of an unexpected type.
    #[error("Handler `{handler}` returned a response that is not a `{expected}`")]
    ResponseTypeMismatch {
        handler: String,
        expected: &'static str,
    },
}

/// Result type for service bus operations.
pub type Result<T> = std::result::Result<T, ServiceBusError>;
