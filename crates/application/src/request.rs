//! Requests routed by the service bus.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

use crate::response::Acknowledgement;

/// A message sent through the [`ServiceBus`](crate::ServiceBus).
///
/// Each request type declares the response its handler produces; the bus
/// routes on the concrete request type.
pub trait Request: Send + Sync + 'static {
    /// What a successful handler returns for this request.
    type Response: Send + 'static;
}

/// A request that changes state and is acknowledged.
pub trait Command: Request<Response = Acknowledgement> {}

/// A request that reads state without changing it.
pub trait Query: Request {}

/// Identity of a concrete request type.
///
/// Equality and hashing use the type id only; the name is kept for logs
/// and error messages.
#[derive(Clone, Copy)]
pub struct RequestKind {
    type_id: TypeId,
    name: &'static str,
}

impl RequestKind {
    /// Returns the kind of request type `R`.
    pub fn of<R: Request>() -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            name: std::any::type_name::<R>(),
        }
    }

    /// Type name without its module path.
    pub fn name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for RequestKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for RequestKind {}

impl Hash for RequestKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ambient data travelling with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    /// Unique id of this request.
    pub request_id: Uuid,
    /// Id shared by every request and event of one business flow.
    pub correlation_id: Option<Uuid>,
}

impl RequestContext {
    /// Creates a context with a fresh request id and no correlation.
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            correlation_id: None,
        }
    }

    /// Creates a context correlated with `correlation_id`.
    pub fn correlated(correlation_id: Uuid) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            ..Self::new()
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
