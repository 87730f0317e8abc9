//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

/// Boxed error carried by failures of externally supplied code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No apply handler is registered for the event's concrete type.
    #[error("Event({event_type}) cannot be applied to '{target}'")]
    UnknownEvent { target: String, event_type: String },

    /// A business rule was violated.
    #[error("{message}")]
    Rule { domain: String, message: String },

    /// No mapper is registered for a raw event type.
    #[error("No event mapper was found for event {0}")]
    MapperNotFound(String),

    /// The raw payload could not be turned into a domain event.
    #[error("Event {event_type} could not be mapped: {source}")]
    MappingError { event_type: String, source: BoxError },

    /// A mapper was registered twice for the same raw event type.
    #[error("An event mapper has already been registered for {0}")]
    MapperAlreadyRegistered(String),

    /// The subscriber does not declare the event type it handles.
    #[error("`{0}` cannot be subscribed because it does not declare an event type")]
    UnsupportedEventHandler(String),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Creates a business-rule violation raised by `domain`.
    pub fn rule(domain: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Rule {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Name of the object the error was raised on.
    pub fn domain(&self) -> &str {
        match self {
            DomainError::UnknownEvent { target, .. } => target,
            DomainError::Rule { domain, .. } => domain,
            DomainError::MapperNotFound(_)
            | DomainError::MappingError { .. }
            | DomainError::MapperAlreadyRegistered(_) => "MappingPipeline",
            DomainError::UnsupportedEventHandler(_) => "EventBroker",
            DomainError::EventStore(_) => "EventStore",
            DomainError::Serialization(_) => "Serialization",
        }
    }

    /// Stable machine-readable identifier of the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::UnknownEvent { .. } => "Domain.UnknownEvent",
            DomainError::Rule { .. } => "Domain.RuleViolation",
            DomainError::MapperNotFound(_) => "Domain.MapperNotFound",
            DomainError::MappingError { .. } => "Domain.MappingError",
            DomainError::MapperAlreadyRegistered(_) => "Domain.MapperAlreadyRegistered",
            DomainError::UnsupportedEventHandler(_) => "Domain.UnsupportedEventHandler",
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => {
                "Domain.ConcurrencyConflict"
            }
            DomainError::EventStore(_) => "Domain.EventStore",
            DomainError::Serialization(_) => "Domain.Serialization",
        }
    }

    /// Returns true for optimistic-concurrency failures the caller may retry.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. })
        )
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
