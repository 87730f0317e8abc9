//! Response shapes returned across the request boundary.

use common::EntityId;
use domain::DomainError;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::validation::ValidationResult;

/// Lifecycle of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Received,
    Processing,
    Completed,
    Failed,
}

/// Confirmation that a command was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub status: CommandStatus,
    /// What was done, e.g. `"PlaceOrder"`.
    pub action: String,
    pub entity_id: EntityId,
    /// Version of the entity after the command.
    pub version: Version,
}

impl Acknowledgement {
    /// Acknowledges a command that completed.
    pub fn completed(action: impl Into<String>, entity_id: EntityId, version: Version) -> Self {
        Self {
            status: CommandStatus::Completed,
            action: action.into(),
            entity_id,
            version,
        }
    }
}

/// A user-facing error value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    /// Human readable description.
    pub message: String,
    /// Machine readable identifier, e.g. `"Order.NotFound"`.
    pub code: String,
    /// Why the error happened, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Where the error was raised.
    pub domain: String,
}

impl Error {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            reason: None,
            domain: domain.into(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns true if the error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        self.code.contains(NOT_FOUND_CODE)
    }
}

impl From<&DomainError> for Error {
    fn from(error: &DomainError) -> Self {
        Error::new(error.code(), error.to_string(), error.domain())
    }
}

const NOT_FOUND_CODE: &str = "NotFound";

/// Refusal of a request, carrying an HTTP-like status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub status_code: u16,
    pub errors: Vec<Error>,
}

impl Rejection {
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const UNPROCESSABLE: u16 = 422;

    /// Rejects with every error of a failed validation, in order.
    pub fn from_validation(result: ValidationResult) -> Self {
        Self {
            status_code: Self::BAD_REQUEST,
            errors: result.into_errors(),
        }
    }

    /// Rejects with an error value returned by a handler.
    ///
    /// Missing resources map to 404, any other failure to 422.
    pub fn from_error(error: Error) -> Self {
        let status_code = if error.is_not_found() {
            Self::NOT_FOUND
        } else {
            Self::UNPROCESSABLE
        };
        Self {
            status_code,
            errors: vec![error],
        }
    }

    /// Rejects with a domain failure raised while handling.
    pub fn from_domain_error(error: &DomainError) -> Self {
        Self {
            status_code: Self::UNPROCESSABLE,
            errors: vec![Error::from(error)],
        }
    }
}

/// One page of read models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadModelList<T> {
    pub offset: usize,
    pub limit: usize,
    /// Number of items across all pages.
    pub total: usize,
    pub items: Vec<T>,
}

impl<T> ReadModelList<T> {
    /// Cuts the page `[offset, offset + limit)` out of `items`.
    pub fn paginate(items: impl IntoIterator<Item = T>, offset: usize, limit: usize) -> Self {
        let all: Vec<T> = items.into_iter().collect();
        let total = all.len();
        let items = all.into_iter().skip(offset).take(limit).collect();
        Self {
            offset,
            limit,
            total,
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
