//! Input validation run before a request reaches its handler.

use std::any::Any;

use crate::request::Request;
use crate::response::Error;

/// Outcome of validating a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<Error>,
}

impl ValidationResult {
    /// A result with no errors.
    pub fn success() -> Self {
        Self::default()
    }

    pub fn with_errors(errors: Vec<Error>) -> Self {
        Self { errors }
    }

    /// Records one more error.
    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// Appends the errors of `other` after this result's own.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

/// Checks a request before it is handled.
///
/// Any number of validators may be registered for one request type; they
/// all run, in registration order, and their errors are collected.
pub trait Validator: Send + Sync + 'static {
    /// The request type this validator checks.
    type Request: Request;

    fn validate(&self, request: &Self::Request) -> ValidationResult;
}

pub(crate) trait RequestValidator: Send + Sync {
    fn validate(&self, request: &(dyn Any + Send + Sync)) -> ValidationResult;
}

pub(crate) struct TypedValidator<V> {
    validator: V,
}

impl<V> TypedValidator<V> {
    pub(crate) fn new(validator: V) -> Self {
        Self { validator }
    }
}

impl<V: Validator> RequestValidator for TypedValidator<V> {
    fn validate(&self, request: &(dyn Any + Send + Sync)) -> ValidationResult {
        // Validators are keyed by request type; nothing else is routed here.
        match request.downcast_ref::<V::Request>() {
            Some(request) => self.validator.validate(request),
            None => ValidationResult::success(),
        }
    }
}
