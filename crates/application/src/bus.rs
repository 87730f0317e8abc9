//! Routing of requests to their handler.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, ServiceBusError};
use crate::handler::{Handler, HandlerError, RequestHandler, TypedHandler};
use crate::request::{Request, RequestContext, RequestKind};
use crate::response::Rejection;
use crate::validation::{RequestValidator, TypedValidator, ValidationResult, Validator};

/// What the bus returned for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The handler produced a response.
    Completed(T),
    /// Validation or the handler refused the request.
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Rejected(rejection) => Some(rejection),
            Outcome::Completed(_) => None,
        }
    }

    pub fn into_result(self) -> std::result::Result<T, Rejection> {
        match self {
            Outcome::Completed(response) => Ok(response),
            Outcome::Rejected(rejection) => Err(rejection),
        }
    }
}

/// Routes commands and queries to exactly one handler each.
///
/// Before a request reaches its handler, every validator registered for
/// its type runs in registration order. Any validation error rejects the
/// request with status 400 and the handler is not invoked. Errors
/// returned by the handler become rejections: 404 for codes containing
/// `NotFound`, 422 for anything else, including domain failures.
///
/// Sending a request whose type has no handler is a configuration error
/// and fails with [`ServiceBusError::NoHandlerRegistered`].
#[derive(Default)]
pub struct ServiceBus {
    handlers: HashMap<RequestKind, Arc<dyn RequestHandler>>,
    validators: HashMap<RequestKind, Vec<Arc<dyn RequestValidator>>>,
}

impl ServiceBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `H::Request`.
    pub fn register<H: Handler>(&mut self, handler: H) -> Result<()> {
        self.register_handler(Arc::new(TypedHandler::new(handler)))
    }

    /// Registers a type-erased handler under the request type it declares.
    pub fn register_handler(&mut self, handler: Arc<dyn RequestHandler>) -> Result<()> {
        let Some(kind) = handler.handled_request() else {
            tracing::error!(
                handler = handler.name(),
                "Handler does not declare a request type"
            );
            return Err(ServiceBusError::UnsupportedHandler(
                handler.name().to_string(),
            ));
        };

        if self.handlers.contains_key(&kind) {
            tracing::error!(request_type = %kind, "A handler was already registered");
            return Err(ServiceBusError::HandlerAlreadyRegistered(
                kind.name().to_string(),
            ));
        }

        tracing::debug!(handler = handler.name(), request_type = %kind, "Handler registered");
        self.handlers.insert(kind, handler);
        Ok(())
    }

    /// Adds a validator for `V::Request`, after those already registered.
    pub fn register_validator<V: Validator>(&mut self, validator: V) {
        let kind = RequestKind::of::<V::Request>();
        tracing::debug!(request_type = %kind, "Validator registered");
        self.validators
            .entry(kind)
            .or_default()
            .push(Arc::new(TypedValidator::new(validator)));
    }

    pub fn has_handler<R: Request>(&self) -> bool {
        self.handlers.contains_key(&RequestKind::of::<R>())
    }

    pub fn validator_count<R: Request>(&self) -> usize {
        self.validators
            .get(&RequestKind::of::<R>())
            .map_or(0, Vec::len)
    }

    /// Validates `request` and hands it to its handler.
    #[tracing::instrument(
        skip(self, request, ctx),
        fields(request_type = std::any::type_name::<R>(), request_id = %ctx.request_id)
    )]
    pub async fn send<R: Request>(
        &self,
        request: R,
        ctx: &RequestContext,
    ) -> Result<Outcome<R::Response>> {
        metrics::counter!("service_bus_requests").increment(1);
        tracing::info!("Request received");

        let kind = RequestKind::of::<R>();
        let Some(handler) = self.handlers.get(&kind) else {
            tracing::error!("No handler registered for request");
            return Err(ServiceBusError::NoHandlerRegistered(
                kind.name().to_string(),
            ));
        };

        let validation = self.validate(&kind, &request);
        if !validation.is_valid() {
            tracing::warn!(
                errors = validation.errors().len(),
                "Validation errors found in request"
            );
            return Ok(reject(Rejection::from_validation(validation)));
        }

        match handler.handle(&request, ctx).await {
            Ok(response) => {
                let response = response.downcast::<R::Response>().map_err(|_| {
                    ServiceBusError::ResponseTypeMismatch {
                        handler: handler.name().to_string(),
                        expected: std::any::type_name::<R::Response>(),
                    }
                })?;
                tracing::info!(handler = handler.name(), "Request completed");
                Ok(Outcome::Completed(*response))
            }
            Err(HandlerError::Rejected(error)) => {
                tracing::error!(code = %error.code, "{}", error.message);
                Ok(reject(Rejection::from_error(error)))
            }
            Err(HandlerError::Domain(error)) => {
                tracing::error!(error = %error, "Domain error while processing request");
                Ok(reject(Rejection::from_domain_error(&error)))
            }
        }
    }

    fn validate(&self, kind: &RequestKind, request: &(dyn Any + Send + Sync)) -> ValidationResult {
        let mut result = ValidationResult::success();
        for validator in self.validators.get(kind).into_iter().flatten() {
            result.merge(validator.validate(request));
        }
        result
    }
}

fn reject<T>(rejection: Rejection) -> Outcome<T> {
    metrics::counter!("service_bus_rejections").increment(1);
    Outcome::Rejected(rejection)
}

impl fmt::Debug for ServiceBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBus")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field(
                "validators",
                &self
                    .validators
                    .iter()
                    .map(|(kind, validators)| (kind, validators.len()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
