//! Request handlers.

use std::any::Any;

use async_trait::async_trait;
use domain::DomainError;
use thiserror::Error as ThisError;

use crate::request::{Request, RequestContext, RequestKind};
use crate::response::Error;

/// Why a handler did not produce a response.
#[derive(Debug, ThisError)]
pub enum HandlerError {
    /// The handler refused the request with a user-facing error.
    #[error(transparent)]
    Rejected(#[from] Error),

    /// A domain operation failed while handling.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Handles one request type.
///
/// Exactly one handler may be registered per request type.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// The request type this handler processes.
    type Request: Request;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(
        &self,
        request: &Self::Request,
        ctx: &RequestContext,
    ) -> Result<<Self::Request as Request>::Response, HandlerError>;
}

/// Type-erased handler registered with a [`ServiceBus`](crate::ServiceBus).
///
/// Typed [`Handler`]s are wrapped automatically; implement this directly
/// only to route requests whose type is decided at runtime.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// The request type this handler processes.
    ///
    /// Returning `None` makes the handler unroutable and it is refused at
    /// registration.
    fn handled_request(&self) -> Option<RequestKind>;

    /// Handles a request of the declared type, boxing the response.
    async fn handle(
        &self,
        request: &(dyn Any + Send + Sync),
        ctx: &RequestContext,
    ) -> Result<Box<dyn Any + Send>, HandlerError>;
}

pub(crate) struct TypedHandler<H> {
    handler: H,
}

impl<H> TypedHandler<H> {
    pub(crate) fn new(handler: H) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<H: Handler> RequestHandler for TypedHandler<H> {
    fn name(&self) -> &str {
        self.handler.name()
    }

    fn handled_request(&self) -> Option<RequestKind> {
        Some(RequestKind::of::<H::Request>())
    }

    async fn handle(
        &self,
        request: &(dyn Any + Send + Sync),
        ctx: &RequestContext,
    ) -> Result<Box<dyn Any + Send>, HandlerError> {
        let Some(request) = request.downcast_ref::<H::Request>() else {
            return Err(Error::new(
                "ServiceBus.Request.NotSupported",
                format!(
                    "{} only handles {}",
                    self.handler.name(),
                    RequestKind::of::<H::Request>()
                ),
                "ServiceBus",
            )
            .into());
        };
        let response = self.handler.handle(request, ctx).await?;
        Ok(Box::new(response))
    }
}
