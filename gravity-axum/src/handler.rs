//! Handler traits and the per-request context.

use std::future::Future;
use std::time::Instant;

use http::request::Parts;
use http::{HeaderMap, Method, Uri};
use serde::Serialize;

use crate::BindRequest;
use crate::boundary::Boundaries;

/// Error type returned by handlers and validators.
pub type BoxError = axum::BoxError;

/// Read-only view of the request handed to validation and the handler.
#[derive(Clone, Copy, Debug)]
pub struct Context<'a> {
    head: &'a Parts,
    deadline: Option<Instant>,
}

impl<'a> Context<'a> {
    pub fn new(head: &'a Parts, deadline: Option<Instant>) -> Self {
        Self { head, deadline }
    }

    pub fn head(&self) -> &'a Parts {
        self.head
    }

    pub fn method(&self) -> &'a Method {
        &self.head.method
    }

    pub fn uri(&self) -> &'a Uri {
        &self.head.uri
    }

    pub fn headers(&self) -> &'a HeaderMap {
        &self.head.headers
    }

    /// Typed value from the request extensions, e.g. one inserted by an
    /// upstream middleware.
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&'a T> {
        self.head.extensions.get::<T>()
    }

    /// The point after which the request should be abandoned, if the
    /// controller was built with a request timeout.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Self-validation of a decoded request.
///
/// Runs after decoding and before the handler. Request types without rules
/// implement it with an empty body.
pub trait Validate {
    fn validate(&self, cx: &Context<'_>) -> Result<(), BoxError> {
        let _ = cx;
        Ok(())
    }
}

/// A typed business handler.
///
/// Implement [`ErrorBoundary`](crate::ErrorBoundary) and/or
/// [`FaultBoundary`](crate::FaultBoundary) and register them in
/// [`boundaries`](Handler::boundaries) to take over failure responses.
pub trait Handler: Send + Sync + Sized + 'static {
    type Request: BindRequest + Validate + Send + 'static;
    type Response: Serialize + Send + 'static;

    fn handle(
        &self,
        cx: &Context<'_>,
        request: Self::Request,
    ) -> impl Future<Output = Result<Self::Response, BoxError>> + Send;

    /// Failure hooks this handler provides. Called once when the controller
    /// is built.
    fn boundaries() -> Boundaries<Self> {
        Boundaries::none()
    }
}
