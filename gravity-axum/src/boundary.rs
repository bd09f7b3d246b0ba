//! Error and fault boundaries.
//!
//! A boundary is an optional hook a handler provides to take over the
//! response when something goes wrong. The error boundary sees recoverable
//! [`DispatchError`]s; the fault boundary sees [`Fault`]s (panics and errors
//! nobody handled). Either may return a [`Redirect`] whose response becomes
//! the final one.
//!
//! Capabilities are declared through [`Handler::boundaries`](crate::Handler::boundaries) and resolved
//! once when the controller is built:
//!
//! ```ignore
//! impl Handler for PetStore {
//!     // ...
//!     fn boundaries() -> Boundaries<Self> {
//!         Boundaries::none().with_error_boundary()
//!     }
//! }
//!
//! impl ErrorBoundary for PetStore {
//!     fn error_boundary(&self, _head: &Parts, error: &DispatchError) -> Option<Redirect> {
//!         Some(Redirect::to(error.to_response()))
//!     }
//! }
//! ```

use std::fmt;
use std::future::Future;

use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use futures::future::BoxFuture;
use http::request::Parts;

use crate::error::{DispatchError, Fault};

/// Takes over the response for recoverable errors.
///
/// Declining is not a silent fall-through: an error the boundary returns
/// `None` for is promoted to a [`Fault`] exactly as if no error boundary
/// were registered, so it reaches the [`FaultBoundary`] or the last-resort
/// 500 response. A panic inside the boundary or its [`Redirect`] is caught
/// and becomes a fault too.
pub trait ErrorBoundary {
    /// Return `Some` to answer the request; `None` escalates the error to a
    /// fault.
    fn error_boundary(&self, head: &Parts, error: &DispatchError) -> Option<Redirect>;
}

/// Takes over the response for faults.
pub trait FaultBoundary {
    /// Return `Some` to answer the request; `None` falls back to the
    /// last-resort diagnostic response.
    fn fault_boundary(&self, head: &Parts, fault: &Fault) -> Option<Redirect>;
}

type RedirectFn = Box<dyn FnOnce(&Parts) -> BoxFuture<'static, Response> + Send>;

/// A one-shot handler producing the final response on behalf of a boundary.
pub struct Redirect {
    run: RedirectFn,
}

impl Redirect {
    /// Build a redirect from a function of the request head.
    ///
    /// Anything the future needs from the head must be copied out before it
    /// is returned.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(&Parts) -> Fut + Send + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self {
            run: Box::new(move |head: &Parts| f(head).boxed()),
        }
    }

    /// Build a redirect from a synchronous function of the request head.
    pub fn sync<F, R>(f: F) -> Self
    where
        F: FnOnce(&Parts) -> R + Send + 'static,
        R: IntoResponse,
    {
        Self {
            run: Box::new(move |head: &Parts| {
                let response = f(head).into_response();
                futures::future::ready(response).boxed()
            }),
        }
    }

    /// Answer with a fixed response.
    pub fn to(response: impl IntoResponse) -> Self {
        let response = response.into_response();
        Self::sync(move |_: &Parts| response)
    }

    pub(crate) async fn invoke(self, head: &Parts) -> Response {
        (self.run)(head).await
    }
}

impl fmt::Debug for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redirect").finish_non_exhaustive()
    }
}

type ErrorHook<H> = fn(&H, &Parts, &DispatchError) -> Option<Redirect>;
type FaultHook<H> = fn(&H, &Parts, &Fault) -> Option<Redirect>;

/// The boundaries a [`Handler`](crate::Handler) provides.
///
/// Each `with_*` method only compiles when the handler implements the
/// matching trait.
pub struct Boundaries<H> {
    error: Option<ErrorHook<H>>,
    fault: Option<FaultHook<H>>,
}

impl<H> Boundaries<H> {
    pub const fn none() -> Self {
        Self {
            error: None,
            fault: None,
        }
    }

    pub fn with_error_boundary(mut self) -> Self
    where
        H: ErrorBoundary,
    {
        self.error = Some(<H as ErrorBoundary>::error_boundary);
        self
    }

    pub fn with_fault_boundary(mut self) -> Self
    where
        H: FaultBoundary,
    {
        self.fault = Some(<H as FaultBoundary>::fault_boundary);
        self
    }

    pub fn has_error_boundary(&self) -> bool {
        self.error.is_some()
    }

    pub fn has_fault_boundary(&self) -> bool {
        self.fault.is_some()
    }

    /// `None` when no error boundary is registered.
    pub(crate) fn on_error(
        &self,
        handler: &H,
        head: &Parts,
        error: &DispatchError,
    ) -> Option<Option<Redirect>> {
        self.error.map(|hook| hook(handler, head, error))
    }

    /// `None` when no fault boundary is registered.
    pub(crate) fn on_fault(
        &self,
        handler: &H,
        head: &Parts,
        fault: &Fault,
    ) -> Option<Option<Redirect>> {
        self.fault.map(|hook| hook(handler, head, fault))
    }
}

impl<H> Default for Boundaries<H> {
    fn default() -> Self {
        Self::none()
    }
}

impl<H> fmt::Debug for Boundaries<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Boundaries")
            .field("error", &self.has_error_boundary())
            .field("fault", &self.has_fault_boundary())
            .finish()
    }
}
