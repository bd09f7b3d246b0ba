//! # gravity-axum
//!
//! Typed request binding and dispatch for [Axum](https://github.com/tokio-rs/axum).
//!
//! A [`Handler`] declares the request type it accepts and the response type it
//! produces. A [`Controller`] wraps the handler and runs every request through
//! a fixed sequence of stages:
//!
//! 1. **Decoding**: query parameters and the JSON body are bound into the
//!    request type, driven by `#[derive(BindRequest)]` annotations.
//! 2. **Validating**: the request's [`Validate`] impl runs.
//! 3. **Handling**: the handler is called.
//! 4. **Encoding**: the response is encoded as JSON, subject to `Accept`.
//!
//! A failure in any stage is offered to the handler's [`ErrorBoundary`], which
//! may return a [`Redirect`] producing the final response. Errors nobody
//! handles, and panics, become a [`Fault`]: the [`FaultBoundary`] gets a
//! chance to respond, and otherwise a last-resort diagnostic response is sent.
//!
//! ## Example
//!
//! ```rust,no_run
//! use axum::Router;
//! use gravity_axum::{BindRequest, BoxError, Context, Controller, Handler, Validate};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Serialize, Deserialize, BindRequest)]
//! struct Greet {
//!     #[bind(query = "name")]
//!     name: String,
//! }
//!
//! impl Validate for Greet {}
//!
//! #[derive(Serialize)]
//! struct Greeting {
//!     message: String,
//! }
//!
//! struct Greeter;
//!
//! impl Handler for Greeter {
//!     type Request = Greet;
//!     type Response = Greeting;
//!
//!     async fn handle(&self, _cx: &Context<'_>, req: Greet) -> Result<Greeting, BoxError> {
//!         Ok(Greeting { message: format!("hello, {}", req.name) })
//!     }
//! }
//!
//! let app: Router = Router::new().route("/greet", Controller::new(Greeter).into_method_router());
//! ```

extern crate self as gravity_axum;

pub mod boundary;
pub mod builder;
pub mod config;
pub mod controller;
pub mod error;
pub mod handler;
pub mod limits;
pub mod observe;
pub mod request;
pub mod response;

pub use gravity_axum_core::{
    BindRequest, Complex, DecodeError, QueryParams, QueryValue, RawRequest, ResolveError,
    ScalarKind, ScalarValue, bind, decode, duration, query, resolve, resolve_as, scalar,
};
pub use gravity_axum_macros::BindRequest;

pub use boundary::{Boundaries, ErrorBoundary, FaultBoundary, Redirect};
pub use builder::ControllerBuilder;
pub use config::DispatchConfig;
pub use controller::{Controller, Stage};
pub use error::{DispatchError, ErrorResponse, Fault, FaultOrigin};
pub use handler::{BoxError, Context, Handler, Validate};
pub use limits::BodyLimits;
pub use observe::{BoundaryOutcome, Observer, TracingObserver};
pub use request::Bound;

// Re-export crates that appear in public signatures
pub use serde;
pub use time;

pub mod prelude {
    //! The most common types for defining handlers.
    pub use crate::boundary::{ErrorBoundary, FaultBoundary, Redirect};
    pub use crate::controller::Controller;
    pub use crate::error::{DispatchError, Fault};
    pub use crate::handler::{BoxError, Context, Handler, Validate};
    pub use gravity_axum_core::BindRequest;
    pub use gravity_axum_macros::BindRequest;
}
