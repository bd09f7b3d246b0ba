//! Observability hooks.
//!
//! A controller reports what happens to each request through one
//! [`Observer`]. All methods have no-op defaults, so an implementation only
//! overrides the events it cares about. [`TracingObserver`], the default,
//! turns them into `tracing` events.

use http::request::Parts;

use crate::error::{DispatchError, Fault};

/// What a boundary did with a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryOutcome {
    /// The boundary returned a redirect that produced the response.
    Taken,
    /// The boundary was called and returned `None`.
    Declined,
    /// The handler registers no such boundary.
    Missing,
    /// The boundary or its redirect panicked.
    Panicked,
}

impl BoundaryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryOutcome::Taken => "taken",
            BoundaryOutcome::Declined => "declined",
            BoundaryOutcome::Missing => "missing",
            BoundaryOutcome::Panicked => "panicked",
        }
    }
}

#[allow(unused_variables)]
pub trait Observer: Send + Sync + 'static {
    fn request_started(&self, head: &Parts, handler: &'static str) {}

    fn decode_failed(&self, head: &Parts, error: &DispatchError) {}

    fn validation_failed(&self, head: &Parts, error: &DispatchError) {}

    fn handler_failed(&self, head: &Parts, error: &DispatchError) {}

    fn encode_failed(&self, head: &Parts, error: &DispatchError) {}

    fn error_boundary(&self, head: &Parts, outcome: BoundaryOutcome) {}

    fn fault_boundary(&self, head: &Parts, outcome: BoundaryOutcome) {}

    /// Called once per fault, before the fault boundary runs.
    fn fault_captured(&self, head: &Parts, fault: &Fault) {}
}

/// Logs dispatch events with `tracing` under the `gravity_axum` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn request_started(&self, head: &Parts, handler: &'static str) {
        tracing::debug!(
            target: "gravity_axum",
            method = %head.method,
            uri = %head.uri,
            handler,
            "dispatching request"
        );
    }

    fn decode_failed(&self, head: &Parts, error: &DispatchError) {
        tracing::warn!(target: "gravity_axum", uri = %head.uri, error = %error, "failed to decode request");
    }

    fn validation_failed(&self, head: &Parts, error: &DispatchError) {
        tracing::warn!(target: "gravity_axum", uri = %head.uri, error = %error, "request failed validation");
    }

    fn handler_failed(&self, head: &Parts, error: &DispatchError) {
        tracing::warn!(target: "gravity_axum", uri = %head.uri, error = %error, "handler returned an error");
    }

    fn encode_failed(&self, head: &Parts, error: &DispatchError) {
        tracing::warn!(target: "gravity_axum", uri = %head.uri, error = %error, "failed to encode response");
    }

    fn error_boundary(&self, head: &Parts, outcome: BoundaryOutcome) {
        tracing::debug!(
            target: "gravity_axum",
            uri = %head.uri,
            outcome = outcome.as_str(),
            "error boundary"
        );
    }

    fn fault_boundary(&self, head: &Parts, outcome: BoundaryOutcome) {
        if outcome == BoundaryOutcome::Panicked {
            tracing::error!(target: "gravity_axum", uri = %head.uri, "fault boundary panicked");
        } else {
            tracing::debug!(
                target: "gravity_axum",
                uri = %head.uri,
                outcome = outcome.as_str(),
                "fault boundary"
            );
        }
    }

    fn fault_captured(&self, head: &Parts, fault: &Fault) {
        tracing::error!(
            target: "gravity_axum",
            uri = %head.uri,
            panic = fault.is_panic(),
            error = %fault,
            trace = %fault.trace(),
            "unrecovered fault"
        );
    }
}
