//! Per-controller configuration.
//!
//! Fixed when a [`Controller`](crate::Controller) is built and shared by all
//! of its in-flight requests.

use std::time::Duration;

use crate::limits::BodyLimits;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Body size limit applied while decoding.
    pub limits: BodyLimits,
    /// Deadline offered to validation and the handler through
    /// [`Context::deadline`](crate::Context::deadline). Not enforced by the
    /// controller.
    pub request_timeout: Option<Duration>,
    /// Include the captured trace in last-resort fault responses.
    pub expose_trace: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            limits: BodyLimits::default(),
            request_timeout: None,
            expose_trace: true,
        }
    }
}
