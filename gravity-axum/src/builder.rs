//! Builder for [`Controller`]s.
//!
//! ```rust,ignore
//! use gravity_axum::{BodyLimits, Controller};
//! use std::time::Duration;
//!
//! let controller = Controller::builder(PetStore::default())
//!     .limits(BodyLimits::new(64 * 1024))
//!     .request_timeout(Duration::from_secs(5))
//!     .expose_trace(false)
//!     .build();
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::config::DispatchConfig;
use crate::controller::{Controller, Inner};
use crate::handler::Handler;
use crate::limits::BodyLimits;
use crate::observe::{Observer, TracingObserver};

/// Configures a [`Controller`] before it starts serving.
///
/// Everything set here is fixed for the controller's lifetime.
pub struct ControllerBuilder<H> {
    handler: H,
    config: DispatchConfig,
    observer: Option<Arc<dyn Observer>>,
}

impl<H: Handler> ControllerBuilder<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            config: DispatchConfig::default(),
            observer: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the request body size limit.
    ///
    /// Default is 4 MiB.
    pub fn limits(mut self, limits: BodyLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Offer a deadline of `now + timeout` to validation and the handler.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Include the execution trace in last-resort fault responses.
    ///
    /// Default is `true`. The observer receives the trace either way.
    pub fn expose_trace(mut self, expose: bool) -> Self {
        self.config.expose_trace = expose;
        self
    }

    /// Report dispatch events to `observer` instead of [`TracingObserver`].
    pub fn observer(mut self, observer: impl Observer) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Share an existing observer between several controllers.
    pub fn shared_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Resolve the handler's boundaries and build the controller.
    ///
    /// Also installs, once per process, the panic hook that records where a
    /// handler panicked.
    pub fn build(self) -> Controller<H> {
        crate::error::install_panic_hook();
        Controller::from_inner(Inner {
            boundaries: H::boundaries(),
            handler: self.handler,
            config: self.config,
            observer: self
                .observer
                .unwrap_or_else(|| Arc::new(TracingObserver) as Arc<dyn Observer>),
            name: std::any::type_name::<H>(),
        })
    }
}
