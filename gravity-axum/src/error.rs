//! Dispatch errors and faults.
//!
//! - [`DispatchError`]: a recoverable failure in one of the dispatch stages,
//!   offered to the handler's error boundary
//! - [`Fault`]: a panic, or a [`DispatchError`] no boundary handled
//! - [`ErrorResponse`]: JSON shape of error and diagnostic responses

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::sync::Once;

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;

use crate::DecodeError;
use crate::handler::BoxError;

/// A recoverable failure in one of the dispatch stages.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("validation failed: {0}")]
    Validation(BoxError),

    #[error("{0}")]
    Handler(BoxError),

    #[error("mime type {accept:?} provided in Accept header is not supported")]
    NotAcceptable { accept: String },

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

impl DispatchError {
    /// Suggested HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Decode(DecodeError::BodyTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchError::Decode(DecodeError::UnsupportedContentType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            DispatchError::Decode(_) => StatusCode::BAD_REQUEST,
            DispatchError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DispatchError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            DispatchError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A JSON response with [`status`](Self::status) and the error message,
    /// suitable for returning from an error boundary.
    pub fn to_response(&self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            stack_trace: None,
        };
        (self.status(), Json(body)).into_response()
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        self.to_response()
    }
}

/// JSON body of error responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

/// Where a [`Fault`] came from.
#[derive(Debug)]
pub enum FaultOrigin {
    /// A panic caught while dispatching.
    Panic,
    /// An error that no error boundary handled.
    Unhandled(DispatchError),
}

/// An unrecovered failure: a panic, or an error promoted because no error
/// boundary answered it.
///
/// The execution trace is captured when the fault is raised.
#[derive(Debug)]
pub struct Fault {
    message: String,
    origin: FaultOrigin,
    trace: Backtrace,
}

impl Fault {
    pub fn unhandled(error: DispatchError) -> Self {
        Self {
            message: error.to_string(),
            origin: FaultOrigin::Unhandled(error),
            trace: Backtrace::force_capture(),
        }
    }

    /// Fault for a caught panic.
    ///
    /// Uses the trace recorded at the panic site when the panic hook is
    /// installed (every built controller installs it), otherwise captures
    /// one here.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self {
            message: panic_message(payload.as_ref()),
            origin: FaultOrigin::Panic,
            trace: take_panic_trace().unwrap_or_else(Backtrace::force_capture),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn origin(&self) -> &FaultOrigin {
        &self.origin
    }

    pub fn is_panic(&self) -> bool {
        matches!(self.origin, FaultOrigin::Panic)
    }

    /// The promoted error, for faults that started as a [`DispatchError`].
    pub fn error(&self) -> Option<&DispatchError> {
        match &self.origin {
            FaultOrigin::Unhandled(error) => Some(error),
            FaultOrigin::Panic => None,
        }
    }

    pub fn trace(&self) -> &Backtrace {
        &self.trace
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error().map(|error| error as _)
    }
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chain a panic hook that records the panicking thread's backtrace.
///
/// `catch_unwind` returns on the thread that panicked, so the caught fault
/// picks the trace up from the same thread-local. The previous hook still
/// runs afterwards.
pub(crate) fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture();
            let _ = PANIC_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<Backtrace> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_owned()
    }
}
