//! Binding error types.
//!
//! - [`ResolveError`]: a single query token could not become a typed scalar
//! - [`DecodeError`]: a request could not be bound into its target

use crate::scalar::ScalarKind;

/// Error produced when resolving one token into a scalar.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The token is not a well-formed literal of the requested kind.
    #[error("invalid {kind} value {token:?}")]
    Syntax { kind: ScalarKind, token: String },

    /// The token is well-formed but does not fit the requested width.
    #[error("value {token:?} out of range for {kind}")]
    OutOfRange { kind: ScalarKind, token: String },

    /// The requested kind (or Rust type) has no resolver.
    #[error("unsupported type: {0}")]
    UnsupportedKind(String),

    #[error("invalid timestamp {token:?}: {source}")]
    Timestamp {
        token: String,
        #[source]
        source: time::error::Parse,
    },

    #[error("invalid duration {token:?}: {reason}")]
    Duration { token: String, reason: &'static str },
}

impl ResolveError {
    pub(crate) fn syntax(kind: ScalarKind, token: &str) -> Self {
        ResolveError::Syntax {
            kind,
            token: token.to_owned(),
        }
    }

    pub(crate) fn out_of_range(kind: ScalarKind, token: &str) -> Self {
        ResolveError::OutOfRange {
            kind,
            token: token.to_owned(),
        }
    }

    pub(crate) fn duration(token: &str, reason: &'static str) -> Self {
        ResolveError::Duration {
            token: token.to_owned(),
            reason,
        }
    }
}

/// Error produced while binding a request into its target structure.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// A query parameter was present but its value did not resolve.
    #[error("query parameter {param:?}: {source}")]
    Query {
        param: String,
        #[source]
        source: ResolveError,
    },

    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// A non-empty body arrived with a media type no codec handles.
    #[error("unsupported content-type {0:?}")]
    UnsupportedContentType(String),

    #[error("request body exceeds the limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The body stream failed before it was fully read.
    #[error("failed to read request body: {0}")]
    Body(String),
}

impl DecodeError {
    pub(crate) fn query(param: &str, source: ResolveError) -> Self {
        DecodeError::Query {
            param: param.to_owned(),
            source,
        }
    }

    /// Name of the query parameter that failed, if any.
    pub fn param(&self) -> Option<&str> {
        match self {
            DecodeError::Query { param, .. } => Some(param),
            _ => None,
        }
    }
}
