//! Request binding primitives for gravity-axum.
//!
//! This crate holds the transport-independent half of the binding layer:
//! turning query tokens into typed scalars and filling a binding target from
//! a query string and a request payload. The axum-facing crate
//! (`gravity-axum`) drives it from live requests.
//!
//! ## Modules
//!
//! - [`scalar`]: Scalar kinds and the token resolver
//! - [`duration`]: Compact duration parsing (`300ms`, `2h30m`)
//! - [`query`]: Ordered, multi-valued query parameter set
//! - [`bind`]: The [`BindRequest`] trait and field binding helpers
//! - [`decode`]: Whole-request decoding
//! - [`error`]: Resolve and decode errors

pub mod bind;
pub mod decode;
pub mod duration;
pub mod error;
pub mod query;
pub mod scalar;

pub use bind::{BindRequest, RequestSource};
pub use decode::{RawRequest, decode, decode_from};
pub use error::*;
pub use query::QueryParams;
pub use scalar::{Complex, QueryValue, ScalarKind, ScalarValue, resolve, resolve_as};
