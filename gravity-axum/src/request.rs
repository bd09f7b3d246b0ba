//! Reading live requests into binding targets.

use axum::body::Body;
use axum::extract::{FromRequest, Request};
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::request::Parts;
use http_body_util::LengthLimitError;

use crate::bind::{BindRequest, RequestSource};
use crate::error::DispatchError;
use crate::limits::BodyLimits;
use crate::{DecodeError, QueryParams};

fn content_length(head: &Parts) -> Option<usize> {
    head.headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}

/// Drain the body into memory under `limits`.
///
/// A declared `Content-Length` over the limit is rejected before reading.
pub(crate) async fn read_body(head: &Parts, body: Body, limits: BodyLimits) -> Result<Bytes, DecodeError> {
    if let Some(length) = content_length(head) {
        limits
            .check_size(length)
            .map_err(|limit| DecodeError::BodyTooLarge { limit })?;
    }

    let max = limits.max_body_size().unwrap_or(usize::MAX);
    axum::body::to_bytes(body, max).await.map_err(|err| {
        if is_length_limit(&err) {
            DecodeError::BodyTooLarge { limit: max }
        } else {
            DecodeError::Body(err.to_string())
        }
    })
}

/// Read and bind a request into `T`.
pub(crate) async fn decode_request<T: BindRequest>(
    head: &Parts,
    body: Body,
    limits: BodyLimits,
) -> Result<T, DecodeError> {
    let bytes = read_body(head, body, limits).await?;
    let query = QueryParams::parse(head.uri.query().unwrap_or_default());
    let content_type = head.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let mut source = RequestSource::new(&query, content_type, bytes);
    gravity_axum_core::decode_from(&mut source)
}

/// Extractor binding a request into `T` outside of a controller.
///
/// Uses [`BodyLimits`] from the request extensions when present, otherwise
/// the default limit. Rejects with the [`DispatchError::Decode`] response.
///
/// ```ignore
/// async fn search(Bound(query): Bound<SearchPets>) -> Json<Vec<Pet>> {
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Bound<T>(pub T);

impl<S, T> FromRequest<S> for Bound<T>
where
    S: Send + Sync,
    T: BindRequest + Send,
{
    type Rejection = DispatchError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let limits = req.extensions().get::<BodyLimits>().copied().unwrap_or_default();
        let (head, body) = req.into_parts();
        let value = decode_request(&head, body, limits).await?;
        Ok(Bound(value))
    }
}
