//! Response encoding.
//!
//! Successful results are encoded as JSON when the client's `Accept` header
//! allows it. Faults that no boundary answered get a last-resort
//! diagnostic: JSON when the client asked for JSON, plain text otherwise.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;

use crate::bind::APPLICATION_JSON;
use crate::error::{DispatchError, ErrorResponse, Fault};

/// Media ranges of one `Accept` value, without those the client refused
/// with `q=0`.
fn accepted_ranges(accept: &str) -> impl Iterator<Item = &str> {
    accept.split(',').filter_map(|range| {
        let mut parts = range.split(';');
        let media = parts.next()?.trim();
        let refused = parts.any(|param| {
            let Some((name, value)) = param.split_once('=') else {
                return false;
            };
            name.trim().eq_ignore_ascii_case("q")
                && value.trim().parse::<f32>().is_ok_and(|q| q <= 0.0)
        });
        (!media.is_empty() && !refused).then_some(media)
    })
}

/// Whether one `Accept` header value admits a JSON response.
fn accept_allows_json(accept: &str) -> bool {
    accepted_ranges(accept).any(|media| {
        media.eq_ignore_ascii_case(APPLICATION_JSON)
            || media.eq_ignore_ascii_case("application/*")
            || media == "*/*"
    })
}

/// Check that the client accepts JSON.
///
/// A request without `Accept` accepts anything.
pub(crate) fn negotiate(headers: &HeaderMap) -> Result<(), DispatchError> {
    let mut values = headers.get_all(ACCEPT).iter().peekable();
    if values.peek().is_none() {
        return Ok(());
    }
    let mut seen = Vec::new();
    for value in values {
        let accept = String::from_utf8_lossy(value.as_bytes());
        if accept_allows_json(&accept) {
            return Ok(());
        }
        seen.push(accept.into_owned());
    }
    Err(DispatchError::NotAcceptable {
        accept: seen.join(", "),
    })
}

/// Whether the client explicitly listed `application/json`.
fn asked_for_json(headers: &HeaderMap) -> bool {
    headers.get_all(ACCEPT).iter().any(|value| {
        value.to_str().is_ok_and(|accept| {
            accepted_ranges(accept).any(|media| media.eq_ignore_ascii_case(APPLICATION_JSON))
        })
    })
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    response
}

/// Encode a handler result as a `200 OK` JSON response.
pub(crate) fn encode<T: Serialize>(headers: &HeaderMap, message: &T) -> Result<Response, DispatchError> {
    negotiate(headers)?;
    let body = serde_json::to_vec(message).map_err(DispatchError::Encode)?;
    Ok(json_response(StatusCode::OK, body))
}

/// Render the last-resort response for a fault no boundary answered.
///
/// Always `500 Internal Server Error`.
pub(crate) fn last_resort(headers: &HeaderMap, fault: &Fault, expose_trace: bool) -> Response {
    let stack_trace = expose_trace.then(|| fault.trace().to_string());

    if asked_for_json(headers) {
        let body = ErrorResponse {
            error: fault.message().to_owned(),
            stack_trace: stack_trace.clone(),
        };
        if let Ok(bytes) = serde_json::to_vec(&body) {
            return json_response(StatusCode::INTERNAL_SERVER_ERROR, bytes);
        }
    }

    let mut text = fault.message().to_owned();
    text.push('\n');
    if let Some(trace) = stack_trace {
        text.push('\n');
        text.push_str(&trace);
    }
    (StatusCode::INTERNAL_SERVER_ERROR, text).into_response()
}
