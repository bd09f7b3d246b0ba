//! Whole-request decoding.

use bytes::Bytes;

use crate::bind::{BindRequest, RequestSource};
use crate::error::DecodeError;
use crate::query::QueryParams;

/// A request reduced to the parts the decoder reads.
#[derive(Clone, Debug, Default)]
pub struct RawRequest<'a> {
    /// Raw query string without the leading `?`.
    pub query: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub body: Bytes,
}

/// Decode a request into a fresh `T`.
///
/// Annotated fields are bound first. If no field claimed the body, the
/// whole body is then decoded onto the bound value: a key present in the
/// body overwrites the same field bound from the query, and fields the body
/// omits keep their bound or default value. An empty body is never an
/// error.
pub fn decode<T: BindRequest>(raw: RawRequest<'_>) -> Result<T, DecodeError> {
    let query = QueryParams::parse(raw.query.unwrap_or_default());
    let mut source = RequestSource::new(&query, raw.content_type, raw.body);
    decode_from(&mut source)
}

/// Decode from an already prepared [`RequestSource`].
pub fn decode_from<T: BindRequest>(source: &mut RequestSource<'_>) -> Result<T, DecodeError> {
    let mut target = T::default();
    if target.bind_fields(source)? {
        return Ok(target);
    }
    Ok(target.decode_whole(source)?.unwrap_or(target))
}
