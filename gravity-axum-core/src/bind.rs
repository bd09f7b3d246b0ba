//! Field binding.
//!
//! A binding target implements [`BindRequest`], normally through
//! `#[derive(BindRequest)]`. The generated `bind_fields` walks the declared
//! fields in order and calls the helpers in this module; hand-written impls
//! can call them the same way.
//!
//! ```ignore
//! #[derive(Default, Serialize, Deserialize, BindRequest)]
//! struct ListPets {
//!     #[bind(query = "tag", explode)]
//!     tags: Vec<String>,
//!     #[bind(query = "limit")]
//!     limit: Option<u32>,
//! }
//! ```

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DecodeError;
use crate::query::QueryParams;
use crate::scalar::{QueryValue, resolve_as};

pub const APPLICATION_JSON: &str = "application/json";

/// A structure that can be filled from a request's query string and body.
pub trait BindRequest: Default + Sized {
    /// Bind annotated fields from `source`.
    ///
    /// Returns `true` when a field (here or in a nested target) claimed the
    /// request body as its payload sink.
    fn bind_fields(&mut self, source: &mut RequestSource<'_>) -> Result<bool, DecodeError>;

    /// Decode the whole body onto `self`, used when no field claimed it.
    ///
    /// `self` already holds the query-bound fields. Keys present in the body
    /// overwrite them; everything else is kept. The default drops the body;
    /// targets that are themselves the payload return the merged value.
    fn decode_whole(&self, source: &mut RequestSource<'_>) -> Result<Option<Self>, DecodeError> {
        source.discard_body();
        Ok(None)
    }
}

/// The parts of a request a binder reads from.
///
/// The body can be taken at most once; later claims see no payload.
#[derive(Debug)]
pub struct RequestSource<'a> {
    query: &'a QueryParams,
    content_type: Option<&'a str>,
    body: Option<Bytes>,
}

impl<'a> RequestSource<'a> {
    pub fn new(query: &'a QueryParams, content_type: Option<&'a str>, body: Bytes) -> Self {
        Self {
            query,
            content_type,
            body: Some(body),
        }
    }

    pub fn query(&self) -> &'a QueryParams {
        self.query
    }

    pub fn content_type(&self) -> Option<&'a str> {
        self.content_type
    }

    /// Whether the body is still available to a sink.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Take the body and decode it as `T`.
    ///
    /// Returns `Ok(None)` if the body is empty or was already taken. A
    /// non-empty body is decoded according to its media type; only JSON is
    /// supported.
    pub fn claim_body<T: DeserializeOwned>(&mut self) -> Result<Option<T>, DecodeError> {
        match self.body.take() {
            Some(body) if !body.is_empty() => decode_payload(self.content_type, &body).map(Some),
            _ => Ok(None),
        }
    }

    /// Take the body and decode it over `base`.
    ///
    /// Returns `Ok(None)` if the body is empty or was already taken.
    /// Otherwise `base` is serialized, the JSON body is merged over it
    /// (objects recursively, any other value replaced) and the result is
    /// decoded as `T`. Keys the body omits keep their value from `base`.
    pub fn merge_body<T>(&mut self, base: &T) -> Result<Option<T>, DecodeError>
    where
        T: Serialize + DeserializeOwned,
    {
        let Some(patch) = self.claim_body::<Value>()? else {
            return Ok(None);
        };
        let mut merged = serde_json::to_value(base)?;
        merge_value(&mut merged, patch);
        Ok(Some(serde_json::from_value(merged)?))
    }

    pub fn discard_body(&mut self) {
        self.body = None;
    }
}

fn merge_value(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, patch) => *slot = patch,
    }
}

/// Media type of a `Content-Type` value with parameters stripped.
pub fn media_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or_default()
}

fn decode_payload<T: DeserializeOwned>(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<T, DecodeError> {
    let media = content_type.map(media_type).unwrap_or_default();
    if media.eq_ignore_ascii_case(APPLICATION_JSON) {
        Ok(serde_json::from_slice(body)?)
    } else {
        Err(DecodeError::UnsupportedContentType(media.to_owned()))
    }
}

/// Bind the first occurrence of `name` into a scalar field.
pub fn bind_value<T: QueryValue>(
    field: &mut T,
    query: &QueryParams,
    name: &str,
) -> Result<(), DecodeError> {
    if let Some(token) = query.first(name) {
        *field = resolve_as(token).map_err(|err| DecodeError::query(name, err))?;
    }
    Ok(())
}

/// Bind the first occurrence of `name` into an optional field.
///
/// The field becomes `Some` only when the token resolves; on failure it is
/// left untouched.
pub fn bind_optional<T: QueryValue>(
    field: &mut Option<T>,
    query: &QueryParams,
    name: &str,
) -> Result<(), DecodeError> {
    if let Some(token) = query.first(name) {
        let value = resolve_as(token).map_err(|err| DecodeError::query(name, err))?;
        *field = Some(value);
    }
    Ok(())
}

/// Bind `name` into a sequence field.
///
/// With `explode`, every occurrence is one element. Otherwise the first
/// occurrence is split on `,`. The field is replaced only if every element
/// resolves.
pub fn bind_sequence<T: QueryValue>(
    field: &mut Vec<T>,
    query: &QueryParams,
    name: &str,
    explode: bool,
) -> Result<(), DecodeError> {
    if !query.contains(name) {
        return Ok(());
    }
    let resolved: Result<Vec<T>, _> = if explode {
        query.all(name).map(resolve_as::<T>).collect()
    } else {
        query
            .first(name)
            .unwrap_or_default()
            .split(',')
            .map(resolve_as::<T>)
            .collect()
    };
    *field = resolved.map_err(|err| DecodeError::query(name, err))?;
    Ok(())
}
