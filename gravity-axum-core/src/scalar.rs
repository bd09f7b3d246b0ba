//! Scalar kinds and the token resolver.
//!
//! A query parameter value is a single string token. [`resolve`] turns that
//! token into a [`ScalarValue`] of a requested [`ScalarKind`], and
//! [`QueryValue`] ties each supported Rust type to its kind so binders can
//! call [`resolve_as`] without naming kinds by hand.

use std::fmt;
use std::num::{IntErrorKind, ParseIntError};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::duration::parse_duration;
use crate::error::ResolveError;

/// The fixed set of primitive kinds a query token can resolve into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Timestamp,
    Duration,
}

impl ScalarKind {
    /// Lexical name of the kind, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Bool => "bool",
            ScalarKind::Int8 => "int8",
            ScalarKind::Int16 => "int16",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Uint8 => "uint8",
            ScalarKind::Uint16 => "uint16",
            ScalarKind::Uint32 => "uint32",
            ScalarKind::Uint64 => "uint64",
            ScalarKind::Float32 => "float32",
            ScalarKind::Float64 => "float64",
            ScalarKind::Complex64 => "complex64",
            ScalarKind::Complex128 => "complex128",
            ScalarKind::Timestamp => "timestamp",
            ScalarKind::Duration => "duration",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarKind {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(ScalarKind::String),
            "bool" => Ok(ScalarKind::Bool),
            "int8" => Ok(ScalarKind::Int8),
            "int16" => Ok(ScalarKind::Int16),
            "int32" => Ok(ScalarKind::Int32),
            "int64" => Ok(ScalarKind::Int64),
            "uint8" => Ok(ScalarKind::Uint8),
            "uint16" => Ok(ScalarKind::Uint16),
            "uint32" => Ok(ScalarKind::Uint32),
            "uint64" => Ok(ScalarKind::Uint64),
            "float32" => Ok(ScalarKind::Float32),
            "float64" => Ok(ScalarKind::Float64),
            "complex64" => Ok(ScalarKind::Complex64),
            "complex128" => Ok(ScalarKind::Complex128),
            "timestamp" => Ok(ScalarKind::Timestamp),
            "duration" => Ok(ScalarKind::Duration),
            other => Err(ResolveError::UnsupportedKind(other.to_owned())),
        }
    }
}

/// A complex number with real and imaginary parts of the same float width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub const fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

/// A resolved query token.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    String(String),
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    Complex64(Complex<f32>),
    Complex128(Complex<f64>),
    Timestamp(OffsetDateTime),
    Duration(Duration),
}

impl ScalarValue {
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::String(_) => ScalarKind::String,
            ScalarValue::Bool(_) => ScalarKind::Bool,
            ScalarValue::Int8(_) => ScalarKind::Int8,
            ScalarValue::Int16(_) => ScalarKind::Int16,
            ScalarValue::Int32(_) => ScalarKind::Int32,
            ScalarValue::Int64(_) => ScalarKind::Int64,
            ScalarValue::Uint8(_) => ScalarKind::Uint8,
            ScalarValue::Uint16(_) => ScalarKind::Uint16,
            ScalarValue::Uint32(_) => ScalarKind::Uint32,
            ScalarValue::Uint64(_) => ScalarKind::Uint64,
            ScalarValue::Float32(_) => ScalarKind::Float32,
            ScalarValue::Float64(_) => ScalarKind::Float64,
            ScalarValue::Complex64(_) => ScalarKind::Complex64,
            ScalarValue::Complex128(_) => ScalarKind::Complex128,
            ScalarValue::Timestamp(_) => ScalarKind::Timestamp,
            ScalarValue::Duration(_) => ScalarKind::Duration,
        }
    }
}

/// Resolve one token into a value of the given kind.
///
/// Never wraps or truncates: a token that is well-formed but too large for
/// the kind fails with [`ResolveError::OutOfRange`].
pub fn resolve(kind: ScalarKind, token: &str) -> Result<ScalarValue, ResolveError> {
    let value = match kind {
        ScalarKind::String => ScalarValue::String(token.to_owned()),
        ScalarKind::Bool => ScalarValue::Bool(parse_bool(token)?),
        ScalarKind::Int8 => ScalarValue::Int8(parse_signed(kind, token)?),
        ScalarKind::Int16 => ScalarValue::Int16(parse_signed(kind, token)?),
        ScalarKind::Int32 => ScalarValue::Int32(parse_signed(kind, token)?),
        ScalarKind::Int64 => ScalarValue::Int64(parse_signed(kind, token)?),
        ScalarKind::Uint8 => ScalarValue::Uint8(parse_unsigned(kind, token)?),
        ScalarKind::Uint16 => ScalarValue::Uint16(parse_unsigned(kind, token)?),
        ScalarKind::Uint32 => ScalarValue::Uint32(parse_unsigned(kind, token)?),
        ScalarKind::Uint64 => ScalarValue::Uint64(parse_unsigned(kind, token)?),
        ScalarKind::Float32 => ScalarValue::Float32(parse_float(kind, token)?),
        ScalarKind::Float64 => ScalarValue::Float64(parse_float(kind, token)?),
        ScalarKind::Complex64 => {
            let (re, im) = parse_complex::<f32>(kind, token)?;
            ScalarValue::Complex64(Complex::new(re, im))
        }
        ScalarKind::Complex128 => {
            let (re, im) = parse_complex::<f64>(kind, token)?;
            ScalarValue::Complex128(Complex::new(re, im))
        }
        ScalarKind::Timestamp => ScalarValue::Timestamp(
            OffsetDateTime::parse(token, &Rfc3339).map_err(|source| ResolveError::Timestamp {
                token: token.to_owned(),
                source,
            })?,
        ),
        ScalarKind::Duration => ScalarValue::Duration(parse_duration(token)?),
    };
    Ok(value)
}

fn parse_bool(token: &str) -> Result<bool, ResolveError> {
    match token {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(ResolveError::syntax(ScalarKind::Bool, token)),
    }
}

fn int_error(kind: ScalarKind, token: &str, err: ParseIntError) -> ResolveError {
    match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            ResolveError::out_of_range(kind, token)
        }
        _ => ResolveError::syntax(kind, token),
    }
}

fn parse_signed<T>(kind: ScalarKind, token: &str) -> Result<T, ResolveError>
where
    T: FromStr<Err = ParseIntError>,
{
    token.parse().map_err(|err| int_error(kind, token, err))
}

fn parse_unsigned<T>(kind: ScalarKind, token: &str) -> Result<T, ResolveError>
where
    T: FromStr<Err = ParseIntError>,
{
    // Rust accepts a leading '+' for unsigned integers; sign is reserved for
    // signed kinds.
    if token.starts_with('+') {
        return Err(ResolveError::syntax(kind, token));
    }
    token.parse().map_err(|err| int_error(kind, token, err))
}

trait FloatToken: FromStr + Copy {
    const ZERO: Self;
    const ONE: Self;
    fn is_infinite(self) -> bool;
    fn negate(self) -> Self;
}

impl FloatToken for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    fn is_infinite(self) -> bool {
        f32::is_infinite(self)
    }
    fn negate(self) -> Self {
        -self
    }
}

impl FloatToken for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    fn is_infinite(self) -> bool {
        f64::is_infinite(self)
    }
    fn negate(self) -> Self {
        -self
    }
}

fn spells_infinity(token: &str) -> bool {
    let unsigned = token.trim_start_matches(['+', '-']);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

fn parse_float<T: FloatToken>(kind: ScalarKind, token: &str) -> Result<T, ResolveError> {
    let value: T = token
        .parse()
        .map_err(|_| ResolveError::syntax(kind, token))?;
    if value.is_infinite() && !spells_infinity(token) {
        return Err(ResolveError::out_of_range(kind, token));
    }
    Ok(value)
}

/// Parses `a`, `bi`, `a+bi` or `a-bi`, optionally wrapped in parentheses.
fn parse_complex<T: FloatToken>(kind: ScalarKind, token: &str) -> Result<(T, T), ResolveError> {
    let part_kind = match kind {
        ScalarKind::Complex64 => ScalarKind::Float32,
        _ => ScalarKind::Float64,
    };
    let component = |part: &str| -> Result<T, ResolveError> {
        parse_float(part_kind, part).map_err(|err| match err {
            ResolveError::OutOfRange { .. } => ResolveError::out_of_range(kind, token),
            _ => ResolveError::syntax(kind, token),
        })
    };
    let imaginary = |part: &str| -> Result<T, ResolveError> {
        match part {
            "" | "+" => Ok(T::ONE),
            "-" => Ok(T::ONE.negate()),
            _ => component(part),
        }
    };

    let s = match token.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => inner,
        None => token,
    };
    if s.is_empty() {
        return Err(ResolveError::syntax(kind, token));
    }

    let Some(body) = s.strip_suffix('i') else {
        return Ok((component(s)?, T::ZERO));
    };

    let bytes = body.as_bytes();
    let split = (1..bytes.len())
        .rev()
        .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'));

    match split {
        Some(at) => Ok((component(&body[..at])?, imaginary(&body[at..])?)),
        None => Ok((T::ZERO, imaginary(body)?)),
    }
}

/// A Rust type that a query token can be resolved into.
///
/// Implemented for every type backing a [`ScalarKind`]. Binder code is
/// generic over this trait, so a field of an unsupported type is a compile
/// error rather than a silent default.
pub trait QueryValue: Sized {
    const KIND: ScalarKind;

    /// Unwrap a resolved value, or `None` if it is of another kind.
    fn from_scalar(value: ScalarValue) -> Option<Self>;
}

macro_rules! impl_query_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl QueryValue for $ty {
                const KIND: ScalarKind = ScalarKind::$variant;

                fn from_scalar(value: ScalarValue) -> Option<Self> {
                    match value {
                        ScalarValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_query_value! {
    String => String,
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
    Complex<f32> => Complex64,
    Complex<f64> => Complex128,
    OffsetDateTime => Timestamp,
    Duration => Duration,
}

/// Resolve a token straight into `T`.
pub fn resolve_as<T: QueryValue>(token: &str) -> Result<T, ResolveError> {
    let value = resolve(T::KIND, token)?;
    let kind = value.kind();
    T::from_scalar(value).ok_or_else(|| {
        ResolveError::UnsupportedKind(format!(
            "{} resolved as {kind}",
            std::any::type_name::<T>()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn is_out_of_range<T: std::fmt::Debug>(result: Result<T, ResolveError>) -> bool {
        matches!(result, Err(ResolveError::OutOfRange { .. }))
    }

    fn is_syntax<T: std::fmt::Debug>(result: Result<T, ResolveError>) -> bool {
        matches!(result, Err(ResolveError::Syntax { .. }))
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in [
            ScalarKind::String,
            ScalarKind::Int16,
            ScalarKind::Uint64,
            ScalarKind::Complex128,
            ScalarKind::Timestamp,
            ScalarKind::Duration,
        ] {
            assert_eq!(kind.as_str().parse::<ScalarKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let err = "map".parse::<ScalarKind>().unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedKind(ref name) if name == "map"));
    }

    #[test]
    fn test_string_is_identity() {
        assert_eq!(
            resolve(ScalarKind::String, "a,b c").unwrap(),
            ScalarValue::String("a,b c".into())
        );
    }

    #[test]
    fn test_bool_spellings() {
        for token in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(resolve_as::<bool>(token).unwrap(), "{token}");
        }
        for token in ["0", "f", "F", "FALSE", "false", "False"] {
            assert!(!resolve_as::<bool>(token).unwrap(), "{token}");
        }
        assert!(is_syntax(resolve_as::<bool>("yes")));
        assert!(is_syntax(resolve_as::<bool>("tRuE")));
    }

    #[test]
    fn test_signed_integers() {
        assert_eq!(resolve_as::<i8>("-128").unwrap(), -128);
        assert_eq!(resolve_as::<i32>("+42").unwrap(), 42);
        assert_eq!(resolve_as::<i64>("9223372036854775807").unwrap(), i64::MAX);
        assert!(is_out_of_range(resolve_as::<i8>("128")));
        assert!(is_out_of_range(resolve_as::<i16>("-32769")));
        assert!(is_syntax(resolve_as::<i32>("12a")));
        assert!(is_syntax(resolve_as::<i32>("")));
    }

    #[test]
    fn test_unsigned_integers() {
        assert_eq!(resolve_as::<u8>("255").unwrap(), 255);
        assert_eq!(resolve_as::<u64>("18446744073709551615").unwrap(), u64::MAX);
        assert!(is_out_of_range(resolve_as::<u8>("256")));
        assert!(is_syntax(resolve_as::<u16>("-1")));
        assert!(is_syntax(resolve_as::<u32>("+1")));
    }

    #[test]
    fn test_floats() {
        assert_eq!(resolve_as::<f64>("1.5e3").unwrap(), 1500.0);
        assert_eq!(resolve_as::<f32>("-0.25").unwrap(), -0.25);
        assert!(resolve_as::<f64>("NaN").unwrap().is_nan());
        assert_eq!(resolve_as::<f64>("-Inf").unwrap(), f64::NEG_INFINITY);
        assert_eq!(resolve_as::<f32>("infinity").unwrap(), f32::INFINITY);
        assert!(is_out_of_range(resolve_as::<f32>("1e39")));
        assert!(is_out_of_range(resolve_as::<f64>("-1e309")));
        assert!(is_syntax(resolve_as::<f64>("1.2.3")));
    }

    #[test]
    fn test_complex_forms() {
        assert_eq!(
            resolve_as::<Complex<f64>>("1+2i").unwrap(),
            Complex::new(1.0, 2.0)
        );
        assert_eq!(
            resolve_as::<Complex<f64>>("(3.5-4i)").unwrap(),
            Complex::new(3.5, -4.0)
        );
        assert_eq!(resolve_as::<Complex<f64>>("7").unwrap(), Complex::new(7.0, 0.0));
        assert_eq!(resolve_as::<Complex<f64>>("2i").unwrap(), Complex::new(0.0, 2.0));
        assert_eq!(resolve_as::<Complex<f64>>("-i").unwrap(), Complex::new(0.0, -1.0));
        assert_eq!(
            resolve_as::<Complex<f64>>("1e2-1e-1i").unwrap(),
            Complex::new(100.0, -0.1)
        );
        assert_eq!(
            resolve_as::<Complex<f32>>("1.5+i").unwrap(),
            Complex::new(1.5f32, 1.0)
        );
    }

    #[test]
    fn test_complex_errors() {
        assert!(is_out_of_range(resolve_as::<Complex<f32>>("1e39+1i")));
        assert!(is_syntax(resolve_as::<Complex<f64>>("1+xi")));
        assert!(is_syntax(resolve_as::<Complex<f64>>("()")));
    }

    #[test]
    fn test_timestamp_rfc3339() {
        assert_eq!(
            resolve_as::<OffsetDateTime>("2024-02-29T12:30:00Z").unwrap(),
            datetime!(2024-02-29 12:30:00 UTC)
        );
        assert_eq!(
            resolve_as::<OffsetDateTime>("2024-02-29T12:30:00.5+02:00").unwrap(),
            datetime!(2024-02-29 12:30:00.5 +02:00)
        );
        assert!(matches!(
            resolve_as::<OffsetDateTime>("2024-02-29"),
            Err(ResolveError::Timestamp { .. })
        ));
    }

    #[test]
    fn test_duration_kind() {
        assert_eq!(
            resolve(ScalarKind::Duration, "1m30s").unwrap(),
            ScalarValue::Duration(Duration::from_secs(90))
        );
    }

    #[test]
    fn test_value_reports_kind() {
        let value = resolve(ScalarKind::Uint16, "8080").unwrap();
        assert_eq!(value.kind(), ScalarKind::Uint16);
        assert_eq!(u16::from_scalar(value), Some(8080));
        assert_eq!(i32::from_scalar(ScalarValue::Bool(true)), None);
    }
}
