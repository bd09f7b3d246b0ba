//! Compact duration parsing.
//!
//! Accepts a sequence of decimal numbers, each with an optional fraction and
//! a unit suffix, such as `300ms`, `1.5h` or `2h45m`. Valid units are `ns`,
//! `us` (or `µs`/`μs`), `ms`, `s`, `m` and `h`. The bare token `0` needs no
//! unit.

use std::time::Duration;

use crate::error::ResolveError;
use crate::scalar::ScalarKind;

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SECOND: u64 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(1),
        "us" | "\u{00b5}s" | "\u{03bc}s" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(60 * 60 * NANOS_PER_SECOND),
        _ => None,
    }
}

/// Splits off the leading run of ASCII digits.
fn leading_digits(s: &str) -> (&str, &str) {
    let end = s.bytes().position(|b| !b.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

/// Parse a duration token into a [`Duration`].
///
/// Negative durations are rejected since [`Duration`] is unsigned; `-0` is
/// still zero.
pub fn parse_duration(token: &str) -> Result<Duration, ResolveError> {
    let (negative, mut rest) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(ResolveError::duration(token, "empty duration"));
    }

    let overflow = || ResolveError::out_of_range(ScalarKind::Duration, token);
    let mut total: u64 = 0;

    while !rest.is_empty() {
        let (whole, after_whole) = leading_digits(rest);
        let (fraction, after_fraction) = match after_whole.strip_prefix('.') {
            Some(tail) => leading_digits(tail),
            None => ("", after_whole),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(ResolveError::duration(token, "expected a number"));
        }

        let unit_end = after_fraction
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after_fraction.len());
        if unit_end == 0 {
            return Err(ResolveError::duration(token, "missing unit"));
        }
        let (unit, tail) = after_fraction.split_at(unit_end);
        let unit = unit_nanos(unit).ok_or_else(|| ResolveError::duration(token, "unknown unit"))?;

        let mut nanos = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u64>()
                .ok()
                .and_then(|v| v.checked_mul(unit))
                .ok_or_else(overflow)?
        };

        if !fraction.is_empty() {
            // Digits past u64 precision cannot change the result at
            // nanosecond resolution.
            let digits = &fraction[..fraction.len().min(19)];
            let numerator = digits.parse::<u128>().map_err(|_| overflow())?;
            let scale = 10u128.pow(digits.len() as u32);
            let part = u64::try_from(numerator * u128::from(unit) / scale).map_err(|_| overflow())?;
            nanos = nanos.checked_add(part).ok_or_else(overflow)?;
        }

        total = total.checked_add(nanos).ok_or_else(overflow)?;
        rest = tail;
    }

    if negative && total != 0 {
        return Err(ResolveError::duration(
            token,
            "negative durations are not supported",
        ));
    }
    Ok(Duration::from_nanos(total))
}
