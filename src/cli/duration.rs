//! Parsing of compact duration strings such as `1h30m`, `2.5h` or `500ms`.

use regex::Regex;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DurationParseError {
    #[error("duration is empty")]
    Empty,

    #[error("invalid duration '{0}' (expected e.g. 90s, 150m, 1h30m, 2.5h)")]
    Invalid(String),

    #[error("duration pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}

const MAX_FRACTION_DIGITS: usize = 18;

fn unit_nanos(unit: &str) -> u128 {
    match unit {
        "ns" => 1,
        "us" | "µs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        _ => 3600 * 1_000_000_000,
    }
}

/// Nanoseconds in `number` units, kept in integer arithmetic so `2.5h` or
/// `10ns` come out exact.
fn component_nanos(number: &str, unit: u128) -> Option<u128> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit)?;

    let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
    if !fraction.is_empty() {
        let digits: u128 = fraction.parse().ok()?;
        let scale = 10u128.pow(fraction.len() as u32);
        nanos = nanos.checked_add(digits * unit / scale)?;
    }
    Some(nanos)
}

/// Parses a sequence of `<number><unit>` pairs. Units are `ns`, `us`, `ms`,
/// `s`, `m` and `h`; a bare `0` is also accepted.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if text == "0" {
        return Ok(Duration::ZERO);
    }

    let pattern = Regex::new(r"([0-9]+(?:\.[0-9]*)?|\.[0-9]+)(ns|us|µs|ms|s|m|h)")?;
    let invalid = || DurationParseError::Invalid(input.to_string());

    let mut nanos: u128 = 0;
    let mut consumed = 0;
    for caps in pattern.captures_iter(text) {
        let whole = caps.get(0).ok_or_else(invalid)?;
        if whole.start() != consumed {
            return Err(invalid());
        }
        consumed = whole.end();

        let component = component_nanos(&caps[1], unit_nanos(&caps[2])).ok_or_else(invalid)?;
        nanos = nanos.checked_add(component).ok_or_else(invalid)?;
    }

    if consumed != text.len() {
        return Err(invalid());
    }

    let nanos = u64::try_from(nanos).map_err(|_| invalid())?;
    Ok(Duration::from_nanos(nanos))
}
