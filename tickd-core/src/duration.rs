//! Compact duration parsing
//!
//! Timeout values in the configuration use a numeric-plus-unit format such as
//! `30s`, `5m` or `1h30m`. Segments may repeat and carry a fractional part.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while parsing a compact duration string
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    /// The string contained no segments at all
    #[error("duration string is empty")]
    Empty,

    /// A segment did not start with a valid number
    #[error("invalid number in duration: {0:?}")]
    InvalidNumber(String),

    /// A segment had a number but no unit
    #[error("missing unit in duration: {0:?}")]
    MissingUnit(String),

    /// A segment used a unit other than ms/s/m/h
    #[error("unknown duration unit: {0:?}")]
    UnknownUnit(String),

    /// The summed value does not fit in a duration
    #[error("duration out of range: {0:?}")]
    OutOfRange(String),
}

/// Parses a compact duration string like `30s`, `5m`, `250ms` or `1h30m`.
///
/// Supported units are `ms`, `s`, `m` and `h`. Segments are summed, so
/// `1h30m` is ninety minutes. A zero value (`0s`) parses successfully and
/// means "unbounded" to callers that treat zero that way.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut total = 0.0_f64;
    let mut rest = input;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);

        let value: f64 = number
            .parse()
            .map_err(|_| DurationError::InvalidNumber(input.to_string()))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, remainder) = tail.split_at(unit_len);

        let multiplier = match unit {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "" => return Err(DurationError::MissingUnit(input.to_string())),
            other => return Err(DurationError::UnknownUnit(other.to_string())),
        };

        total += value * multiplier;
        rest = remainder;
    }

    Duration::try_from_secs_f64(total).map_err(|_| DurationError::OutOfRange(input.to_string()))
}
