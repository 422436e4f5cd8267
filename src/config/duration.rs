//! Duration string parsing for timeout and poll-interval settings.
//!
//! Accepts compound values built from `ms`, `s`, `m`, and `h` components,
//! for example `10m`, `90s`, `1h30m`, or `50ms`. Durations must be
//! positive: a zero wait would disable polling entirely.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while parsing a duration string.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("invalid duration `{input}`: {message}")]
pub struct DurationError {
    /// The rejected input.
    pub input: String,
    /// Why the input was rejected.
    pub message: String,
}

impl DurationError {
    fn new(input: &str, message: impl Into<String>) -> Self {
        Self {
            input: input.to_owned(),
            message: message.into(),
        }
    }
}

/// Parses a compound duration string such as `10m` or `1h30m`.
///
/// # Errors
///
/// Returns [`DurationError`] for empty input, missing units, unknown
/// units, numeric overflow, or a zero total.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationError::new(input, "duration is empty"));
    }

    let mut total = Duration::ZERO;
    let mut digits = String::new();
    let mut chars = trimmed.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }

        if digits.is_empty() {
            return Err(DurationError::new(
                input,
                format!("unit `{ch}` is missing a leading number"),
            ));
        }
        let value: u64 = digits
            .parse()
            .map_err(|_| DurationError::new(input, "number is out of range"))?;
        digits.clear();

        let unit_millis: u64 = match ch {
            'h' => 3_600_000,
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                1
            }
            'm' => 60_000,
            's' => 1_000,
            other => {
                return Err(DurationError::new(input, format!("unknown unit `{other}`")));
            }
        };

        let component = value
            .checked_mul(unit_millis)
            .ok_or_else(|| DurationError::new(input, "duration overflows"))?;
        total = total
            .checked_add(Duration::from_millis(component))
            .ok_or_else(|| DurationError::new(input, "duration overflows"))?;
    }

    if !digits.is_empty() {
        return Err(DurationError::new(input, "trailing number is missing a unit"));
    }
    if total.is_zero() {
        return Err(DurationError::new(input, "duration must be positive"));
    }
    Ok(total)
}
