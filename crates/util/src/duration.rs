//! Parses `Timeout` strings (e.g. `"60m"`, `"1h30m"`, `"1ns"`) into
//! [`std::time::Duration`], following the Go-style duration grammar the
//! authoring format inherited: a sequence of `<number><unit>` components,
//! units drawn from `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid duration \"{0}\"")]
pub struct DurationParseError(pub String);

const DEFAULT_TIMEOUT: &str = "10m";

/// Parses a timeout string, falling back to the engine default (`"10m"`)
/// when `raw` is `None` or empty.
pub fn parse_timeout(raw: Option<&str>) -> Result<Duration, DurationParseError> {
    let raw = raw.filter(|value| !value.is_empty()).unwrap_or(DEFAULT_TIMEOUT);
    parse_duration(raw)
}

/// Parses a single duration string such as `"10m"` or `"1h30m"`.
pub fn parse_duration(raw: &str) -> Result<Duration, DurationParseError> {
    let mut remaining = raw;
    let mut total = Duration::ZERO;
    let mut saw_component = false;

    while !remaining.is_empty() {
        let digits_end = remaining
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| DurationParseError(raw.to_string()))?;
        if digits_end == 0 {
            return Err(DurationParseError(raw.to_string()));
        }
        let (number_str, rest) = remaining.split_at(digits_end);
        let number: f64 = number_str.parse().map_err(|_| DurationParseError(raw.to_string()))?;

        let (unit, rest) = split_unit(rest).ok_or_else(|| DurationParseError(raw.to_string()))?;
        let nanos_per_unit = unit_nanos(unit).ok_or_else(|| DurationParseError(raw.to_string()))?;

        let nanos = number * nanos_per_unit;
        if nanos < 0.0 || !nanos.is_finite() {
            return Err(DurationParseError(raw.to_string()));
        }
        total += Duration::from_nanos(nanos as u64);
        saw_component = true;
        remaining = rest;
    }

    if !saw_component {
        return Err(DurationParseError(raw.to_string()));
    }
    Ok(total)
}

fn split_unit(rest: &str) -> Option<(&str, &str)> {
    for unit in ["ns", "us", "\u{b5}s", "ms", "s", "m", "h"] {
        if let Some(tail) = rest.strip_prefix(unit) {
            return Some((unit, tail));
        }
    }
    None
}

fn unit_nanos(unit: &str) -> Option<f64> {
    Some(match unit {
        "ns" => 1.0,
        "us" | "\u{b5}s" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        "m" => 60.0 * 1_000_000_000.0,
        "h" => 3_600.0 * 1_000_000_000.0,
        _ => return None,
    })
}

/// Formats a duration back into the shortest Go-style string, used when
/// rendering timeout errors (§4.7) and the canonical printed form (§6).
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos % 3_600_000_000_000 == 0 {
        return format!("{}h", nanos / 3_600_000_000_000);
    }
    if nanos % 60_000_000_000 == 0 {
        return format!("{}m", nanos / 60_000_000_000);
    }
    if nanos % 1_000_000_000 == 0 {
        return format!("{}s", nanos / 1_000_000_000);
    }
    if nanos % 1_000_000 == 0 {
        return format!("{}ms", nanos / 1_000_000);
    }
    if nanos % 1_000 == 0 {
        return format!("{}us", nanos / 1_000);
    }
    format!("{}ns", nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_unit_values() {
        assert_eq!(parse_duration("1ns").unwrap(), Duration::from_nanos(1));
        assert_eq!(parse_duration("60m").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn parses_compound_values() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn defaults_to_ten_minutes_when_unset() {
        assert_eq!(parse_timeout(None).unwrap(), Duration::from_secs(600));
        assert_eq!(parse_timeout(Some("")).unwrap(), Duration::from_secs(600));
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(parse_duration("bogus").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn format_duration_round_trips_common_cases() {
        assert_eq!(format_duration(Duration::from_nanos(1)), "1ns");
        assert_eq!(format_duration(Duration::from_secs(600)), "10m");
    }
}
