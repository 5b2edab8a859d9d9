use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Accepted layouts for `booking_timestamp`, tried in order.
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FieldError(pub String);

/// Empty text is NULL, not an error.
fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Parse a timestamp without time zone. An explicit offset is accepted and dropped,
/// keeping the wall-clock time as written.
pub fn parse_timestamp(text: &str) -> Result<Option<NaiveDateTime>, FieldError> {
    let Some(value) = non_empty(text) else {
        return Ok(None);
    };

    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Some(ts));
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(ts.naive_local()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0));
    }

    Err(FieldError("not a recognized timestamp".to_string()))
}

/// Whole numbers, also written with a zero fraction such as `2.0`.
fn parse_integral(value: &str) -> Result<i64, FieldError> {
    if let Ok(n) = value.parse::<i64>() {
        return Ok(n);
    }
    let dec = Decimal::from_str(value).map_err(|_| FieldError("not a number".to_string()))?;
    if !dec.fract().is_zero() {
        return Err(FieldError("not a whole number".to_string()));
    }
    dec.to_i64()
        .ok_or_else(|| FieldError("out of range".to_string()))
}

/// Passenger counts: whole and non-negative.
pub fn parse_count(text: &str) -> Result<Option<u32>, FieldError> {
    let Some(value) = non_empty(text) else {
        return Ok(None);
    };
    let n = parse_integral(value)?;
    if n < 0 {
        return Err(FieldError("must be non-negative".to_string()));
    }
    u32::try_from(n)
        .map(Some)
        .map_err(|_| FieldError("out of range".to_string()))
}

/// Numeric identifiers such as geonode ids.
pub fn parse_identifier(text: &str) -> Result<Option<i64>, FieldError> {
    match non_empty(text) {
        Some(value) => parse_integral(value).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_in_common_layouts() {
        let expected = NaiveDate::from_ymd_opt(2025, 5, 7)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2025-05-07 14:30:00").unwrap(), Some(expected));
        assert_eq!(parse_timestamp("2025-05-07T14:30:00").unwrap(), Some(expected));
        assert_eq!(parse_timestamp("2025-05-07 14:30").unwrap(), Some(expected));
        assert_eq!(parse_timestamp("2025-05-07T14:30:00+02:00").unwrap(), Some(expected));
        assert_eq!(
            parse_timestamp("2025-05-07").unwrap(),
            NaiveDate::from_ymd_opt(2025, 5, 7).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn fractional_seconds_are_kept() {
        let ts = parse_timestamp("2025-05-07 14:30:00.250").unwrap().unwrap();
        assert_eq!(ts.and_utc().timestamp_subsec_millis(), 250);
    }

    #[test]
    fn blank_fields_are_null() {
        assert_eq!(parse_timestamp("   ").unwrap(), None);
        assert_eq!(parse_count("").unwrap(), None);
        assert_eq!(parse_identifier(" ").unwrap(), None);
    }

    #[test]
    fn garbage_timestamps_fail() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("2025-13-40 10:00:00").is_err());
    }

    #[test]
    fn counts_must_be_whole_and_non_negative() {
        assert_eq!(parse_count(" 2 ").unwrap(), Some(2));
        assert_eq!(parse_count("3.0").unwrap(), Some(3));
        assert!(parse_count("1.5").is_err());
        assert!(parse_count("-1").is_err());
        assert!(parse_count("two").is_err());
    }

    #[test]
    fn identifiers_accept_large_values() {
        assert_eq!(parse_identifier("1147415").unwrap(), Some(1147415));
        assert_eq!(parse_identifier("9007199254740993").unwrap(), Some(9007199254740993));
        assert!(parse_identifier("MAD").is_err());
    }
}
