//! Timestamp parsing
//!
//! Accepted representations, in priority order: RFC 3339, zone-less
//! nanosecond ISO form, two looser space-separated forms, and epoch numbers
//! (seconds or milliseconds, told apart by magnitude). Everything ends up UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// Epoch values at or above this magnitude are milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

const NANOSECOND_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const LOOSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const LOOSE_OFFSET_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";

/// Parse any supported timestamp representation
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        _ => None,
    }
}

pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, NANOSECOND_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, LOOSE_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, LOOSE_OFFSET_FORMAT) {
        return Some(dt.with_timezone(&Utc));
    }

    s.parse::<f64>().ok().and_then(from_epoch)
}

/// Convert an epoch number, auto-detecting seconds vs milliseconds
pub fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    if value.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value as i64)
    } else {
        let secs = value.floor();
        let nanos = ((value - secs) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
        DateTime::from_timestamp(secs as i64, nanos)
    }
}

/// Parse a timestamp, falling back to the current time
pub fn timestamp_or_now(value: Option<&Value>) -> DateTime<Utc> {
    match value.and_then(parse_timestamp) {
        Some(ts) => ts,
        None => {
            tracing::debug!(?value, "unparseable timestamp, using current time");
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(
            parse_timestamp(&json!("2024-01-01T00:00:00Z")),
            Some(utc(2024, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_offset_converted_to_utc() {
        assert_eq!(
            parse_timestamp(&json!("2024-01-01T02:00:00+02:00")),
            Some(utc(2024, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_nanosecond_precision() {
        let ts = parse_timestamp(&json!("2024-01-01T00:00:00.123456789Z")).unwrap();
        assert_eq!(ts.timestamp_subsec_nanos(), 123_456_789);

        let naive = parse_timestamp(&json!("2024-01-01T00:00:00.123456789")).unwrap();
        assert_eq!(naive, ts);
    }

    #[test]
    fn test_loose_formats() {
        assert_eq!(
            parse_timestamp(&json!("2024-01-01 00:00:00")),
            Some(utc(2024, 1, 1, 0, 0, 0))
        );
        assert_eq!(
            parse_timestamp(&json!("2024-01-01 01:00:00 +0100")),
            Some(utc(2024, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_epoch_seconds_and_millis() {
        assert_eq!(parse_timestamp(&json!(1704067200)), Some(utc(2024, 1, 1, 0, 0, 0)));
        assert_eq!(
            parse_timestamp(&json!(1704067200000_i64)),
            Some(utc(2024, 1, 1, 0, 0, 0))
        );
        assert_eq!(
            parse_timestamp(&json!("1704067200")),
            Some(utc(2024, 1, 1, 0, 0, 0))
        );
        let fractional = parse_timestamp(&json!(1704067200.5)).unwrap();
        assert_eq!(fractional.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_unparseable_falls_back_to_now() {
        assert_eq!(parse_timestamp(&json!("yesterday-ish")), None);
        assert_eq!(parse_timestamp(&json!(true)), None);

        let before = Utc::now();
        let ts = timestamp_or_now(Some(&json!("garbage")));
        assert!(ts >= before);
        assert!(timestamp_or_now(None) >= before);
    }
}
