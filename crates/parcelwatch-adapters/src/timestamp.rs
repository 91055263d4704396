//! Carrier timestamp parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Parse a carrier-reported timestamp as UTC.
///
/// RFC 3339 is always tried first, then `format` (as a date-time, then as a
/// bare date at midnight), then ISO-style forms without an offset. Anything
/// else yields `None`; an unparseable time is never replaced with "now".
#[must_use]
pub fn parse_timestamp(raw: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let formats = format
        .into_iter()
        .chain(["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d"]);

    for fmt in formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
        if let Some(midnight) = NaiveDate::parse_from_str(raw, fmt)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Some(Utc.from_utc_datetime(&midnight));
        }
    }

    None
}
