//! Schedule time parsing.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Naive ISO-8601 layouts accepted in addition to RFC 3339.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a submitted schedule time.
///
/// Accepts RFC 3339 timestamps (`2024-05-01T12:00:00+02:00`) and naive
/// ISO-8601 date-times as produced by `datetime-local` inputs
/// (`2024-05-01T12:00`). Naive values are interpreted as UTC.
///
/// Returns `None` when the value matches none of the layouts.
pub fn parse_schedule_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
