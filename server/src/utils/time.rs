//! Time utility functions

use chrono::{DateTime, NaiveDateTime, Utc};

/// Format used by the storage API for `LastChanged` / `DateCreated`
const STORAGE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parse a storage listing timestamp to DateTime<Utc>
///
/// The storage API omits the offset (`2024-03-01T10:20:30.123`); those values
/// are UTC. RFC 3339 strings are accepted too.
pub fn parse_storage_timestamp(ts: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return dt.with_timezone(&Utc);
    }
    NaiveDateTime::parse_from_str(ts, STORAGE_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| {
            tracing::warn!(ts, "Invalid storage timestamp, using epoch");
            DateTime::UNIX_EPOCH
        })
}

/// Format a timestamp the way the storage API does
pub fn format_storage_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Parse an HTTP-date (`Expires` header) to milliseconds since the epoch
pub fn parse_http_date_ms(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.timestamp_millis())
}
