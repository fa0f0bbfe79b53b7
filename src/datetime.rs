//! Date/time utilities for sharegate.
//!
//! Timestamps are stored as fixed-width UTC text (`YYYY-MM-DD HH:MM:SS.ffffff`)
//! so that SQL string comparison orders them chronologically. Nothing relies
//! on SQLite's own `datetime('now')`, which has a different width.

use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, Utc};

use crate::{Result, SharegateError};

/// Storage format for every timestamp column.
pub const DB_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Width of every stored timestamp.
pub const DB_WIDTH: usize = 26;

/// Latest year that still encodes at [`DB_WIDTH`].
pub const MAX_YEAR: i32 = 9999;

/// Encode a UTC instant for storage.
pub fn to_db(dt: &DateTime<Utc>) -> String {
    dt.format(DB_FORMAT).to_string()
}

/// Encode an instant that must keep the fixed width, such as an expiry.
///
/// Years past [`MAX_YEAR`] would gain a sign and extra digits and sort
/// before every real timestamp, so they are rejected.
pub fn to_db_checked(dt: &DateTime<Utc>) -> Result<String> {
    if dt.year() > MAX_YEAR || dt.year() < 1 {
        return Err(SharegateError::Validation(
            "expiry is too far away".to_string(),
        ));
    }
    Ok(to_db(dt))
}

/// Current instant in storage format.
pub fn now_db() -> String {
    to_db(&Utc::now())
}

/// Decode a stored timestamp.
pub fn from_db(s: &str) -> Result<DateTime<Utc>> {
    if s.len() != DB_WIDTH {
        return Err(SharegateError::Database(format!(
            "invalid timestamp {s:?}: expected {DB_WIDTH} characters"
        )));
    }
    NaiveDateTime::parse_from_str(s, DB_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| SharegateError::Database(format!("invalid timestamp {s:?}: {e}")))
}

/// Convert a stored timestamp to RFC3339 for API responses.
///
/// Unparseable input is returned unchanged.
pub fn to_rfc3339(s: &str) -> String {
    match from_db(s) {
        Ok(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        Err(_) => s.to_string(),
    }
}
