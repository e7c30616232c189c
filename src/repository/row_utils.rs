// ==========================================
// Scrap Recycling - Row Mapping Helpers
// ==========================================
// Timestamps are stored as RFC 3339 UTC text; enums as SCREAMING_SNAKE_CASE.
// Unparseable values surface as FromSqlConversionFailure instead of defaults.
// ==========================================

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct BadColumnValue(String);

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(BadColumnValue(message)))
}

/// Format a timestamp for storage
pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{}': {}", raw, e)))
}

/// Parse an optional stored timestamp
pub fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

/// Parse a stored enum through its `from_str`
pub fn parse_enum<T>(idx: usize, raw: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| conversion_error(idx, format!("unknown value '{}'", raw)))
}
