//! SQLite storage layer.
//!
//! Store implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod message;
pub mod pool;
pub mod session;
pub mod transaction;

use chrono::{DateTime, SecondsFormat, Utc};
use quotabot_types::error::StoreError;

/// Parse an RFC3339 timestamp column back into a `DateTime<Utc>`.
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid datetime: {e}")))
}

/// Format a timestamp for storage. Fixed-width micros + `Z` so the stored
/// strings sort lexicographically (the expiry sweep compares in SQL).
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}
