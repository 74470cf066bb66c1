//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod chat;
pub mod pool;
pub mod secret;
pub mod settings;

use chrono::{DateTime, Utc};
use parley_types::error::RepositoryError;
use sqlx::sqlite::SqliteQueryResult;

/// Timestamps are stored as Unix epoch milliseconds.
pub(crate) fn to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| RepositoryError::Query(format!("invalid timestamp: {ms}")))
}

pub(crate) fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

/// `NotFound` when an UPDATE or DELETE matched nothing.
pub(crate) fn require_match(result: SqliteQueryResult) -> Result<(), RepositoryError> {
    match result.rows_affected() {
        0 => Err(RepositoryError::NotFound),
        _ => Ok(()),
    }
}
