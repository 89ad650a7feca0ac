//! Helpers shared by the SQLite repositories.

use chrono::{DateTime, Utc};
use herald_domain::HeraldError;
use rusqlite::types::Type;
use tokio::task;

use crate::errors::InfraError;

pub(crate) fn map_sql_error(err: rusqlite::Error) -> HeraldError {
    HeraldError::from(InfraError::from(err))
}

pub(crate) fn map_pool_error(err: r2d2::Error) -> HeraldError {
    HeraldError::from(InfraError::from(err))
}

pub(crate) fn map_join_error(err: task::JoinError) -> HeraldError {
    if err.is_cancelled() {
        HeraldError::Internal("database task cancelled".into())
    } else {
        HeraldError::Internal(format!("database task panic: {err}"))
    }
}

/// `LIMIT` argument; SQLite treats a negative limit as "no limit".
pub(crate) fn limit_param(limit: Option<usize>) -> i64 {
    limit.map_or(-1, usize_to_i64)
}

pub(crate) fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn i64_to_usize(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Decode a millisecond timestamp read from column `idx`.
pub(crate) fn from_millis(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {millis}").into(),
        )
    })
}

pub(crate) const fn int_to_bool(value: i64) -> bool {
    value != 0
}
