//! Conversions from external infrastructure errors into domain errors.

use herald_domain::{DeliveryError, HeraldError};
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub HeraldError);

impl From<InfraError> for HeraldError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<HeraldError> for InfraError {
    fn from(value: HeraldError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoHeraldError {
    fn into_herald(self) -> HeraldError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → HeraldError */
/* -------------------------------------------------------------------------- */

impl IntoHeraldError for SqlError {
    fn into_herald(self) -> HeraldError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => HeraldError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        HeraldError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        HeraldError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        HeraldError::Database("foreign key constraint violation".into())
                    }
                    _ => HeraldError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => HeraldError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                HeraldError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                HeraldError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => {
                HeraldError::Database(format!("invalid database path: {}", path.to_string_lossy()))
            }
            other => HeraldError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_herald())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → HeraldError */
/* -------------------------------------------------------------------------- */

impl IntoHeraldError for r2d2::Error {
    fn into_herald(self) -> HeraldError {
        HeraldError::Database(format!("connection pool error: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        Self(value.into_herald())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → HeraldError / DeliveryError */
/* -------------------------------------------------------------------------- */

impl IntoHeraldError for HttpError {
    fn into_herald(self) -> HeraldError {
        if self.is_timeout() {
            return HeraldError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return HeraldError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => HeraldError::NotFound(message),
                400..=499 if code != 429 => HeraldError::InvalidInput(message),
                _ => HeraldError::Network(message),
            };
        }

        HeraldError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_herald())
    }
}

/// Classify a transport-level reqwest failure for delivery reporting.
pub fn delivery_error_from_http(err: &HttpError) -> DeliveryError {
    if let Some(status) = err.status() {
        return DeliveryError::Rejected { status: status.as_u16(), description: err.to_string() };
    }
    if err.is_timeout() {
        return DeliveryError::Transport("HTTP request timed out".into());
    }
    if err.is_connect() {
        return DeliveryError::Transport("HTTP connection failure".into());
    }
    DeliveryError::Transport(err.to_string())
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
