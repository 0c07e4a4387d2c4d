//! # Store Errors
//!
//! The storage taxonomy every repository implementation reports in.
//! Driver errors are classified here and never cross the crate boundary.

use std::time::Duration;

use thiserror::Error;

/// Repository failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with the given key.
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    /// The write collides with an existing record.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The storage engine rejected a value.
    #[error("rejected by storage: {0}")]
    Validation(String),

    /// Every connection stayed busy for the whole wait timeout.
    #[error("connection pool exhausted; retry after {retry_after:?}")]
    ResourceExhausted { retry_after: Duration },

    /// The storage engine could not be reached, or the pool is closed.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The storage settings cannot produce a working pool.
    #[error("invalid storage configuration: {0}")]
    Configuration(String),

    /// Anything else the driver reported.
    #[error("storage internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Classify a driver error, reporting unique violations as `conflict`.
    ///
    /// Without the pool at hand a `PoolTimedOut` cannot be told apart from
    /// an unreachable server, so it is reported as unavailable. Saturation
    /// is judged by [`SqlClient::acquire`](crate::SqlClient::acquire).
    pub(crate) fn from_sqlx(err: sqlx::Error, conflict: &str) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                Self::Unavailable("timed out waiting for a database connection".to_string())
            }
            sqlx::Error::PoolClosed => Self::Unavailable("connection pool closed".to_string()),
            sqlx::Error::Io(e) => Self::Unavailable(format!("i/o: {e}")),
            sqlx::Error::Tls(e) => Self::Unavailable(format!("tls: {e}")),
            sqlx::Error::Protocol(msg) => Self::Unavailable(format!("protocol: {msg}")),
            sqlx::Error::WorkerCrashed => Self::Unavailable("connection worker crashed".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(conflict.to_string())
            }
            sqlx::Error::Database(db) if db.is_check_violation() => {
                Self::Validation(db.message().to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_sqlx(err, "record already exists")
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        match err {
            sqlx::migrate::MigrateError::Execute(e) => e.into(),
            other => Self::Internal(format!("migration failed: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_without_pool_state_is_unavailable() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn closed_pool_is_unavailable() {
        let err: StoreError = sqlx::Error::PoolClosed.into();
        assert_eq!(
            err,
            StoreError::Unavailable("connection pool closed".to_string())
        );
    }

    #[test]
    fn row_not_found_is_internal() {
        // Repositories translate missing rows themselves; reaching this
        // arm means a query expected a row it did not get.
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Internal(_)));
    }

    #[test]
    fn not_found_message_names_entity_and_key() {
        let err = StoreError::not_found("player", "42");
        assert_eq!(err.to_string(), "player '42' not found");
    }

    #[test]
    fn configuration_error_names_the_setting() {
        let err = StoreError::Configuration("max_open_conns must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "invalid storage configuration: max_open_conns must be at least 1"
        );
    }
}
