//! Benchmark error types.

use thiserror::Error;

use crate::engine::EngineKind;
use crate::models::ModelKind;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Benchmark errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The engine connection was never opened or has already been released.
    #[error("{0} engine not initialized")]
    EngineNotInitialized(EngineKind),

    /// No model is registered for this engine/model pair.
    #[error("unsupported combination: {engine} + {model}")]
    Unsupported { engine: EngineKind, model: ModelKind },

    /// Invalid benchmark configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Label-set replacement targeted a person that does not exist.
    #[error("person {0} not found")]
    PersonNotFound(i64),

    /// PostgreSQL rejected a query or transaction.
    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(sqlx::Error),

    /// DuckDB rejected a query or transaction.
    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// SQLite rejected a query or transaction.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Document payload or report serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for failures raised before the engine was asked to do anything.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::EngineNotInitialized(_) | Error::Unsupported { .. }
        )
    }

    /// Returns true for configuration failures.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            // A closed pool means the runner already released the engine.
            sqlx::Error::PoolClosed => Error::EngineNotInitialized(EngineKind::Postgres),
            other => Error::Postgres(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_classification() {
        assert!(Error::EngineNotInitialized(EngineKind::Sqlite).is_precondition());
        assert!(Error::Unsupported {
            engine: EngineKind::Sqlite,
            model: ModelKind::Array,
        }
        .is_precondition());
        assert!(!Error::PersonNotFound(7).is_precondition());
        assert!(!Error::Config("bad".into()).is_precondition());
        assert!(Error::Config("bad".into()).is_config());
    }

    #[test]
    fn test_unsupported_message() {
        let err = Error::Unsupported {
            engine: EngineKind::Sqlite,
            model: ModelKind::Array,
        };
        assert_eq!(err.to_string(), "unsupported combination: sqlite + array");
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_pool_closed_maps_to_not_initialized() {
        let err: Error = sqlx::Error::PoolClosed.into();
        assert!(matches!(
            err,
            Error::EngineNotInitialized(EngineKind::Postgres)
        ));
    }
}
