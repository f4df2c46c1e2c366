use crate::sql::base::{
    adapter::DatabaseKind,
    error::{ConnectorError, DbError},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Failed to initialize a data connector/adapter.
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// Database-related error.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Unsupported driver error.
    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    /// The locator names a driver that cannot be written to.
    #[error("{0} is not supported as a migration target, only postgres is")]
    UnsupportedTarget(DatabaseKind),
}
