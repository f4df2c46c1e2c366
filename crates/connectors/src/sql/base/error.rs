use std::string::FromUtf8Error;
use thiserror::Error;

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Low‐level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("SQL Server error: {0}")]
    SqlServer(#[from] tiberius::error::Error),

    /// UTF-8 decoding failed on some byte data.
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// A fetched column has a type this engine cannot carry.
    #[error("Column '{column}' has unsupported type '{type_name}'")]
    UnsupportedType { column: String, type_name: String },

    /// A bound parameter cannot be converted to the type the server expects.
    #[error("Parameter ${index} expects {expected}, got '{value}'")]
    ParamType {
        index: usize,
        expected: String,
        value: String,
    },

    /// Writing rows to the database failed at the application level.
    #[error("Write error: {0}")]
    Write(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Errors happening during adapter or connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection string: {0}")]
    InvalidUrl(String),

    #[error("Postgres connection failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("MySQL connection failed: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("SQL Server connection failed: {0}")]
    SqlServer(#[from] tiberius::error::Error),

    #[error("TLS configuration failed: {0}")]
    TlsConfig(#[from] native_tls::Error),

    #[error("Connection I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
