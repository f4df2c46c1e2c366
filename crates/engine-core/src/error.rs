use connectors::{
    error::AdapterError,
    sql::base::{
        classify::{FailureKind, classify_connector_error, classify_db_error},
        error::DbError,
    },
};
use planner::error::PlanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Checkpoint worker failed: {0}")]
    Worker(String),
}

/// Everything that can stop a job.
///
/// Only `TransientIo` is retried; the rest fail the job on first sight.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unknown transform '{0}'")]
    PluginResolution(String),

    #[error("Transform '{plugin}' failed: {message}")]
    Transform { plugin: String, message: String },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Job cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::TransientIo(_))
    }

    /// Short label used in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Config(_) => "config",
            EngineError::Schema(_) => "schema",
            EngineError::TransientIo(_) => "transient_io",
            EngineError::SchemaMismatch(_) => "schema_mismatch",
            EngineError::PluginResolution(_) => "plugin_resolution",
            EngineError::Transform { .. } => "transform",
            EngineError::Checkpoint(_) => "checkpoint",
            EngineError::Cancelled => "cancelled",
        }
    }

    /// Driver error raised while reading or writing rows.
    pub fn from_db(err: DbError) -> Self {
        match classify_db_error(&err) {
            FailureKind::Transient => EngineError::TransientIo(err.to_string()),
            FailureKind::SchemaMismatch => EngineError::SchemaMismatch(err.to_string()),
            FailureKind::Fatal => EngineError::Schema(err.to_string()),
        }
    }

    /// Driver error raised by DDL or catalog work, which is never retried.
    pub fn schema_from_db(err: DbError) -> Self {
        EngineError::Schema(err.to_string())
    }

    pub fn from_adapter(err: AdapterError) -> Self {
        let kind = match &err {
            AdapterError::Connector(conn_err) => classify_connector_error(conn_err),
            AdapterError::Database(db_err) => classify_db_error(db_err),
            AdapterError::UnsupportedDriver(_) | AdapterError::UnsupportedTarget(_) => {
                FailureKind::Fatal
            }
        };
        match kind {
            FailureKind::Transient => EngineError::TransientIo(err.to_string()),
            _ => EngineError::Config(err.to_string()),
        }
    }
}

impl From<PlanError> for EngineError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::EmptyIdentifier(_)
            | PlanError::DuplicateColumn { .. }
            | PlanError::NoColumns => EngineError::Schema(err.to_string()),
            _ => EngineError::Config(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_io_is_retryable() {
        assert!(EngineError::TransientIo("reset".into()).is_transient());
        assert!(!EngineError::SchemaMismatch("x".into()).is_transient());
        assert!(!EngineError::Cancelled.is_transient());
    }

    #[test]
    fn plan_errors_split_between_config_and_schema() {
        let e: EngineError = PlanError::UnknownColumn("Email".into()).into();
        assert_eq!(e.kind(), "config");
        let e: EngineError = PlanError::NoColumns.into();
        assert_eq!(e.kind(), "schema");
    }

    #[test]
    fn io_failures_are_transient() {
        let err = DbError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert!(EngineError::from_db(err).is_transient());
    }
}
