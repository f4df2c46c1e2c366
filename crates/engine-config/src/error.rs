use connectors::sql::base::adapter::DatabaseKind;
use planner::error::PlanError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration or validating a job.
///
/// None of these are retried: a job that fails validation never starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Environment interpolation failed: {}", .0.join("; "))]
    Env(Vec<String>),

    #[error("Job '{job}' sets both `source` and `source_file`")]
    SourceConflict { job: String },

    #[error("Job '{job}' sets neither `source` nor `source_file`")]
    MissingSource { job: String },

    #[error("Job '{job}' has an empty destination table")]
    MissingDestination { job: String },

    #[error("Job '{job}': batch size must be positive")]
    BatchSize { job: String },

    #[error("Job '{job}': target must be PostgreSQL, got {kind}")]
    UnsupportedTarget { job: String, kind: DatabaseKind },

    #[error("Job '{job}': {source}")]
    Plan {
        job: String,
        #[source]
        source: PlanError,
    },
}
