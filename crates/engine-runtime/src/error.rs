use engine_config::error::ConfigError;
use engine_core::error::CheckpointError;
use thiserror::Error;

/// Errors that stop a run as a whole rather than a single job.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint store error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("{failed} of {total} jobs failed")]
    JobsFailed { failed: usize, total: usize },
}
