use engine_config::error::ConfigError;
use engine_core::error::EngineError;
use engine_runtime::error::RunError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to run the migration: {0}")]
    Run(#[from] RunError),

    #[error("Failed to generate DDL: {0}")]
    Ddl(#[from] EngineError),

    #[error("Failed to write the report: {0}")]
    Output(#[from] std::io::Error),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("{0} job(s) failed validation")]
    Invalid(usize),

    #[error("Shutdown requested")]
    ShutdownRequested,
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Run(RunError::Config(err))
    }
}
