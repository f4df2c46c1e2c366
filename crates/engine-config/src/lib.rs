pub mod document;
pub mod error;
pub mod job;
pub mod vars;

pub use document::{DatabaseConfig, FailurePolicy, MigrationConfig, RetrySettings, Settings, TableConfig};
pub use error::ConfigError;
pub use job::{JobDescriptor, ValidatedJob};
