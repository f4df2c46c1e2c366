pub mod error;
pub mod factory;
pub mod orchestrator;
pub mod report;
pub mod scheduler;
