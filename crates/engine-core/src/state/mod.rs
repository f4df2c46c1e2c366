use crate::error::CheckpointError;
use async_trait::async_trait;
use model::{core::identifiers::JobKey, pagination::position::ResumePosition};
use std::collections::BTreeMap;

pub mod file_store;
pub mod memory_store;

pub use file_store::FileCheckpointStore;
pub use memory_store::MemoryCheckpointStore;

/// Durable per-job resume positions.
///
/// `get` never fails: anything short of a readable entry means "start fresh".
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, key: &JobKey) -> ResumePosition;

    async fn set(&self, key: &JobKey, position: &ResumePosition) -> Result<(), CheckpointError>;

    /// Every stored entry, keyed by job key.
    async fn entries(&self) -> Result<BTreeMap<String, ResumePosition>, CheckpointError>;

    async fn clear(&self, key: &JobKey) -> Result<(), CheckpointError> {
        self.set(key, &ResumePosition::FRESH).await
    }
}
