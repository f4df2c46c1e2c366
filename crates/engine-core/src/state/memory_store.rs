use crate::{error::CheckpointError, state::CheckpointStore};
use async_trait::async_trait;
use model::{core::identifiers::JobKey, pagination::position::ResumePosition};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Process-local checkpoint store, for dry runs and tests.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<BTreeMap<String, ResumePosition>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, key: &JobKey) -> ResumePosition {
        self.entries
            .lock()
            .await
            .get(key.as_str())
            .cloned()
            .unwrap_or_default()
    }

    async fn set(&self, key: &JobKey, position: &ResumePosition) -> Result<(), CheckpointError> {
        self.entries
            .lock()
            .await
            .insert(key.as_str().to_string(), position.clone());
        Ok(())
    }

    async fn entries(&self) -> Result<BTreeMap<String, ResumePosition>, CheckpointError> {
        Ok(self.entries.lock().await.clone())
    }
}
