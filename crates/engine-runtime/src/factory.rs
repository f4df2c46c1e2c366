use async_trait::async_trait;
use connectors::{
    adapter::Adapter,
    sql::base::adapter::{DatabaseKind, SourceStore, TargetStore},
};
use engine_core::error::EngineError;
use std::sync::Arc;

/// Opens the per-job source and target connections.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    async fn source(
        &self,
        locator: &str,
        kind: DatabaseKind,
    ) -> Result<Arc<dyn SourceStore>, EngineError>;

    async fn target(&self, locator: &str) -> Result<Arc<dyn TargetStore>, EngineError>;
}

/// Real database connections through the driver adapters.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdapterFactory;

#[async_trait]
impl StoreFactory for AdapterFactory {
    async fn source(
        &self,
        locator: &str,
        kind: DatabaseKind,
    ) -> Result<Arc<dyn SourceStore>, EngineError> {
        let adapter = Adapter::connect(locator, Some(kind))
            .await
            .map_err(EngineError::from_adapter)?;
        Ok(adapter.into_source())
    }

    async fn target(&self, locator: &str) -> Result<Arc<dyn TargetStore>, EngineError> {
        Adapter::connect(locator, Some(DatabaseKind::Postgres))
            .await
            .and_then(Adapter::into_target)
            .map_err(EngineError::from_adapter)
    }
}
