use crate::{
    error::AdapterError,
    sql::{
        base::adapter::{DatabaseKind, SourceStore, TargetStore},
        mssql::adapter::MssqlAdapter,
        mysql::adapter::MySqlAdapter,
        postgres::adapter::PgAdapter,
    },
};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub enum Adapter {
    Mssql(MssqlAdapter),
    MySql(MySqlAdapter),
    Postgres(PgAdapter),
}

impl Adapter {
    /// Connects with an explicit driver, or the one inferred from `locator`.
    pub async fn connect(locator: &str, kind: Option<DatabaseKind>) -> Result<Self, AdapterError> {
        let kind = kind.unwrap_or_else(|| DatabaseKind::detect(locator));
        debug!(driver = %kind, "Opening connection");
        match kind {
            DatabaseKind::Mssql => Ok(Adapter::Mssql(MssqlAdapter::connect(locator).await?)),
            DatabaseKind::MySql => Ok(Adapter::MySql(MySqlAdapter::connect(locator).await?)),
            DatabaseKind::Postgres => Ok(Adapter::Postgres(PgAdapter::connect(locator).await?)),
        }
    }

    pub fn kind(&self) -> DatabaseKind {
        match self {
            Adapter::Mssql(_) => DatabaseKind::Mssql,
            Adapter::MySql(_) => DatabaseKind::MySql,
            Adapter::Postgres(_) => DatabaseKind::Postgres,
        }
    }

    pub fn into_source(self) -> Arc<dyn SourceStore> {
        match self {
            Adapter::Mssql(adapter) => Arc::new(adapter),
            Adapter::MySql(adapter) => Arc::new(adapter),
            Adapter::Postgres(adapter) => Arc::new(adapter),
        }
    }

    pub fn into_target(self) -> Result<Arc<dyn TargetStore>, AdapterError> {
        match self {
            Adapter::Postgres(adapter) => Ok(Arc::new(adapter)),
            other => Err(AdapterError::UnsupportedTarget(other.kind())),
        }
    }
}
