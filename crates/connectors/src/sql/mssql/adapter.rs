use crate::sql::{
    base::{
        adapter::{DatabaseKind, SourceStore},
        error::{ConnectorError, DbError},
    },
    mssql::{
        params::bind_all,
        row::mssql_row_to_data,
        utils::{MssqlClient, connect_client},
    },
};
use async_trait::async_trait;
use model::{
    core::{column::ColumnDescriptor, entity::TableName},
    records::row::RowData,
};
use planner::{query::pagination::FetchQuery, schema::typemap::split_type_name};
use std::sync::Arc;
use tiberius::Query;
use tokio::sync::Mutex;
use tracing::debug;

const QUERY_TABLE_COLUMNS_SQL: &str = include_str!("sql/table_columns.sql");
const QUERY_DESCRIBE_SQL: &str = include_str!("sql/describe_query.sql");

/// SQL Server as a migration source.
#[derive(Clone)]
pub struct MssqlAdapter {
    client: Arc<Mutex<MssqlClient>>,
}

impl MssqlAdapter {
    pub async fn connect(locator: &str) -> Result<Self, ConnectorError> {
        let client = connect_client(locator).await?;
        Ok(MssqlAdapter {
            client: Arc::new(Mutex::new(client)),
        })
    }
}

#[async_trait]
impl SourceStore for MssqlAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Mssql
    }

    async fn table_columns(&self, table: &TableName) -> Result<Vec<ColumnDescriptor>, DbError> {
        let mut query = Query::new(QUERY_TABLE_COLUMNS_SQL);
        query.bind(table.schema.clone());
        query.bind(table.name.clone());

        let mut client = self.client.lock().await;
        let rows = query.query(&mut *client).await?.into_first_result().await?;

        Ok(rows
            .iter()
            .map(|row| {
                let mut col = ColumnDescriptor::new(
                    row.get::<&str, _>(0).unwrap_or_default(),
                    row.get::<&str, _>(1).unwrap_or_default(),
                );
                col.is_nullable = row.get::<i32, _>(2).unwrap_or(1) == 1;
                col.char_max_length = row.get::<i32, _>(3).map(i64::from);
                col
            })
            .collect())
    }

    async fn query_columns(&self, sql: &str) -> Result<Vec<ColumnDescriptor>, DbError> {
        let mut query = Query::new(QUERY_DESCRIBE_SQL);
        query.bind(sql.to_string());

        let mut client = self.client.lock().await;
        let rows = query.query(&mut *client).await?.into_first_result().await?;

        rows.iter()
            .enumerate()
            .map(|(i, row)| -> Result<ColumnDescriptor, DbError> {
                let name = row
                    .get::<&str, _>(0)
                    .ok_or_else(|| DbError::Unknown(format!("query column {} has no name", i + 1)))?;
                let (data_type, max_len) =
                    split_type_name(row.get::<&str, _>(1).unwrap_or_default());
                let mut col = ColumnDescriptor::new(name, &data_type);
                col.is_nullable = row.get::<i32, _>(2).unwrap_or(1) == 1;
                col.char_max_length = max_len;
                Ok(col)
            })
            .collect()
    }

    async fn fetch(&self, fetch: &FetchQuery) -> Result<Vec<RowData>, DbError> {
        debug!(sql = %fetch.sql, params = fetch.params.len(), "SQL Server fetch");
        let mut query = Query::new(fetch.sql.as_str());
        bind_all(&mut query, &fetch.params);

        let mut client = self.client.lock().await;
        let rows = query.query(&mut *client).await?.into_first_result().await?;
        rows.into_iter()
            .map(|row| mssql_row_to_data("", row))
            .collect()
    }
}
