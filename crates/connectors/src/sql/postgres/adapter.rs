use crate::sql::{
    base::{
        adapter::{DatabaseKind, SourceStore, TargetStore},
        encoder::CopyValueEncoder,
        error::{ConnectorError, DbError},
    },
    postgres::{
        encoder::PgCopyValueEncoder, params::PgParamStore, row::pg_row_to_data,
        utils::connect_client,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, pin_mut};
use model::{
    core::{column::ColumnDescriptor, entity::TableName},
    records::row::RowData,
};
use planner::query::{
    dialect::{Dialect, Postgres},
    pagination::FetchQuery,
    select::quote_list,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::Client;
use tracing::debug;

const QUERY_TABLE_COLUMNS_SQL: &str = include_str!("sql/table_columns.sql");

#[derive(Clone)]
pub struct PgAdapter {
    client: Arc<Mutex<Client>>,
}

impl PgAdapter {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let client = connect_client(url).await?;
        Ok(PgAdapter {
            client: Arc::new(Mutex::new(client)),
        })
    }

    fn copy_statement(table: &TableName, columns: &[String]) -> String {
        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT csv, NULL '\\N')",
            Postgres.qualified(table),
            quote_list(&Postgres, columns)
        )
    }
}

#[async_trait]
impl SourceStore for PgAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Postgres
    }

    async fn table_columns(&self, table: &TableName) -> Result<Vec<ColumnDescriptor>, DbError> {
        let client = self.client.lock().await;
        let rows = client
            .query(QUERY_TABLE_COLUMNS_SQL, &[&table.schema, &table.name])
            .await?;

        rows.iter()
            .map(|row| -> Result<ColumnDescriptor, DbError> {
                let mut col = ColumnDescriptor::new(row.try_get(0)?, row.try_get(1)?);
                col.is_nullable = row.try_get(2)?;
                col.char_max_length = row.try_get::<_, Option<i32>>(3)?.map(i64::from);
                Ok(col)
            })
            .collect()
    }

    async fn query_columns(&self, sql: &str) -> Result<Vec<ColumnDescriptor>, DbError> {
        let client = self.client.lock().await;
        let statement = client.prepare(sql).await?;
        Ok(statement
            .columns()
            .iter()
            .map(|c| ColumnDescriptor::new(c.name(), c.type_().name()))
            .collect())
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<RowData>, DbError> {
        debug!(sql = %query.sql, params = query.params.len(), "Postgres fetch");
        let client = self.client.lock().await;
        let statement = client.prepare(&query.sql).await?;
        let bindings = PgParamStore::for_statement(&query.params, statement.params())?;
        let rows = client.query(&statement, &bindings.as_refs()).await?;
        rows.iter().map(|row| pg_row_to_data("", row)).collect()
    }
}

#[async_trait]
impl TargetStore for PgAdapter {
    async fn execute_script(&self, sql: &str) -> Result<(), DbError> {
        let client = self.client.lock().await;
        client.batch_execute(sql).await?;
        Ok(())
    }

    async fn replace_table(&self, drop_sql: &str, create_sql: &str) -> Result<(), DbError> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await?;
        tx.batch_execute(drop_sql).await?;
        tx.batch_execute(create_sql).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn copy_rows(
        &self,
        table: &TableName,
        columns: &[String],
        rows: &[RowData],
    ) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let statement = Self::copy_statement(table, columns);
        let encoder = PgCopyValueEncoder::new();

        debug!("COPY statement: {}", statement);

        let mut client = self.client.lock().await;
        let tx = client.transaction().await?;
        let sink = tx.copy_in::<_, Bytes>(&statement).await?;
        pin_mut!(sink);

        for row in rows {
            let line = encoder.encode_row(row, columns);
            sink.as_mut().send(Bytes::from(line)).await?;
        }

        let written = sink.as_mut().finish().await?;
        tx.commit().await?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_statement_quotes_everything() {
        let table = TableName::new(Some("staging"), "customers");
        let sql = PgAdapter::copy_statement(&table, &["id".into(), "full_name".into()]);
        assert_eq!(
            sql,
            "COPY \"staging\".\"customers\" (\"id\", \"full_name\") FROM STDIN WITH (FORMAT csv, NULL '\\N')"
        );
    }
}
