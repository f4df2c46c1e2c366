use crate::sql::{
    base::{
        adapter::{DatabaseKind, SourceStore},
        error::{ConnectorError, DbError},
    },
    mysql::{
        params::MySqlParamStore,
        row::{mysql_row_to_data, mysql_type_name},
    },
};
use async_trait::async_trait;
use model::{
    core::{column::ColumnDescriptor, entity::TableName},
    records::row::RowData,
};
use mysql_async::{Opts, Pool, Row, prelude::Queryable};
use planner::query::pagination::FetchQuery;
use tracing::debug;

const QUERY_TABLE_COLUMNS_SQL: &str = include_str!("sql/table_columns.sql");

/// MySQL as a migration source.
#[derive(Clone)]
pub struct MySqlAdapter {
    pool: Pool,
}

impl MySqlAdapter {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let opts = Opts::from_url(url).map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
        let pool = Pool::new(opts);
        // Fail at connect time rather than on the first fetch.
        let conn = pool.get_conn().await?;
        drop(conn);
        Ok(MySqlAdapter { pool })
    }
}

#[async_trait]
impl SourceStore for MySqlAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }

    async fn table_columns(&self, table: &TableName) -> Result<Vec<ColumnDescriptor>, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<(String, String, i64, Option<i64>)> = conn
            .exec(
                QUERY_TABLE_COLUMNS_SQL,
                (table.schema.clone(), table.name.clone()),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type, nullable, max_len)| {
                let mut col = ColumnDescriptor::new(&name, &data_type);
                col.is_nullable = nullable == 1;
                col.char_max_length = max_len;
                col
            })
            .collect())
    }

    async fn query_columns(&self, sql: &str) -> Result<Vec<ColumnDescriptor>, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let statement = conn.prep(sql).await?;
        let columns = statement
            .columns()
            .iter()
            .map(|c| ColumnDescriptor::new(&c.name_str(), mysql_type_name(c)))
            .collect();
        conn.close(statement).await?;
        Ok(columns)
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<RowData>, DbError> {
        debug!(sql = %query.sql, params = query.params.len(), "MySQL fetch");
        let mut conn = self.pool.get_conn().await?;
        let params = MySqlParamStore::from_values(&query.params);
        let rows: Vec<Row> = conn.exec(query.sql.as_str(), params.params()).await?;
        rows.iter().map(|row| mysql_row_to_data("", row)).collect()
    }
}
