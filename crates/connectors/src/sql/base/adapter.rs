use crate::sql::base::error::DbError;
use async_trait::async_trait;
use model::{
    core::{column::ColumnDescriptor, entity::TableName},
    records::row::RowData,
};
use planner::query::{
    dialect::{self, Dialect},
    pagination::FetchQuery,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[serde(alias = "sqlserver")]
    Mssql,
    #[serde(alias = "postgresql")]
    Postgres,
    MySql,
}

impl DatabaseKind {
    /// Infers the driver from a locator: URL schemes for PostgreSQL and
    /// MySQL, anything else is taken as a SQL Server connection string.
    pub fn detect(locator: &str) -> Self {
        let lower = locator.trim_start().to_ascii_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            DatabaseKind::Postgres
        } else if lower.starts_with("mysql://") {
            DatabaseKind::MySql
        } else {
            DatabaseKind::Mssql
        }
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            DatabaseKind::Mssql => &dialect::SqlServer,
            DatabaseKind::Postgres => &dialect::Postgres,
            DatabaseKind::MySql => &dialect::MySql,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::Mssql => "mssql",
            DatabaseKind::Postgres => "postgres",
            DatabaseKind::MySql => "mysql",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mssql" | "sqlserver" => Ok(DatabaseKind::Mssql),
            "postgres" | "postgresql" => Ok(DatabaseKind::Postgres),
            "mysql" => Ok(DatabaseKind::MySql),
            other => Err(format!("unsupported driver '{other}'")),
        }
    }
}

/// Read side of a migration.
#[async_trait]
pub trait SourceStore: Send + Sync {
    fn kind(&self) -> DatabaseKind;

    fn dialect(&self) -> &dyn Dialect {
        self.kind().dialect()
    }

    /// Catalog columns of a table in ordinal order. A table without a schema
    /// is looked up in the connection's default schema.
    async fn table_columns(&self, table: &TableName) -> Result<Vec<ColumnDescriptor>, DbError>;

    /// Result-set columns of a query, without running it.
    async fn query_columns(&self, sql: &str) -> Result<Vec<ColumnDescriptor>, DbError>;

    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<RowData>, DbError>;
}

/// Write side of a migration.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Runs a script verbatim; it may contain several statements.
    async fn execute_script(&self, sql: &str) -> Result<(), DbError>;

    /// Drops and recreates a table inside one transaction.
    async fn replace_table(&self, drop_sql: &str, create_sql: &str) -> Result<(), DbError>;

    /// Writes `rows` in one bulk operation and one transaction, taking
    /// `columns` from each row in order. Returns the number of rows written.
    async fn copy_rows(
        &self,
        table: &TableName,
        columns: &[String],
        rows: &[RowData],
    ) -> Result<u64, DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_driver_from_locator() {
        assert_eq!(DatabaseKind::detect("postgres://u@h/db"), DatabaseKind::Postgres);
        assert_eq!(DatabaseKind::detect("PostgreSQL://u@h/db"), DatabaseKind::Postgres);
        assert_eq!(DatabaseKind::detect("mysql://u@h/db"), DatabaseKind::MySql);
        assert_eq!(
            DatabaseKind::detect("server=tcp:h,1433;database=crm;user=sa;password=x"),
            DatabaseKind::Mssql
        );
    }

    #[test]
    fn parses_driver_names() {
        assert_eq!("SqlServer".parse::<DatabaseKind>(), Ok(DatabaseKind::Mssql));
        assert!("oracle".parse::<DatabaseKind>().is_err());
    }
}
