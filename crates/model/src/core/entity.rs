use serde::{Deserialize, Serialize};
use std::fmt;

/// A possibly schema-qualified table name as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Splits on the first `.`: `dbo.Orders` becomes schema `dbo`, name `Orders`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.split_once('.') {
            Some((schema, name)) => Self::new(Some(schema.trim()), name.trim()),
            None => Self::new(None, text),
        }
    }

    pub fn with_default_schema(mut self, schema: &str) -> Self {
        if self.schema.is_none() {
            self.schema = Some(schema.to_string());
        }
        self
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// What a job reads from: a catalog table or a literal query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceEntity {
    Table(TableName),
    Query(String),
}

impl SourceEntity {
    /// Text starting with `SELECT` or `WITH` is a query; anything else names a table.
    pub fn parse(text: &str) -> Self {
        if is_sql_query(text) {
            SourceEntity::Query(strip_statement_terminator(text))
        } else {
            SourceEntity::Table(TableName::parse(text))
        }
    }

    /// Identity used in job keys and logs.
    pub fn label(&self) -> String {
        match self {
            SourceEntity::Table(table) => table.to_string(),
            SourceEntity::Query(sql) => sql.clone(),
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(self, SourceEntity::Query(_))
    }
}

pub fn is_sql_query(text: &str) -> bool {
    let head = text.trim_start().to_ascii_lowercase();
    head.starts_with("select") || head.starts_with("with")
}

/// A query is embedded as a derived table, so a trailing `;` must go.
pub fn strip_statement_terminator(sql: &str) -> String {
    sql.trim().trim_end_matches(';').trim_end().to_string()
}
