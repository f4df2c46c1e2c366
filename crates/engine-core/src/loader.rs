use crate::error::EngineError;
use connectors::sql::base::{
    adapter::TargetStore,
    classify::{FailureKind, classify_db_error},
    error::DbError,
};
use model::{
    core::entity::TableName,
    records::row::{FieldValue, RowData},
};
use planner::schema::ident::normalize_identifier;
use std::{collections::HashSet, sync::Arc};
use tracing::debug;

/// Writes chunks into one target table with a single bulk copy per chunk.
pub struct BulkLoader {
    target: Arc<dyn TargetStore>,
    table: TableName,
    known_columns: Option<HashSet<String>>,
}

impl BulkLoader {
    pub fn new(target: Arc<dyn TargetStore>, table: TableName) -> Self {
        Self {
            target,
            table,
            known_columns: None,
        }
    }

    /// Columns the target table was created with; rows carrying anything
    /// else are rejected before reaching the database.
    pub fn with_known_columns(mut self, columns: Vec<String>) -> Self {
        self.known_columns = Some(columns.into_iter().collect());
        self
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub async fn insert(&self, rows: &[RowData]) -> Result<u64, EngineError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let (columns, rows) = self.normalize(rows)?;
        debug!(table = %self.table, rows = rows.len(), "Copying chunk");

        self.target
            .copy_rows(&self.table, &columns, &rows)
            .await
            .map_err(insert_error)
    }

    /// Renames fields to their target identifiers and checks every row has
    /// the same shape as the first.
    fn normalize(&self, rows: &[RowData]) -> Result<(Vec<String>, Vec<RowData>), EngineError> {
        let mismatch = |msg: String| EngineError::SchemaMismatch(format!("{}: {msg}", self.table));

        let columns = rows[0]
            .columns()
            .into_iter()
            .map(|c| normalize_identifier(c).map_err(|e| mismatch(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(known) = &self.known_columns {
            if let Some(extra) = columns.iter().find(|c| !known.contains(*c)) {
                return Err(mismatch(format!("column '{extra}' does not exist in target")));
            }
        }

        let normalized = rows
            .iter()
            .enumerate()
            .map(|(i, row)| -> Result<RowData, EngineError> {
                if row.len() != columns.len() {
                    return Err(mismatch(format!(
                        "row {i} has {} columns, expected {}",
                        row.len(),
                        columns.len()
                    )));
                }
                let fields = row
                    .field_values
                    .iter()
                    .zip(&columns)
                    .map(|(field, expected)| -> Result<FieldValue, EngineError> {
                        let name =
                            normalize_identifier(&field.name).map_err(|e| mismatch(e.to_string()))?;
                        if &name != expected {
                            return Err(mismatch(format!(
                                "row {i} has column '{name}' where '{expected}' was expected"
                            )));
                        }
                        Ok(FieldValue::new(&name, field.value.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(RowData::new(&row.entity, fields))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((columns, normalized))
    }
}

/// Everything but a shape disagreement is worth another attempt.
fn insert_error(err: DbError) -> EngineError {
    match classify_db_error(&err) {
        FailureKind::SchemaMismatch => EngineError::SchemaMismatch(err.to_string()),
        FailureKind::Transient | FailureKind::Fatal => EngineError::TransientIo(err.to_string()),
    }
}
