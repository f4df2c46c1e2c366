use crate::error::EngineError;
use connectors::sql::base::adapter::SourceStore;
use model::core::{
    column::ColumnDescriptor,
    entity::{SourceEntity, TableName},
};
use planner::schema::ddl::{
    ColumnDef, create_table_sql, drop_table_sql, select_columns, target_table, translate_columns,
};
use tracing::debug;

/// Target DDL for one job, ready for the schema-setup step.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePlan {
    pub table: TableName,
    pub columns: Vec<ColumnDef>,
    pub create_sql: String,
    pub drop_sql: String,
}

impl TablePlan {
    /// Builds the plan from source column metadata. Pure text generation.
    pub fn from_columns(
        available: Vec<ColumnDescriptor>,
        requested: &[String],
        dest: &TableName,
    ) -> Result<Self, EngineError> {
        let selected = select_columns(available, requested)?;
        let columns = translate_columns(&selected)?;
        let table = target_table(dest)?;
        Ok(Self {
            create_sql: create_table_sql(&table, &columns),
            drop_sql: drop_table_sql(&table),
            table,
            columns,
        })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Reads source metadata and turns it into target DDL.
pub struct SchemaTranslator<'a> {
    source: &'a dyn SourceStore,
}

impl<'a> SchemaTranslator<'a> {
    pub fn new(source: &'a dyn SourceStore) -> Self {
        Self { source }
    }

    /// Column metadata in declared order: the catalog for tables, the
    /// result-set description for queries.
    pub async fn describe(&self, entity: &SourceEntity) -> Result<Vec<ColumnDescriptor>, EngineError> {
        let columns = match entity {
            SourceEntity::Table(table) => self.source.table_columns(table).await,
            SourceEntity::Query(sql) => self.source.query_columns(sql).await,
        }
        .map_err(EngineError::schema_from_db)?;

        if columns.is_empty() {
            return Err(EngineError::Schema(format!(
                "source '{}' has no visible columns",
                entity.label()
            )));
        }
        Ok(columns)
    }

    pub async fn translate(
        &self,
        entity: &SourceEntity,
        requested: &[String],
        dest: &TableName,
    ) -> Result<TablePlan, EngineError> {
        let available = self.describe(entity).await?;
        let plan = TablePlan::from_columns(available, requested, dest)?;
        debug!(table = %plan.table, ddl = %plan.create_sql, "Translated target DDL");
        Ok(plan)
    }
}
