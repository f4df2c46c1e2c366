use crate::{
    document::{DatabaseConfig, Settings, TableConfig},
    error::ConfigError,
};
use connectors::sql::base::adapter::DatabaseKind;
use model::core::{
    entity::{SourceEntity, TableName, strip_statement_terminator},
    identifiers::JobKey,
};
use planner::{
    error::PlanError,
    query::{
        pagination::{PaginationMode, PaginationStrategy, SortOrder, select_strategy},
        select::{RelationSpec, base_relation},
    },
};
use std::path::PathBuf;

/// Where a job's rows come from, as configured.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRef {
    Inline(String),
    File(PathBuf),
}

/// Immutable description of one migration job.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub group: String,
    pub source_db: String,
    pub target_db: String,
    pub source_kind: DatabaseKind,
    pub source: Option<String>,
    pub source_file: Option<PathBuf>,
    pub dest: TableName,
    pub columns: Vec<String>,
    pub group_by: Vec<String>,
    pub filter: Option<String>,
    pub sort_columns: Vec<String>,
    pub order: SortOrder,
    pub pagination: Option<PaginationMode>,
    pub transforms: Vec<String>,
    pub pre_ddl_file: Option<PathBuf>,
    pub post_ddl_file: Option<PathBuf>,
    pub recreate: bool,
    pub enabled: bool,
    pub batch_size: usize,
}

impl JobDescriptor {
    pub fn new(db: &DatabaseConfig, table: &TableConfig, settings: &Settings) -> Self {
        Self {
            group: db.name.clone(),
            source_db: db.source_db.clone(),
            target_db: db.target_db.clone(),
            source_kind: db.source_kind(),
            source: table.source.clone(),
            source_file: table.source_file.clone(),
            dest: table.dest_table(),
            columns: table.columns.clone(),
            group_by: table.group_by.clone(),
            filter: table.filter.clone(),
            sort_columns: table.sort_columns.clone(),
            order: table.order,
            pagination: table.pagination.mode(),
            transforms: table.transforms.plugins.clone(),
            pre_ddl_file: table.pre_ddl_file.clone(),
            post_ddl_file: table.post_ddl_file.clone(),
            recreate: table.recreate,
            enabled: db.enabled && table.enabled,
            batch_size: table.batch_size.unwrap_or(settings.batch_size),
        }
    }

    /// Human-readable identity for logs and errors; carries no locator.
    pub fn label(&self) -> String {
        format!("{}/{}", self.group, self.dest)
    }

    fn source_ref(&self) -> Result<SourceRef, ConfigError> {
        let job = self.label();
        match (&self.source, &self.source_file) {
            (Some(_), Some(_)) => Err(ConfigError::SourceConflict { job }),
            (None, None) => Err(ConfigError::MissingSource { job }),
            (Some(text), None) if text.trim().is_empty() => Err(ConfigError::MissingSource { job }),
            (Some(text), None) => Ok(SourceRef::Inline(text.clone())),
            (None, Some(path)) => Ok(SourceRef::File(path.clone())),
        }
    }

    /// Checks everything that can be checked without touching a database and
    /// fixes the job's pagination strategy and base relation.
    pub fn validate(&self) -> Result<ValidatedJob, ConfigError> {
        let (entity, entity_label) = match self.source_ref()? {
            SourceRef::Inline(text) => {
                let entity = SourceEntity::parse(&text);
                let label = entity.label();
                (entity, label)
            }
            SourceRef::File(path) => {
                let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                let label = path.display().to_string();
                (SourceEntity::Query(strip_statement_terminator(&text)), label)
            }
        };

        if self.dest.name.trim().is_empty() {
            return Err(ConfigError::MissingDestination { job: self.label() });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::BatchSize { job: self.label() });
        }

        let target_kind = DatabaseKind::detect(&self.target_db);
        if target_kind != DatabaseKind::Postgres {
            return Err(ConfigError::UnsupportedTarget {
                job: self.label(),
                kind: target_kind,
            });
        }

        let plan_err = |source: PlanError| ConfigError::Plan {
            job: self.label(),
            source,
        };

        let base_sql = base_relation(
            self.source_kind.dialect(),
            &RelationSpec {
                entity: &entity,
                columns: &self.columns,
                filter: self.filter.as_deref(),
                group_by: &self.group_by,
            },
        )
        .map_err(plan_err)?;

        let strategy =
            select_strategy(&self.sort_columns, self.order, self.pagination).map_err(plan_err)?;

        let key = JobKey::derive(
            &self.source_db,
            &self.target_db,
            &entity_label,
            &self.dest.to_string(),
        );

        Ok(ValidatedJob {
            descriptor: self.clone(),
            key,
            entity,
            base_sql,
            strategy,
        })
    }
}

/// A job that passed validation, with everything derived from it.
#[derive(Clone)]
pub struct ValidatedJob {
    pub descriptor: JobDescriptor,
    pub key: JobKey,
    pub entity: SourceEntity,
    /// Unpaginated source `SELECT` in the source's dialect.
    pub base_sql: String,
    pub strategy: Box<dyn PaginationStrategy>,
}

impl ValidatedJob {
    pub fn mode(&self) -> PaginationMode {
        self.strategy.mode()
    }
}

impl std::fmt::Debug for ValidatedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedJob")
            .field("key", &self.key)
            .field("dest", &self.descriptor.dest)
            .field("mode", &self.mode())
            .field("base_sql", &self.base_sql)
            .finish()
    }
}
