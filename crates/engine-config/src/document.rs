use crate::{error::ConfigError, job::JobDescriptor, vars};
use connectors::sql::base::adapter::DatabaseKind;
use engine_core::retry::RetryPolicy;
use model::core::entity::TableName;
use planner::query::pagination::{PaginationMode, SortOrder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_CHECKPOINT_FILE: &str = "migration_checkpoints.json";

/// The whole configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub batch_size: usize,
    pub checkpoint_file: PathBuf,
    pub on_job_failure: FailurePolicy,
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            checkpoint_file: PathBuf::from(DEFAULT_CHECKPOINT_FILE),
            on_job_failure: FailurePolicy::default(),
            retry: RetrySettings::default(),
        }
    }
}

/// What happens to sibling jobs when one job fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Every job runs to its own end; failures are collected.
    #[default]
    Continue,
    /// Remaining jobs of the failing group are cancelled; later groups run.
    AbortGroup,
    /// Everything still running or queued is cancelled.
    AbortRun,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub fetch: RetryPolicy,
    pub insert: RetryPolicy,
    pub checkpoint: RetryPolicy,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            fetch: RetryPolicy::for_fetch(),
            insert: RetryPolicy::for_insert(),
            checkpoint: RetryPolicy::for_checkpoint(),
        }
    }
}

/// A database group: one source, one target, many jobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub name: String,
    pub source_db: String,
    pub target_db: String,
    #[serde(default)]
    pub source_driver: Option<DatabaseKind>,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

impl DatabaseConfig {
    pub fn source_kind(&self) -> DatabaseKind {
        self.source_driver
            .unwrap_or_else(|| DatabaseKind::detect(&self.source_db))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationSetting {
    #[default]
    Auto,
    Offset,
    Keyset,
    SingleShot,
}

impl PaginationSetting {
    pub fn mode(self) -> Option<PaginationMode> {
        match self {
            PaginationSetting::Auto => None,
            PaginationSetting::Offset => Some(PaginationMode::Offset),
            PaginationSetting::Keyset => Some(PaginationMode::Keyset),
            PaginationSetting::SingleShot => Some(PaginationMode::SingleShot),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformsConfig {
    #[serde(default)]
    pub plugins: Vec<String>,
}

/// One job as written in the document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_file: Option<PathBuf>,
    pub dest: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default, rename = "where")]
    pub filter: Option<String>,
    #[serde(default)]
    pub sort_columns: Vec<String>,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub pagination: PaginationSetting,
    #[serde(default)]
    pub transforms: TransformsConfig,
    #[serde(default)]
    pub pre_ddl_file: Option<PathBuf>,
    #[serde(default)]
    pub post_ddl_file: Option<PathBuf>,
    #[serde(default = "enabled")]
    pub recreate: bool,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

fn enabled() -> bool {
    true
}

impl MigrationConfig {
    /// Reads, interpolates and parses a configuration file. Relative paths in
    /// jobs resolve against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let interpolated = vars::interpolate(&text);
        if !interpolated.errors.is_empty() {
            return Err(ConfigError::Env(interpolated.errors));
        }

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::from_yaml(&interpolated.text)?.rebased(base_dir);
        debug!(
            file = %path.display(),
            groups = config.databases.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses already-interpolated YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    fn rebased(mut self, base_dir: &Path) -> Self {
        let rebase = |p: &mut Option<PathBuf>| {
            if let Some(path) = p.as_mut().filter(|p| p.is_relative()) {
                *path = base_dir.join(&*path);
            }
        };
        for db in &mut self.databases {
            for table in &mut db.tables {
                rebase(&mut table.source_file);
                rebase(&mut table.pre_ddl_file);
                rebase(&mut table.post_ddl_file);
            }
        }
        self
    }

    /// Job descriptors per group, in document order, disabled ones included.
    pub fn groups(&self) -> Vec<(&DatabaseConfig, Vec<JobDescriptor>)> {
        self.databases
            .iter()
            .map(|db| {
                let jobs = db
                    .tables
                    .iter()
                    .map(|table| JobDescriptor::new(db, table, &self.settings))
                    .collect();
                (db, jobs)
            })
            .collect()
    }

    pub fn jobs(&self) -> Vec<JobDescriptor> {
        self.groups().into_iter().flat_map(|(_, jobs)| jobs).collect()
    }
}

impl TableConfig {
    pub fn dest_table(&self) -> TableName {
        TableName::parse(&self.dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const DOC: &str = r#"
settings:
  batch_size: 2
  on_job_failure: abort_group
  retry:
    fetch: { max_attempts: 2, base_delay_ms: 10, max_delay_ms: 20 }
databases:
  - name: crm
    source_db: "Server=tcp:db,1433;Database=crm;User Id=sa;Password=x"
    target_db: postgres://app@pg/warehouse
    tables:
      - source: dbo.Customers
        dest: staging.customers
        columns: [CustomerId, Name]
        where: "Active = 1"
        sort_columns: [CustomerId]
        transforms: { plugins: [builtin.trim_strings] }
      - source_file: queries/orders.sql
        dest: orders
        sort_columns: [OrderDate, OrderId]
        order: desc
        recreate: false
  - name: shop
    source_db: mysql://root@shop/shop
    target_db: postgres://app@pg/warehouse
    enabled: false
"#;

    #[test]
    fn parses_document() {
        let config = MigrationConfig::from_yaml(DOC).unwrap();
        assert_eq!(config.settings.batch_size, 2);
        assert_eq!(config.settings.on_job_failure, FailurePolicy::AbortGroup);
        assert_eq!(config.settings.retry.fetch.max_attempts, 2);
        assert_eq!(config.settings.retry.fetch.base_delay, Duration::from_millis(10));
        assert_eq!(config.settings.retry.insert, RetryPolicy::for_insert());

        let crm = &config.databases[0];
        assert_eq!(crm.source_kind(), DatabaseKind::Mssql);
        assert_eq!(crm.tables[0].filter.as_deref(), Some("Active = 1"));
        assert!(crm.tables[0].recreate);
        assert!(!crm.tables[1].recreate);
        assert_eq!(crm.tables[1].order, SortOrder::Desc);

        assert_eq!(config.databases[1].source_kind(), DatabaseKind::MySql);
        assert!(!config.databases[1].enabled);
    }

    #[test]
    fn defaults_apply_to_empty_settings() {
        let config = MigrationConfig::from_yaml("databases: []").unwrap();
        assert_eq!(config.settings.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.settings.on_job_failure, FailurePolicy::Continue);
        assert_eq!(
            config.settings.checkpoint_file,
            PathBuf::from(DEFAULT_CHECKPOINT_FILE)
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = MigrationConfig::from_yaml("settings: { batchsize: 10 }").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn load_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrate.yaml");
        std::fs::write(&path, DOC).unwrap();

        let config = MigrationConfig::load(&path).unwrap();
        assert_eq!(
            config.databases[0].tables[1].source_file.as_deref(),
            Some(dir.path().join("queries/orders.sql").as_path())
        );
    }

    #[test]
    fn load_reports_missing_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrate.yaml");
        std::fs::write(
            &path,
            "databases:\n  - name: x\n    source_db: ${SLUICE_TEST_UNSET_SOURCE}\n    target_db: postgres://h/db\n",
        )
        .unwrap();

        match MigrationConfig::load(&path) {
            Err(ConfigError::Env(errors)) => {
                assert!(errors[0].contains("SLUICE_TEST_UNSET_SOURCE"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
