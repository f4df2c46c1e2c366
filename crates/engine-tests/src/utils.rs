use crate::fakes::{MemoryFactory, MemorySource, MemoryTarget, RecordingCheckpoints};
use engine_config::{FailurePolicy, MigrationConfig, RetrySettings};
use engine_core::{retry::RetryPolicy, state::CheckpointStore, transform::TransformRegistry};
use engine_runtime::{
    orchestrator::JobContext,
    report::RunSummary,
    scheduler::{JobGroup, Scheduler},
};
use chrono::{NaiveDate, TimeDelta};
use model::{
    core::{column::ColumnDescriptor, value::Value},
    records::row::RowData,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

pub const SOURCE_DB: &str = "Server=tcp:src,1433;Database=crm;User Id=sa;Password=secret";
pub const TARGET_DB: &str = "postgres://app:secret@pg/warehouse";

/// `Id` is unique; `Bucket` repeats every three rows.
pub fn people_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("Id", "int").not_null(),
        ColumnDescriptor::new("Bucket", "int").not_null(),
        ColumnDescriptor::new("Full Name", "nvarchar").with_max_length(40),
    ]
}

pub fn people(n: usize) -> Vec<RowData> {
    (0..n)
        .map(|i| {
            RowData::from_pairs(
                "People",
                [
                    ("Id", Value::Int(i as i64 + 1)),
                    ("Bucket", Value::Int(i as i64 / 3)),
                    ("Full Name", Value::from(format!("  person {} ", i + 1))),
                ],
            )
        })
        .collect()
}

/// `Id` is unique; `OccurredAt` advances one SQL Server `datetime` tick
/// (1/300 s) every two rows, so the stored text carries nine fractional digits.
pub fn event_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("Id", "int").not_null(),
        ColumnDescriptor::new("OccurredAt", "datetime").not_null(),
        ColumnDescriptor::new("Kind", "nvarchar").with_max_length(20),
    ]
}

pub fn events(n: usize) -> Vec<RowData> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(10, 0, 0))
        .expect("valid start time");
    (0..n)
        .map(|i| {
            let at = start + TimeDelta::nanoseconds(3_333_333 * (i as i64 / 2));
            RowData::from_pairs(
                "Events",
                [
                    ("Id", Value::Int(i as i64 + 1)),
                    ("OccurredAt", Value::Timestamp(at)),
                    ("Kind", Value::from(if i % 2 == 0 { "login" } else { "logout" })),
                ],
            )
        })
        .collect()
}

pub struct Harness {
    pub source: Arc<MemorySource>,
    pub target: Arc<MemoryTarget>,
    pub factory: Arc<MemoryFactory>,
    pub checkpoints: Arc<RecordingCheckpoints>,
}

impl Harness {
    pub fn new(source: MemorySource) -> Self {
        let source = Arc::new(source);
        let target = Arc::new(MemoryTarget::new());
        Self {
            factory: Arc::new(MemoryFactory::new(source.clone(), target.clone())),
            source,
            target,
            checkpoints: Arc::new(RecordingCheckpoints::new()),
        }
    }

    pub fn people(n: usize) -> Self {
        Self::new(MemorySource::new(people_columns(), people(n)).with_keyset("Bucket", "Id"))
    }

    /// Rebuilds the factory so every connection takes `delay` to open.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.factory = Arc::new(
            MemoryFactory::new(self.source.clone(), self.target.clone()).with_connect_delay(delay),
        );
        self
    }

    pub fn context(&self) -> JobContext {
        self.context_with(self.checkpoints.clone())
    }

    pub fn context_with(&self, checkpoints: Arc<dyn CheckpointStore>) -> JobContext {
        JobContext {
            factory: self.factory.clone(),
            checkpoints,
            registry: Arc::new(TransformRegistry::with_builtins()),
            retry: immediate_retries(3),
            cancel: CancellationToken::new(),
        }
    }

    pub async fn run(&self, config: &MigrationConfig) -> RunSummary {
        self.run_with(self.context(), config).await
    }

    pub async fn run_with(&self, ctx: JobContext, config: &MigrationConfig) -> RunSummary {
        Scheduler::new(ctx, config.settings.on_job_failure)
            .run(JobGroup::from_config(config))
            .await
    }

    pub fn target_ids(&self, table: &str) -> Vec<i64> {
        self.target
            .rows(table)
            .iter()
            .filter_map(|row| row.get_value("id").as_i64())
            .collect()
    }
}

pub fn immediate_retries(attempts: usize) -> RetrySettings {
    RetrySettings {
        fetch: RetryPolicy::immediate(attempts),
        insert: RetryPolicy::immediate(attempts),
        checkpoint: RetryPolicy::immediate(attempts),
    }
}

/// One group named `crm` holding the given table entries (YAML list items,
/// indented six spaces).
pub fn config(batch_size: usize, tables: &str) -> MigrationConfig {
    config_with_policy(batch_size, FailurePolicy::Continue, tables)
}

pub fn config_with_policy(batch_size: usize, policy: FailurePolicy, tables: &str) -> MigrationConfig {
    let mut config = MigrationConfig::from_yaml(&format!(
        "settings:\n  batch_size: {batch_size}\ndatabases:\n  - name: crm\n    source_db: \"{SOURCE_DB}\"\n    target_db: {TARGET_DB}\n    tables:\n{tables}"
    ))
    .expect("valid test configuration");
    config.settings.on_job_failure = policy;
    config
}
