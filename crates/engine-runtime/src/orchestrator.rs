use crate::{
    factory::StoreFactory,
    report::{JobFailure, JobReport, JobState},
};
use connectors::sql::base::adapter::{SourceStore, TargetStore};
use engine_config::{JobDescriptor, RetrySettings, ValidatedJob};
use engine_core::{
    error::EngineError,
    loader::BulkLoader,
    retry::{RetryError, classify_engine_error},
    schema::SchemaTranslator,
    state::CheckpointStore,
    transform::{TransformChain, TransformRegistry},
};
use model::{core::entity::TableName, pagination::position::ResumePosition};
use planner::schema::ddl::target_table;
use std::{path::Path, sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything a job borrows from the run it belongs to.
#[derive(Clone)]
pub struct JobContext {
    pub factory: Arc<dyn StoreFactory>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub registry: Arc<TransformRegistry>,
    pub retry: RetrySettings,
    pub cancel: CancellationToken,
}

/// Drives one job from `Init` to `Completed` or `Failed`.
pub struct JobOrchestrator {
    ctx: JobContext,
    report: JobReport,
    started: Instant,
}

/// State carried from `Init` into the later steps.
struct Prepared {
    job: ValidatedJob,
    chain: TransformChain,
    table: TableName,
    position: ResumePosition,
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
}

impl JobOrchestrator {
    pub fn new(ctx: JobContext, descriptor: &JobDescriptor) -> Self {
        Self {
            ctx,
            report: JobReport::new(descriptor.label(), descriptor.dest.clone()),
            started: Instant::now(),
        }
    }

    pub async fn run(mut self, descriptor: JobDescriptor) -> JobReport {
        let result = self.drive(descriptor).await;
        self.report.elapsed = self.started.elapsed();

        match result {
            Ok(()) => {
                self.report.state = JobState::Completed;
                info!(
                    job = %self.report.label,
                    rows = self.report.rows_written,
                    chunks = self.report.chunks,
                    elapsed_ms = self.report.elapsed.as_millis() as u64,
                    "Job completed"
                );
            }
            Err(err) => {
                let failed_in = self.report.state;
                self.report.state = JobState::Failed;
                if matches!(err, EngineError::Cancelled) {
                    warn!(job = %self.report.label, state = %failed_in, "Job cancelled");
                } else {
                    error!(
                        job = %self.report.label,
                        state = %failed_in,
                        kind = err.kind(),
                        checkpoint = ?self.report.checkpoint,
                        error = %err,
                        "Job failed"
                    );
                }
                self.report.error = Some(JobFailure {
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
        }
        self.report
    }

    fn enter(&mut self, state: JobState) {
        self.report.state = state;
        info!(job = %self.report.label, %state, "Job state");
    }

    async fn drive(&mut self, descriptor: JobDescriptor) -> Result<(), EngineError> {
        let prepared = self.init(descriptor).await?;
        self.ensure_running()?;

        let known_columns = if prepared.position.is_fresh() && prepared.job.descriptor.recreate {
            self.enter(JobState::SchemaSetup);
            Some(self.schema_setup(&prepared).await?)
        } else {
            if !prepared.position.is_fresh() {
                info!(
                    job = %self.report.label,
                    position = %prepared.position,
                    "Resuming, target table kept"
                );
            }
            None
        };

        self.enter(JobState::Paging);
        self.page(&prepared, known_columns).await?;

        self.enter(JobState::Draining);
        if prepared.job.strategy.is_resumable() {
            self.ctx
                .checkpoints
                .set(&prepared.job.key, &ResumePosition::FRESH)
                .await?;
            self.report.checkpoint = Some(ResumePosition::FRESH);
        }
        Ok(())
    }

    async fn init(&mut self, descriptor: JobDescriptor) -> Result<Prepared, EngineError> {
        self.enter(JobState::Init);

        let job = descriptor
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        self.report.key = Some(job.key.clone());
        self.report.mode = Some(job.mode());

        let chain = self.ctx.registry.resolve(&job.descriptor.transforms)?;
        let table = target_table(&job.descriptor.dest)?;
        self.report.dest = table.clone();

        let position = if job.strategy.is_resumable() {
            let position = self.ctx.checkpoints.get(&job.key).await;
            job.strategy.check_position(&position)?;
            position
        } else {
            warn!(
                job = %self.report.label,
                "No sort columns: fetching all rows in one unordered read; \
                 row order is non-deterministic and this job cannot resume"
            );
            ResumePosition::FRESH
        };
        self.report.checkpoint = Some(position.clone());

        debug!(job = %job.key, base = %job.base_sql, mode = %job.mode(), "Job validated");

        self.ensure_running()?;
        let source = self.connect_source(&job).await?;
        let target = self.connect_target(&job).await?;

        Ok(Prepared {
            job,
            chain,
            table,
            position,
            source,
            target,
        })
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.ctx.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    async fn connect_source(&self, job: &ValidatedJob) -> Result<Arc<dyn SourceStore>, EngineError> {
        let factory = &*self.ctx.factory;
        let (locator, kind) = (&job.descriptor.source_db, job.descriptor.source_kind);
        self.ctx
            .retry
            .fetch
            .run_cancellable(
                "connect_source",
                &self.ctx.cancel,
                || factory.source(locator, kind),
                classify_engine_error,
            )
            .await
            .map_err(settle)
    }

    async fn connect_target(&self, job: &ValidatedJob) -> Result<Arc<dyn TargetStore>, EngineError> {
        let factory = &*self.ctx.factory;
        let locator = &job.descriptor.target_db;
        self.ctx
            .retry
            .insert
            .run_cancellable(
                "connect_target",
                &self.ctx.cancel,
                || factory.target(locator),
                classify_engine_error,
            )
            .await
            .map_err(settle)
    }

    /// Pre script, drop-and-create in one transaction, post script. Nothing
    /// here is retried.
    async fn schema_setup(&self, prepared: &Prepared) -> Result<Vec<String>, EngineError> {
        let descriptor = &prepared.job.descriptor;

        if let Some(path) = &descriptor.pre_ddl_file {
            run_script(&*prepared.target, path).await?;
        }

        let plan = SchemaTranslator::new(&*prepared.source)
            .translate(&prepared.job.entity, &descriptor.columns, &descriptor.dest)
            .await?;

        prepared
            .target
            .replace_table(&plan.drop_sql, &plan.create_sql)
            .await
            .map_err(EngineError::schema_from_db)?;
        info!(job = %self.report.label, table = %plan.table, "Target table recreated");

        if let Some(path) = &descriptor.post_ddl_file {
            run_script(&*prepared.target, path).await?;
        }

        Ok(plan.column_names())
    }

    /// Fetch, transform, insert, checkpoint; until a short or empty page.
    async fn page(
        &mut self,
        prepared: &Prepared,
        known_columns: Option<Vec<String>>,
    ) -> Result<(), EngineError> {
        let job = &prepared.job;
        let strategy = &job.strategy;
        let batch_size = job.descriptor.batch_size;
        let dialect = prepared.source.dialect();

        let mut loader = BulkLoader::new(prepared.target.clone(), prepared.table.clone());
        if let Some(columns) = known_columns {
            loader = loader.with_known_columns(columns);
        }

        let source = &*prepared.source;
        let loader = &loader;
        let mut position = prepared.position.clone();
        let mut seq = 0usize;

        loop {
            self.ensure_running()?;

            let query = strategy.fetch_query(dialect, &job.base_sql, &position, batch_size)?;
            debug!(job = %job.key, chunk = seq, sql = %query.sql, "Fetching chunk");

            let query = &query;
            let rows = self
                .ctx
                .retry
                .fetch
                .run_cancellable(
                    "fetch",
                    &self.ctx.cancel,
                    || async move { source.fetch(query).await.map_err(EngineError::from_db) },
                    classify_engine_error,
                )
                .await
                .map_err(settle)?;

            let fetched = rows.len();
            if fetched == 0 {
                break;
            }
            self.report.rows_fetched += fetched as u64;

            let next = strategy.next_position(&position, &rows)?;
            let rows = prepared.chain.apply(rows)?;
            let rows = &rows;

            let written = self
                .ctx
                .retry
                .insert
                .run_cancellable(
                    "insert",
                    &self.ctx.cancel,
                    || loader.insert(rows),
                    classify_engine_error,
                )
                .await
                .map_err(settle)?;

            self.report.rows_written += written;
            self.report.chunks += 1;

            if strategy.is_resumable() {
                self.ctx.checkpoints.set(&job.key, &next).await?;
                self.report.checkpoint = Some(next.clone());
            }
            position = next;

            info!(
                job = %self.report.label,
                chunk = seq,
                fetched,
                written,
                %position,
                "Chunk committed"
            );
            seq += 1;

            if !strategy.is_resumable() || fetched < batch_size {
                break;
            }
        }

        Ok(())
    }
}

fn settle(err: RetryError<EngineError>) -> EngineError {
    if err.is_cancelled() {
        EngineError::Cancelled
    } else {
        err.into_inner()
    }
}

async fn run_script(target: &dyn TargetStore, path: &Path) -> Result<(), EngineError> {
    let sql = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| EngineError::Schema(format!("cannot read '{}': {e}", path.display())))?;
    if sql.trim().is_empty() {
        return Ok(());
    }
    debug!(script = %path.display(), "Running schema script");
    target
        .execute_script(&sql)
        .await
        .map_err(EngineError::schema_from_db)
}
