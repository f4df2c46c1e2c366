use crate::{
    orchestrator::{JobContext, JobOrchestrator},
    report::{JobFailure, JobReport, JobState, RunSummary},
};
use engine_config::{FailurePolicy, JobDescriptor, MigrationConfig};
use std::{collections::HashMap, time::Instant};
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

/// A named batch of jobs that share a source and a target.
#[derive(Debug, Clone)]
pub struct JobGroup {
    pub name: String,
    pub jobs: Vec<JobDescriptor>,
}

/// Runs groups one after another and the enabled jobs of a group
/// concurrently, one task per job.
pub struct Scheduler {
    ctx: JobContext,
    policy: FailurePolicy,
}

impl JobGroup {
    pub fn from_config(config: &MigrationConfig) -> Vec<JobGroup> {
        config
            .groups()
            .into_iter()
            .map(|(db, jobs)| JobGroup {
                name: db.name.clone(),
                jobs,
            })
            .collect()
    }
}

impl Scheduler {
    pub fn new(ctx: JobContext, policy: FailurePolicy) -> Self {
        Self { ctx, policy }
    }

    pub async fn run(&self, groups: Vec<JobGroup>) -> RunSummary {
        let started = Instant::now();
        let run_token = self.ctx.cancel.child_token();
        let mut summary = RunSummary::default();

        for group in groups {
            let (enabled, disabled): (Vec<_>, Vec<_>) =
                group.jobs.into_iter().partition(|j| j.enabled);
            summary.skipped += disabled.len();

            if enabled.is_empty() {
                continue;
            }

            if run_token.is_cancelled() {
                warn!(group = %group.name, jobs = enabled.len(), "Run cancelled, group not started");
                summary
                    .jobs
                    .extend(enabled.iter().map(|job| not_started(job, "cancelled", "run cancelled")));
                continue;
            }

            info!(group = %group.name, jobs = enabled.len(), "Starting group");
            let reports = self.run_group(&group.name, enabled, &run_token).await;
            summary.jobs.extend(reports);
        }

        summary.elapsed = started.elapsed();
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            skipped = summary.skipped,
            rows = summary.rows_written(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Run finished"
        );
        summary
    }

    async fn run_group(
        &self,
        group: &str,
        jobs: Vec<JobDescriptor>,
        run_token: &CancellationToken,
    ) -> Vec<JobReport> {
        let group_token = run_token.child_token();
        let mut set = JoinSet::new();
        let mut launched: HashMap<Id, JobDescriptor> = HashMap::new();

        for job in jobs {
            let ctx = JobContext {
                cancel: group_token.clone(),
                ..self.ctx.clone()
            };
            let descriptor = job.clone();
            let span = info_span!("job", group, dest = %job.dest);
            let handle = set.spawn(
                async move {
                    JobOrchestrator::new(ctx, &descriptor)
                        .run(descriptor)
                        .await
                }
                .instrument(span),
            );
            launched.insert(handle.id(), job);
        }

        let mut reports = Vec::with_capacity(launched.len());
        while let Some(joined) = set.join_next_with_id().await {
            let report = match joined {
                Ok((id, report)) => {
                    launched.remove(&id);
                    report
                }
                Err(join_err) => {
                    let job = launched.remove(&join_err.id());
                    error!(group, error = %join_err, "Job task aborted");
                    match job {
                        Some(job) => not_started(&job, "panic", &join_err.to_string()),
                        None => continue,
                    }
                }
            };

            if !report.is_success() && !report.was_cancelled() {
                match self.policy {
                    FailurePolicy::Continue => {}
                    FailurePolicy::AbortGroup => {
                        warn!(group, job = %report.label, "Cancelling remaining jobs in group");
                        group_token.cancel();
                    }
                    FailurePolicy::AbortRun => {
                        warn!(group, job = %report.label, "Cancelling the rest of the run");
                        run_token.cancel();
                    }
                }
            }
            reports.push(report);
        }

        reports
    }
}

/// Report for a job that never ran to its own conclusion.
fn not_started(job: &JobDescriptor, kind: &'static str, reason: &str) -> JobReport {
    let mut report = JobReport::new(job.label(), job.dest.clone());
    report.state = JobState::Failed;
    report.error = Some(JobFailure {
        kind,
        message: reason.to_string(),
    });
    report
}
