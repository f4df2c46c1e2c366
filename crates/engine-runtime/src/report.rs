use model::{
    core::{entity::TableName, identifiers::JobKey},
    pagination::position::ResumePosition,
};
use planner::query::pagination::PaginationMode;
use std::{fmt, time::Duration};

/// States of a single job. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Init,
    SchemaSetup,
    Paging,
    Draining,
    Completed,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobState::Init => "init",
            JobState::SchemaSetup => "schema_setup",
            JobState::Paging => "paging",
            JobState::Draining => "draining",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    /// Short error class, as returned by `EngineError::kind`.
    pub kind: &'static str,
    pub message: String,
}

/// Outcome of one job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub label: String,
    pub key: Option<JobKey>,
    pub dest: TableName,
    pub mode: Option<PaginationMode>,
    pub state: JobState,
    pub rows_fetched: u64,
    pub rows_written: u64,
    pub chunks: usize,
    pub elapsed: Duration,
    /// Position as last durably written; what a restart resumes from.
    pub checkpoint: Option<ResumePosition>,
    pub error: Option<JobFailure>,
}

impl JobReport {
    pub fn new(label: String, dest: TableName) -> Self {
        Self {
            label,
            key: None,
            dest,
            mode: None,
            state: JobState::Init,
            rows_fetched: 0,
            rows_written: 0,
            chunks: 0,
            elapsed: Duration::ZERO,
            checkpoint: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == JobState::Completed
    }

    pub fn was_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.kind == "cancelled")
    }
}

/// Every job report of a run, in completion order within each group.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub jobs: Vec<JobReport>,
    /// Disabled jobs, never started.
    pub skipped: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.jobs.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn rows_written(&self) -> u64 {
        self.jobs.iter().map(|j| j.rows_written).sum()
    }

    pub fn find(&self, dest: &str) -> Option<&JobReport> {
        self.jobs.iter().find(|j| j.dest.to_string() == dest)
    }
}
