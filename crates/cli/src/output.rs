use crate::error::CliError;
use engine_config::ValidatedJob;
use engine_runtime::report::{JobReport, RunSummary};
use model::pagination::position::ResumePosition;
use serde::Serialize;
use std::{collections::BTreeMap, path::Path};

/// One line of the `validate` report.
#[derive(Debug, Serialize)]
pub struct ValidationEntry {
    pub job: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_sql: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationEntry {
    pub fn valid(label: String, enabled: bool, job: &ValidatedJob) -> Self {
        Self {
            job: label,
            enabled,
            key: Some(job.key.to_string()),
            pagination: Some(job.mode().to_string()),
            base_sql: Some(job.base_sql.clone()),
            transforms: job.descriptor.transforms.clone(),
            error: None,
        }
    }

    pub fn invalid(label: String, enabled: bool, error: String) -> Self {
        Self {
            job: label,
            enabled,
            key: None,
            pagination: None,
            base_sql: None,
            transforms: Vec::new(),
            error: Some(error),
        }
    }
}

pub async fn write_validation(
    entries: &[ValidationEntry],
    path: Option<&Path>,
) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(entries)?;
    match path {
        Some(path) => tokio::fs::write(path, json).await?,
        None => println!("{json}"),
    }
    Ok(())
}

pub fn print_summary(summary: &RunSummary) {
    println!(
        "{:<32} {:<28} {:<11} {:<10} {:>10} {:>10} {:>7} {:>9}",
        "Job", "Destination", "Pagination", "State", "Fetched", "Written", "Chunks", "Elapsed"
    );
    println!("{}", "-".repeat(124));
    for job in &summary.jobs {
        print_job(job);
    }
    println!("{}", "-".repeat(124));
    println!(
        "{} succeeded, {} failed, {} skipped, {} rows written in {:.1}s",
        summary.succeeded(),
        summary.failed(),
        summary.skipped,
        summary.rows_written(),
        summary.elapsed.as_secs_f64()
    );
}

fn print_job(job: &JobReport) {
    let mode = job.mode.map(|m| m.to_string()).unwrap_or_else(|| "-".into());
    println!(
        "{:<32} {:<28} {:<11} {:<10} {:>10} {:>10} {:>7} {:>8.1}s",
        job.label,
        job.dest.to_string(),
        mode,
        job.state.to_string(),
        job.rows_fetched,
        job.rows_written,
        job.chunks,
        job.elapsed.as_secs_f64()
    );
    if let Some(key) = &job.key {
        println!("    key: {key}");
    }
    if let Some(err) = &job.error {
        println!("    error ({}): {}", err.kind, err.message);
        if let Some(position) = job.checkpoint.as_ref().filter(|p| !p.is_fresh()) {
            println!("    resumes from: {position}");
        }
    }
}

pub fn print_checkpoints(path: &Path, entries: &BTreeMap<String, ResumePosition>) {
    if entries.is_empty() {
        println!("No checkpoints stored in {}", path.display());
        return;
    }
    println!("{:<48} Position", "Key");
    println!("{}", "-".repeat(72));
    for (key, position) in entries {
        let position = if position.is_fresh() {
            "fresh".to_string()
        } else {
            position.to_string()
        };
        println!("{key:<48} {position}");
    }
}
