use crate::{
    commands::{CheckpointCommand, Commands, ConfigArgs, StoreArgs},
    error::CliError,
    output::ValidationEntry,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::sql::base::adapter::DatabaseKind;
use engine_config::{FailurePolicy, MigrationConfig};
use engine_core::{
    error::EngineError,
    schema::SchemaTranslator,
    state::{CheckpointStore, FileCheckpointStore},
    transform::TransformRegistry,
};
use engine_runtime::{
    error::RunError,
    factory::{AdapterFactory, StoreFactory},
    orchestrator::JobContext,
    report::RunSummary,
    scheduler::{JobGroup, Scheduler},
};
use model::core::{
    entity::{SourceEntity, TableName},
    identifiers::JobKey,
};
use planner::schema::ddl::target_table;
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "sluice", version, about = "Bulk relational data migration into PostgreSQL")]
struct Cli {
    #[arg(long, short, global = true, help = "Log at debug level unless RUST_LOG says otherwise")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match run(cli.command, &shutdown).await {
        Ok(()) => ExitCode::Success,
        Err(CliError::ShutdownRequested) => {
            warn!("Stopped on request; completed chunks are checkpointed");
            ExitCode::ShutdownRequested
        }
        Err(err @ CliError::Run(RunError::JobsFailed { .. })) => {
            error!("{err}");
            ExitCode::JobsFailed
        }
        Err(err) => {
            error!("{err}");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(command: Commands, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    match command {
        Commands::Migrate {
            config,
            batch_size,
            fail_fast,
        } => {
            let summary = migrate(&config, batch_size, fail_fast, shutdown.cancel_token()).await?;
            output::print_summary(&summary);

            if shutdown.is_shutdown_requested() {
                return Err(CliError::ShutdownRequested);
            }
            if !summary.is_success() {
                return Err(RunError::JobsFailed {
                    failed: summary.failed(),
                    total: summary.jobs.len(),
                }
                .into());
            }
        }
        Commands::Validate { config, output } => {
            let entries = validate(&config)?;
            output::write_validation(&entries, output.as_deref()).await?;

            let invalid = entries.iter().filter(|e| e.error.is_some()).count();
            if invalid > 0 {
                return Err(CliError::Invalid(invalid));
            }
        }
        Commands::Checkpoints { command } => match command {
            CheckpointCommand::List { store } => {
                let (path, store) = open_store(&store)?;
                let entries = store.entries().await.map_err(RunError::from)?;
                output::print_checkpoints(&path, &entries);
            }
            CheckpointCommand::Clear { store, key } => {
                let (path, store) = open_store(&store)?;
                let key = JobKey::from(key.as_str());
                store.clear(&key).await.map_err(RunError::from)?;
                info!(%key, file = %path.display(), "Checkpoint cleared");
            }
        },
        Commands::Ddl {
            source_db,
            source,
            dest,
            columns,
            driver,
        } => {
            let kind = driver.unwrap_or_else(|| DatabaseKind::detect(&source_db));
            let ddl = preview_ddl(&source_db, kind, &source, &dest, &columns).await?;
            println!("{ddl}");
        }
    }

    Ok(())
}

async fn migrate(
    args: &ConfigArgs,
    batch_size: Option<usize>,
    fail_fast: bool,
    cancel: CancellationToken,
) -> Result<RunSummary, CliError> {
    let mut config = MigrationConfig::load(&args.config)?;
    if let Some(batch_size) = batch_size {
        config.settings.batch_size = batch_size;
    }
    if fail_fast {
        config.settings.on_job_failure = FailurePolicy::AbortRun;
    }

    let checkpoint_file = args
        .checkpoint_file
        .clone()
        .unwrap_or_else(|| config.settings.checkpoint_file.clone());
    info!(
        config = %args.config.display(),
        checkpoints = %checkpoint_file.display(),
        policy = ?config.settings.on_job_failure,
        "Starting migration"
    );

    let checkpoints = FileCheckpointStore::new(checkpoint_file)
        .with_retry(config.settings.retry.checkpoint.clone());
    let ctx = JobContext {
        factory: Arc::new(AdapterFactory),
        checkpoints: Arc::new(checkpoints),
        registry: Arc::new(TransformRegistry::with_builtins()),
        retry: config.settings.retry.clone(),
        cancel,
    };

    let summary = Scheduler::new(ctx, config.settings.on_job_failure)
        .run(JobGroup::from_config(&config))
        .await;
    Ok(summary)
}

/// Everything `Init` checks before it connects: the job itself, its
/// transforms and its destination.
fn validate(args: &ConfigArgs) -> Result<Vec<ValidationEntry>, CliError> {
    let config = MigrationConfig::load(&args.config)?;
    let registry = TransformRegistry::with_builtins();

    let entries = config
        .jobs()
        .into_iter()
        .map(|descriptor| {
            let label = descriptor.label();
            let checked = descriptor
                .validate()
                .map_err(|e| e.to_string())
                .and_then(|job| {
                    registry
                        .resolve(&job.descriptor.transforms)
                        .and_then(|_| target_table(&job.descriptor.dest).map_err(EngineError::from))
                        .map(|_| job)
                        .map_err(|e| e.to_string())
                });
            match checked {
                Ok(job) => ValidationEntry::valid(label, descriptor.enabled, &job),
                Err(err) => ValidationEntry::invalid(label, descriptor.enabled, err),
            }
        })
        .collect();
    Ok(entries)
}

fn open_store(args: &StoreArgs) -> Result<(PathBuf, FileCheckpointStore), CliError> {
    let path = match (&args.checkpoint_file, &args.config) {
        (Some(path), _) => path.clone(),
        (None, Some(config)) => MigrationConfig::load(config)?.settings.checkpoint_file,
        (None, None) => PathBuf::from(engine_config::document::DEFAULT_CHECKPOINT_FILE),
    };
    Ok((path.clone(), FileCheckpointStore::new(path)))
}

async fn preview_ddl(
    locator: &str,
    kind: DatabaseKind,
    source: &str,
    dest: &str,
    columns: &[String],
) -> Result<String, CliError> {
    let store = AdapterFactory.source(locator, kind).await?;
    let plan = SchemaTranslator::new(&*store)
        .translate(&SourceEntity::parse(source), columns, &TableName::parse(dest))
        .await?;
    Ok(format!("{}\n{}", plan.drop_sql, plan.create_sql))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_migrate_overrides() {
        let cli = Cli::parse_from([
            "sluice",
            "migrate",
            "--config",
            "jobs.yaml",
            "--batch-size",
            "1000",
            "--fail-fast",
            "-v",
        ]);
        assert!(cli.verbose);
        let Commands::Migrate {
            config,
            batch_size,
            fail_fast,
        } = cli.command
        else {
            panic!("expected migrate");
        };
        assert_eq!(config.config, PathBuf::from("jobs.yaml"));
        assert_eq!(batch_size, Some(1000));
        assert!(fail_fast);
    }

    #[test]
    fn parses_ddl_driver_and_columns() {
        let cli = Cli::parse_from([
            "sluice",
            "ddl",
            "--source-db",
            "Server=db;Database=crm",
            "--source",
            "dbo.Customers",
            "--dest",
            "staging.customers",
            "--columns",
            "Id,Name",
            "--driver",
            "sqlserver",
        ]);
        let Commands::Ddl {
            columns, driver, ..
        } = cli.command
        else {
            panic!("expected ddl");
        };
        assert_eq!(columns, vec!["Id", "Name"]);
        assert_eq!(driver, Some(DatabaseKind::Mssql));
    }

    #[test]
    fn checkpoint_store_prefers_explicit_file() {
        let args = StoreArgs {
            config: None,
            checkpoint_file: Some(PathBuf::from("/tmp/cp.json")),
        };
        let (path, store) = open_store(&args).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/cp.json"));
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn validate_reports_each_job() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.yaml");
        std::fs::write(
            &path,
            "databases:\n  - name: crm\n    source_db: Server=db;Database=crm\n    target_db: postgres://pg/wh\n    tables:\n      - { source: dbo.A, dest: a, sort_columns: [Id] }\n      - { source: dbo.B, dest: b, transforms: { plugins: [acme.nope] } }\n",
        )
        .unwrap();

        let entries = validate(&ConfigArgs {
            config: path,
            checkpoint_file: None,
        })
        .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].pagination.as_deref(), Some("offset"));
        assert!(entries[0].key.as_deref().is_some_and(|k| k.starts_with("a@")));
        assert!(entries[1].error.as_deref().is_some_and(|e| e.contains("acme.nope")));
    }
}
