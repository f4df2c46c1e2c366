use clap::{Args, Subcommand};
use connectors::sql::base::adapter::DatabaseKind;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run every enabled job of the configuration
    Migrate {
        #[command(flatten)]
        config: ConfigArgs,

        #[arg(long, help = "Rows per chunk, overriding settings.batch_size")]
        batch_size: Option<usize>,

        #[arg(
            long,
            help = "Cancel the rest of the run as soon as one job fails (on_job_failure: abort_run)"
        )]
        fail_fast: bool,
    },
    /// Check every job without connecting to any database
    Validate {
        #[command(flatten)]
        config: ConfigArgs,

        #[arg(
            long,
            help = "If specified, writes the JSON report to this file instead of stdout"
        )]
        output: Option<PathBuf>,
    },
    /// Inspect or reset stored resume positions
    Checkpoints {
        #[command(subcommand)]
        command: CheckpointCommand,
    },
    /// Print the CREATE TABLE a job would issue, without executing it
    Ddl {
        #[arg(long, help = "Source connection string")]
        source_db: String,

        #[arg(long, help = "Source table name or SELECT/WITH query")]
        source: String,

        #[arg(long, help = "Destination table, `schema.table` or `table`")]
        dest: String,

        #[arg(long, value_delimiter = ',', help = "Columns to keep, comma separated")]
        columns: Vec<String>,

        #[arg(long, help = "Source driver: mssql, postgres or mysql (inferred when omitted)")]
        driver: Option<DatabaseKind>,
    },
}

#[derive(Subcommand)]
pub enum CheckpointCommand {
    /// Print every stored key and position
    List {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Reset one key to a fresh start
    Clear {
        #[command(flatten)]
        store: StoreArgs,

        #[arg(long, help = "Job key as printed by `checkpoints list` or `validate`")]
        key: String,
    },
}

#[derive(Args)]
pub struct ConfigArgs {
    #[arg(long, help = "Config file path")]
    pub config: PathBuf,

    #[arg(long, help = "Checkpoint file, overriding settings.checkpoint_file")]
    pub checkpoint_file: Option<PathBuf>,
}

/// Locates the checkpoint file, directly or through a configuration;
/// the default file name in the working directory otherwise.
#[derive(Args)]
#[group(multiple = false)]
pub struct StoreArgs {
    #[arg(long, help = "Config file whose settings.checkpoint_file to use")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Checkpoint file path")]
    pub checkpoint_file: Option<PathBuf>,
}
