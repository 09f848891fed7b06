//! rowlake: command-line front end for the embedded data lake.
//!
//! Every invocation hydrates the workspace lake from disk, runs one command
//! and exits. Datasets live under `.rowlake/datasets` in the workspace.

mod commands;
mod table;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// rowlake: an offline-first data lake for tabular files
#[derive(Parser, Debug)]
#[command(name = "rowlake", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Import a delimited, structured-text or SQLite file as a dataset
    Import {
        /// File to import
        file: PathBuf,
        /// Dataset name (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
        /// Format tag (delimited-text, structured-text, embedded-sql); detected from the extension if omitted
        #[arg(short, long)]
        format: Option<String>,
        /// Table to read from an SQLite source
        #[arg(long)]
        table: Option<String>,
    },
    /// List datasets
    List,
    /// Show a dataset's schema and first rows
    Show {
        id: String,
        /// Number of rows to print
        #[arg(short, long, default_value = "10")]
        rows: usize,
    },
    /// Registry-wide statistics
    Stats,
    /// Validate a dataset against its schema
    Validate { id: String },
    /// Delete a dataset
    Delete { id: String },
    /// Copy a dataset under a new identity
    Clone {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Concatenate datasets into a new one
    Merge {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Run a transformation pipeline over a dataset
    Transform(TransformArgs),
    /// Draw a sample of a dataset's rows
    Sample {
        id: String,
        /// random, systematic, stratified or percent
        #[arg(short, long, default_value = "random")]
        method: String,
        /// Row count, or a percentage for the percent method
        #[arg(short, long)]
        size: f64,
        /// Field to stratify on
        #[arg(long)]
        field: Option<String>,
        /// Save the sample as a new dataset with this name
        #[arg(long)]
        save: Option<String>,
    },
    /// Run a read-only SQL query against datasets registered as tables
    Query {
        sql: String,
        /// Table bindings as name=dataset_id
        #[arg(short, long = "table", value_name = "NAME=ID")]
        tables: Vec<String>,
    },
    /// Export a dataset to a file
    Export {
        id: String,
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
        /// Format tag; detected from the output extension if omitted
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Default)]
struct TransformArgs {
    id: String,
    /// Keep rows matching a condition such as `age>26` (repeatable)
    #[arg(long = "where", value_name = "CONDITION")]
    conditions: Vec<String>,
    /// Keep only these fields
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,
    /// Drop these fields
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,
    /// Rename fields, as old=new
    #[arg(long, value_delimiter = ',')]
    rename: Vec<String>,
    /// Sort by a field, optionally `field:desc`
    #[arg(long)]
    sort: Option<String>,
    /// Remove duplicate rows, or rows sharing a field value
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    distinct: Option<String>,
    /// Aggregations as name=op:field, e.g. total=sum:amount
    #[arg(long = "agg", value_name = "NAME=OP:FIELD")]
    aggregations: Vec<String>,
    /// Group-by fields for --agg
    #[arg(long, value_delimiter = ',')]
    group_by: Vec<String>,
    #[arg(long)]
    limit: Option<usize>,
    #[arg(long, default_value = "0")]
    offset: usize,
    /// Register the result as a new dataset with this name
    #[arg(long)]
    save: Option<String>,
    /// Print the plan without running it
    #[arg(long)]
    explain: bool,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default configuration file into the workspace
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "rowlake", "rowlake")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "rowlake.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}
