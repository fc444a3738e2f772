//! mediagen CLI - operator front end for the generation pipeline

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{check, generate, list, requeue, run, stats};
use mediagen::CheckpointMode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "mediagen")]
#[command(about = "Turns queued prompts into generated images and audio", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the JSON config file (default: ~/.mediagen/config.json)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log engine output and pipeline internals
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process pending prompts, one at a time
    Run {
        /// Only prompts matching this kind token (e.g. "image", "audio")
        #[arg(long)]
        kind: Option<String>,

        /// Maximum prompts per kind (default: pipeline.batch_limit)
        #[arg(long)]
        limit: Option<u32>,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate the artifact for a single prompt
    Generate {
        /// Prompt id
        id: i64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List pending prompts
    List {
        /// Kind token to filter by
        #[arg(default_value = "image")]
        kind: String,

        /// Maximum rows
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },

    /// Put an errored prompt back into the queue
    Requeue {
        /// Prompt id
        id: i64,
    },

    /// Validate configuration and the environment it points at
    Check,

    /// Show prompt counts and write-ahead log size
    Stats {
        /// Run a checkpoint with this mode before reporting
        #[arg(long, value_parser = parse_checkpoint_mode)]
        checkpoint: Option<CheckpointMode>,
    },
}

fn parse_checkpoint_mode(value: &str) -> Result<CheckpointMode, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("unknown checkpoint mode '{}' (passive, full, restart, truncate)", value))
}

/// Installs the fmt subscriber and routes `log` records from the library's
/// database layer into it.
fn init_logging(verbose: bool) -> Result<()> {
    tracing_log::LogTracer::init()?;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(verbose)
            .with_writer(std::io::stderr),
    );
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config_path = commands::config_path(cli.config)?;

    match cli.command {
        Commands::Run { kind, limit, json } => {
            run::run(&config_path, kind.as_deref(), limit, json).await
        }
        Commands::Generate { id, json } => generate::run(&config_path, id, json).await,
        Commands::List { kind, limit } => list::run(&config_path, &kind, limit),
        Commands::Requeue { id } => requeue::run(&config_path, id),
        Commands::Check => check::run(&config_path),
        Commands::Stats { checkpoint } => stats::run(&config_path, checkpoint),
    }
}
