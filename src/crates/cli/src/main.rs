//! Operational command-line driver: boots a [`LinkGraphBackend`] against a
//! notebook root and exposes `search`/`neighbors`/`stats`/`refresh` for
//! day-to-day inspection, mapping the backend's error taxonomy to process
//! exit codes.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use link_graph::model::{Direction, SearchOptions};
use link_graph_backend::{BackendConfig, BackendConfigOverrides, BackendError, LinkGraphBackend};
use kernel::{Kernel, KernelConfig};
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_GENERIC: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "memory-kernel")]
#[command(about = "Inspect and refresh the link-graph notebook index", long_about = None)]
#[command(version)]
struct Cli {
    /// Root directory the notebook is scanned from.
    #[arg(long, env = "LINK_GRAPH_NOTEBOOK_ROOT")]
    notebook_root: Option<PathBuf>,

    /// Persistent stats cache connection URL.
    #[arg(long, env = "LINK_GRAPH_CACHE_URL")]
    cache_url: Option<String>,

    /// Key prefix partitioning this notebook's cache entries from others.
    #[arg(long, env = "LINK_GRAPH_CACHE_KEY_PREFIX")]
    cache_key_prefix: Option<String>,

    /// Directory, relative to the notebook root, to restrict scanning to. Repeatable.
    #[arg(long = "include-dir")]
    include_dirs: Vec<String>,

    /// Directory name excluded from scanning regardless of location. Repeatable.
    #[arg(long = "exclude-dir")]
    exclude_dirs: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hybrid (FTS + exact) search over the note graph.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Traverse links out of (or into) a note.
    Neighbors {
        stem: String,
        #[arg(long, default_value = "both")]
        direction: String,
        #[arg(long, default_value_t = 1)]
        hops: u32,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print aggregate graph statistics.
    Stats,
    /// Re-scan the notebook and apply the resulting refresh plan.
    Refresh {
        /// A changed path to scope a delta refresh to. Repeatable; omit for a full rescan.
        #[arg(long = "changed")]
        changed_paths: Vec<String>,
        #[arg(long)]
        full: bool,
        #[arg(long, default_value_t = 50)]
        threshold: usize,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let outcome = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted");
            std::process::exit(EXIT_INTERRUPTED);
        }
    };

    match outcome {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(exit_code_for(&err));
        }
    }
}

/// Maps the backend's error taxonomy (§7: Configuration/Resource/Fatal all
/// surface unchanged) onto the exit codes named in §6.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<BackendError>() {
        Some(BackendError::InvalidOption(_)) | Some(BackendError::NotebookRootMissing(_)) => EXIT_USAGE,
        _ => EXIT_GENERIC,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let overrides = BackendConfigOverrides {
        notebook_root: cli.notebook_root,
        include_dirs: if cli.include_dirs.is_empty() { None } else { Some(cli.include_dirs) },
        include_auto: None,
        include_candidates: None,
        exclude_dirs: if cli.exclude_dirs.is_empty() { None } else { Some(cli.exclude_dirs) },
        cache_url: cli.cache_url,
        cache_key_prefix: cli.cache_key_prefix,
        cache_ttl_seconds: None,
    };
    let config = BackendConfig::resolve(overrides)?;
    let backend = LinkGraphBackend::new(config, None).await.context("failed to initialize link-graph backend")?;

    // Boot a kernel instance alongside the backend so the CLI exercises the
    // same lifecycle an embedder drives, even though these subcommands only
    // ever touch the Link-Graph Engine directly.
    let kernel = Kernel::new(KernelConfig::default());
    kernel.initialize().await.context("failed to boot kernel")?;

    let result = execute(&cli.command, &backend).await;

    if let Err(e) = kernel.shutdown().await {
        tracing::warn!("kernel shutdown failed: {e}");
    }

    result
}

async fn execute(command: &Command, backend: &LinkGraphBackend) -> Result<()> {
    match command {
        Command::Search { query, limit } => {
            let outcome = backend.search_planned(query, *limit, SearchOptions::default())?;
            print_json(&outcome)
        }
        Command::Neighbors { stem, direction, hops, limit } => {
            let direction = parse_direction(direction)?;
            let neighbors = backend.neighbors(stem, direction, *hops, *limit)?;
            print_json(&neighbors)
        }
        Command::Stats => {
            let stats = backend.stats().await?;
            print_json(&stats)
        }
        Command::Refresh { changed_paths, full, threshold } => {
            let result = backend.refresh_plan_apply(changed_paths, *full, *threshold).await?;
            print_json(&result)
        }
    }

    Ok(())
}

fn parse_direction(raw: &str) -> Result<Direction> {
    match raw {
        "in" | "incoming" => Ok(Direction::Incoming),
        "out" | "outgoing" => Ok(Direction::Outgoing),
        "both" => Ok(Direction::Both),
        other => Err(BackendError::InvalidOption(format!("unknown direction: {other}")).into()),
    }
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => tracing::error!("failed to serialize output: {e}"),
    }
}
