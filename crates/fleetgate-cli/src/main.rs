//! Fleetgate command-line tool.
//!
//! Evaluates authorization decisions against a graph snapshot.
//!
//! # Quick Start
//!
//! ```bash
//! # Check a snapshot for dangling references
//! fleetgate validate --snapshot fleet.json
//!
//! # May user bob read driver-7's records?
//! fleetgate check --snapshot fleet.json --actor bob --target driver-7
//!
//! # Answer sidecar requests (one JSON object per line on stdin)
//! fleetgate sidecar --snapshot fleet.json
//! ```

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleetgate_config::{ConfigLoader, FleetgateConfig, LogFormat};
use fleetgate_types::ActionLevel;
use tracing_subscriber::EnvFilter;

/// Fleetgate - hierarchical authorization for fleet records.
#[derive(Parser)]
#[command(name = "fleetgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding fleetgate.toml and fleetgate.local.toml.
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one authorization decision.
    ///
    /// Exits 0 when allowed, 3 when denied, 4 when indeterminate.
    Check {
        /// Graph snapshot (JSON).
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Acting user id.
        #[arg(short, long)]
        actor: String,

        /// Target party id.
        #[arg(short, long)]
        target: String,

        /// Action level (read, write, delete).
        #[arg(short, long, default_value = "read")]
        level: ActionLevel,

        /// Evaluate at this instant (RFC 3339) instead of now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Validate a graph snapshot.
    Validate {
        /// Graph snapshot (JSON).
        #[arg(short, long)]
        snapshot: PathBuf,
    },

    /// Answer sidecar requests read from stdin, one JSON object per line.
    Sidecar {
        /// Graph snapshot (JSON).
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Evaluate at this instant (RFC 3339) instead of now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Show the effective configuration.
    Config {
        /// Output format (toml, json, text).
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .with_project_dir(&cli.project_dir)
        .load()
        .context("Failed to load configuration")?;

    init_logging(&config, cli.verbose);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    match cli.command {
        Commands::Check {
            snapshot,
            actor,
            target,
            level,
            at,
        } => runtime.block_on(commands::check::run(
            &config,
            &snapshot,
            &actor,
            &target,
            level,
            at.as_deref(),
        )),
        Commands::Validate { snapshot } => commands::validate::run(&snapshot),
        Commands::Sidecar { snapshot, at } => {
            runtime.block_on(commands::sidecar::run(&config, &snapshot, at.as_deref()))
        }
        Commands::Config { format } => commands::config::show(&config, &format),
    }
}

fn init_logging(config: &FleetgateConfig, verbose: bool) {
    let default_directive = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries command output; logs go to stderr.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
