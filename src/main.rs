//! Binary entry point for themeport.
//!
//! This binary provides the CLI for exporting and importing theme snapshots.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use themeport::config::PorterConfig;
use themeport::observability::{self, LoggingConfig};

use commands::{cmd_export, cmd_import, cmd_preview, open_store};

/// Themeport - export and import themes, theme groups, and extracts.
#[derive(Parser)]
#[command(name = "themeport")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use an empty in-memory store instead of the database.
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Export a selection as a snapshot file.
    Export {
        /// What to export: themes, theme-groups, extracts, or all.
        kind: String,

        /// ID of an entity to export (repeatable; ignored for `all`).
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Output file or directory (default: configured export dir).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show what importing a snapshot would do.
    Preview {
        /// Snapshot file.
        file: PathBuf,
    },

    /// Import a snapshot.
    Import {
        /// Snapshot file.
        file: PathBuf,

        /// JSON file with per-conflict resolutions.
        #[arg(long)]
        resolutions: Option<PathBuf>,

        /// Resolution for conflicts not listed in the resolutions file:
        /// reuse, duplicate, or skip.
        #[arg(long, default_value = "reuse")]
        on_conflict: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match PorterConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(Some(&config.logging), cli.verbose);
    if let Err(e) = observability::init(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error [{}]: {e}", e.code());
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: &PorterConfig) -> themeport::Result<()> {
    let store = open_store(config, cli.in_memory)?;

    match cli.command {
        Commands::Export { kind, ids, output } => cmd_export(store, config, &kind, ids, output),
        Commands::Preview { file } => cmd_preview(store, &file),
        Commands::Import {
            file,
            resolutions,
            on_conflict,
        } => cmd_import(store, &file, resolutions, &on_conflict),
    }
}
