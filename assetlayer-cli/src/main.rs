//! AssetLayer CLI - Command-line interface
//!
//! Inspects a layered asset set built from directories: prints its digest,
//! scans and resolves files, and loads JSON, images and audio through the
//! same pipeline a game would use.
//!
//! ```text
//! assetlayer --source assets/packed --patch mods/hats json /player.config:speed
//! ```

mod commands;
mod error;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use commands::common::SourceArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "assetlayer")]
#[command(version = assetlayer::VERSION)]
#[command(about = "Inspect layered game asset sets", long_about = None)]
struct Cli {
    #[command(flatten)]
    sources: SourceArgs,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the SHA-256 digest of the asset set
    Digest,

    /// List indexed files
    Scan {
        /// Only names starting with this (case-insensitive)
        #[arg(long)]
        prefix: Option<String>,

        /// Only names ending with this (case-insensitive)
        #[arg(long)]
        suffix: Option<String>,

        /// Only files with this extension
        #[arg(long, conflicts_with_all = ["prefix", "suffix"])]
        extension: Option<String>,
    },

    /// Show which sources provide a file
    Resolve {
        /// Asset path, e.g. /items/sword.png
        path: String,
    },

    /// Print a JSON document or a value inside it
    Json {
        /// Asset path, e.g. /player.config:movement.speed
        path: String,
    },

    /// Load an image and print its size and frames
    Image {
        /// Asset path, e.g. /items/sword.png:idle?flipx
        path: String,
    },

    /// Load an audio clip and print its format
    Audio {
        /// Asset path, e.g. /sfx/click.wav
        path: String,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let assets = cli.sources.open_assets()?;

    match &cli.command {
        Commands::Digest => commands::index::run_digest(&assets),
        Commands::Scan {
            prefix,
            suffix,
            extension,
        } => commands::index::run_scan(
            &assets,
            prefix.as_deref(),
            suffix.as_deref(),
            extension.as_deref(),
        ),
        Commands::Resolve { path } => commands::index::run_resolve(&assets, path),
        Commands::Json { path } => commands::load::run_json(&assets, path),
        Commands::Image { path } => commands::load::run_image(&assets, path),
        Commands::Audio { path } => commands::load::run_audio(&assets, path),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
