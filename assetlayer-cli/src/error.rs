//! CLI error type.

use assetlayer::AssetError;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No `--source` or `--patch` directory was given.
    #[error("No asset sources given; pass at least one --source DIR")]
    NoSources,

    /// The asset pipeline failed to start or to load an asset.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Output could not be rendered.
    #[error("Failed to render output: {0}")]
    Output(String),
}
