//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tracing::debug;

use assetlayer::{AssetSource, Assets, DirectorySource, Settings, SourceRole};

use crate::error::CliError;

/// Source and settings options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Base asset directory (repeatable, registered in order)
    #[arg(long = "source", value_name = "DIR", global = true)]
    pub sources: Vec<PathBuf>,

    /// Patch asset directory (repeatable, registered after all bases)
    #[arg(long = "patch", value_name = "DIR", global = true)]
    pub patches: Vec<PathBuf>,

    /// Pipeline settings JSON file
    #[arg(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,
}

impl SourceArgs {
    /// Load settings from `--settings`, or use the defaults.
    pub fn load_settings(&self) -> Result<Settings, CliError> {
        match &self.settings {
            Some(path) => Ok(Settings::load(path)?),
            None => Ok(Settings::default()),
        }
    }

    /// Directories paired with their roles, bases first.
    pub fn registrations(&self) -> Vec<(PathBuf, SourceRole)> {
        self.sources
            .iter()
            .map(|dir| (dir.clone(), SourceRole::Base))
            .chain(self.patches.iter().map(|dir| (dir.clone(), SourceRole::Patch)))
            .collect()
    }

    /// Index the given directories and start the pipeline.
    pub fn open_assets(&self) -> Result<Assets, CliError> {
        let registrations = self.registrations();
        if registrations.is_empty() {
            return Err(CliError::NoSources);
        }

        let sources = registrations
            .into_iter()
            .map(|(dir, role)| {
                debug!(dir = %dir.display(), %role, "Registering asset source");
                let source = DirectorySource::new(dir)?;
                Ok((Arc::new(source) as Arc<dyn AssetSource>, role))
            })
            .collect::<Result<Vec<_>, CliError>>()?;

        Ok(Assets::new(self.load_settings()?, sources)?)
    }
}
