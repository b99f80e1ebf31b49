//! Commands that only consult the file index: `digest`, `scan`, `resolve`.

use assetlayer::Assets;
use tracing::info;

use crate::error::CliError;

/// Print the asset digest.
pub fn run_digest(assets: &Assets) -> Result<(), CliError> {
    println!("{}", assets.digest());
    Ok(())
}

/// Print indexed file names, one per line.
///
/// `--extension` uses the extension index and ignores the other filters.
pub fn run_scan(
    assets: &Assets,
    prefix: Option<&str>,
    suffix: Option<&str>,
    extension: Option<&str>,
) -> Result<(), CliError> {
    let names = match extension {
        Some(extension) => assets.scan_extension(extension),
        None => assets.scan(prefix, suffix),
    };

    for name in &names {
        println!("{}", name);
    }
    info!(matches = names.len(), "Scan complete");
    Ok(())
}

/// Print where a file's content comes from.
pub fn run_resolve(assets: &Assets, path: &str) -> Result<(), CliError> {
    let descriptor = assets.asset_descriptor(path)?;
    let index = assets.index();

    println!("File:    {}", descriptor.name);
    println!(
        "Primary: {} ({})",
        index.source(descriptor.source).name(),
        descriptor.source
    );
    if descriptor.patches.is_empty() {
        println!("Patches: none");
    } else {
        println!("Patches:");
        for (name, source) in &descriptor.patches {
            println!("  {} from {} ({})", name, index.source(*source).name(), source);
        }
    }
    Ok(())
}
