//! Asset sources: where asset bytes come from.
//!
//! A source is a flat namespace of files (`/dir/file.ext`) that can be
//! listed, opened, and described by a metadata object. The pipeline never
//! inspects how a source stores its files.
//!
//! Two implementations ship with the crate:
//!
//! - [`DirectorySource`]: a directory tree on disk
//! - [`MemorySource`]: an in-memory table (embedded assets, tests)
//!
//! Each source is registered with a [`SourceRole`] deciding how its files
//! interact with same-named files from earlier sources.

mod directory;
mod memory;

pub use directory::{DirectorySource, METADATA_FILE_NAMES};
pub use memory::MemorySource;

use std::fmt;
use std::io::{self, Read};

/// Metadata reported by a source (e.g. `name`, `version`, `author`).
pub type SourceMetadata = serde_json::Map<String, serde_json::Value>;

/// How a source's files combine with files from earlier sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceRole {
    /// Same-named files replace the earlier entry.
    Base,

    /// Same-named files are layered on top of the earlier entry.
    ///
    /// JSON documents are merged/patched; binary assets read the topmost
    /// layer.
    Patch,
}

impl SourceRole {
    /// Check if this is a patch source.
    pub fn is_patch(&self) -> bool {
        matches!(self, SourceRole::Patch)
    }
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRole::Base => write!(f, "base"),
            SourceRole::Patch => write!(f, "patch"),
        }
    }
}

/// A provider of asset files.
///
/// Names returned by [`list`](AssetSource::list) start with `/` and use `/`
/// separators. Implementations must be safe to read from several worker
/// threads at once.
pub trait AssetSource: Send + Sync {
    /// Identifier of this source (a directory path, an archive path, a label).
    fn name(&self) -> &str;

    /// Every file name this source provides.
    fn list(&self) -> io::Result<Vec<String>>;

    /// Open a file for streaming reads.
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>>;

    /// Read a whole file.
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        let mut reader = self.open(name)?;
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// Metadata describing this source.
    fn metadata(&self) -> &SourceMetadata;
}

impl fmt::Debug for dyn AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetSource")
            .field("name", &self.name())
            .finish()
    }
}

/// Normalise a source-relative name to `/a/b.ext` form.
pub(crate) fn normalize_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    if name.starts_with('/') {
        name
    } else {
        format!("/{}", name)
    }
}
