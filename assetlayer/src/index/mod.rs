//! Merged, case-insensitive index of every file across all asset sources.
//!
//! # Overview
//!
//! The [`FileIndex`] is built once, when the asset pipeline starts, by
//! walking every registered source in load order. It is immutable afterwards
//! and is read without locking.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            FileIndexBuilder             │
//! │                                         │
//! │  .add_source(base,   SourceRole::Base)  │
//! │  .add_source(mod_a,  SourceRole::Patch) │
//! │  .add_source(mod_b,  SourceRole::Patch) │
//! │  .build()                               │
//! └────────────────┬────────────────────────┘
//!                  │
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │               FileIndex                 │
//! │                                         │
//! │  files: lowercase name → FileDescriptor │
//! │  extensions: "png" → [names...]         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Precedence Rules
//!
//! Sources are applied in registration order:
//!
//! 1. A later **base** source replaces an existing entry (and its patches)
//! 2. A later **patch** source appends a layer to the existing entry
//! 3. A file nobody provided before becomes a new entry, whatever the role

mod builder;
mod digest;

pub use builder::FileIndexBuilder;
pub use digest::AssetDigest;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use crate::config::IgnorePatterns;
use crate::error::{AssetError, AssetResult};
use crate::source::{AssetSource, SourceMetadata, SourceRole};

/// Position of a source in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub usize);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a file's content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Name as listed by the primary source (original case).
    pub name: String,

    /// Source holding the primary copy.
    pub source: SourceId,

    /// Layers applied on top of the primary, in registration order.
    pub patches: Vec<(String, SourceId)>,
}

impl FileDescriptor {
    fn new(name: String, source: SourceId) -> Self {
        Self {
            name,
            source,
            patches: Vec::new(),
        }
    }

    /// Sources of the patch layers, in registration order.
    pub fn patch_sources(&self) -> Vec<SourceId> {
        self.patches.iter().map(|(_, id)| *id).collect()
    }

    /// Every layer, primary first.
    pub fn layers(&self) -> impl Iterator<Item = (&str, SourceId)> {
        std::iter::once((self.name.as_str(), self.source))
            .chain(self.patches.iter().map(|(name, id)| (name.as_str(), *id)))
    }

    /// The topmost layer: the last patch, or the primary when unpatched.
    pub fn top_layer(&self) -> (&str, SourceId) {
        self.patches
            .last()
            .map(|(name, id)| (name.as_str(), *id))
            .unwrap_or((self.name.as_str(), self.source))
    }
}

pub(crate) struct RegisteredSource {
    pub source: Arc<dyn AssetSource>,
    pub role: SourceRole,
}

/// The merged file index.
pub struct FileIndex {
    sources: Vec<RegisteredSource>,

    /// Keyed by lowercase name.
    files: BTreeMap<String, FileDescriptor>,

    /// Lowercase extension (no dot) → lowercase names, sorted.
    extensions: HashMap<String, Vec<String>>,

    digest_ignore: IgnorePatterns,
}

impl FileIndex {
    /// Start building an index.
    pub fn builder() -> FileIndexBuilder {
        FileIndexBuilder::new()
    }

    /// Look up a file by name, ignoring case.
    pub fn resolve(&self, name: &str) -> Option<&FileDescriptor> {
        self.files.get(&name.to_lowercase())
    }

    /// Look up a file, failing with [`AssetError::NotFound`].
    pub fn require(&self, name: &str) -> AssetResult<&FileDescriptor> {
        self.resolve(name).ok_or_else(|| AssetError::not_found(name))
    }

    /// Whether any source provides `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(&name.to_lowercase())
    }

    /// Every file with the given extension (leading dot optional).
    ///
    /// Cost is proportional to the number of matches.
    pub fn scan_extension(&self, extension: &str) -> Vec<String> {
        let extension = extension.trim_start_matches('.').to_lowercase();
        self.extensions
            .get(&extension)
            .map(|keys| {
                keys.iter()
                    .filter_map(|key| self.files.get(key))
                    .map(|descriptor| descriptor.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every file whose name starts with `prefix` and ends with `suffix`,
    /// ignoring case. Walks the whole index.
    pub fn scan(&self, prefix: Option<&str>, suffix: Option<&str>) -> Vec<String> {
        let prefix = prefix.map(str::to_lowercase);
        let suffix = suffix.map(str::to_lowercase);

        self.files
            .iter()
            .filter(|(key, _)| prefix.as_deref().map_or(true, |p| key.starts_with(p)))
            .filter(|(key, _)| suffix.as_deref().map_or(true, |s| key.ends_with(s)))
            .map(|(_, descriptor)| descriptor.name.clone())
            .collect()
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of registered sources.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// A registered source.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this index.
    pub fn source(&self, id: SourceId) -> &dyn AssetSource {
        self.sources[id.0].source.as_ref()
    }

    /// Role a source was registered with.
    pub fn source_role(&self, id: SourceId) -> SourceRole {
        self.sources[id.0].role
    }

    /// Find a source by its name.
    pub fn source_by_name(&self, name: &str) -> Option<SourceId> {
        self.sources
            .iter()
            .position(|s| s.source.name() == name)
            .map(SourceId)
    }

    /// Metadata of the source called `name`.
    pub fn source_metadata(&self, name: &str) -> Option<&SourceMetadata> {
        self.source_by_name(name)
            .map(|id| self.sources[id.0].source.metadata())
    }

    /// Read one layer of a file.
    pub fn read_layer(&self, name: &str, id: SourceId) -> AssetResult<Vec<u8>> {
        let source = self.source(id);
        source.read(name).map_err(|e| AssetError::Io {
            path: name.to_string(),
            source_name: source.name().to_string(),
            source: e,
        })
    }

    /// Read the effective (topmost) layer of a file.
    pub fn read_top(&self, descriptor: &FileDescriptor) -> AssetResult<Vec<u8>> {
        let (name, id) = descriptor.top_layer();
        self.read_layer(name, id)
    }

    /// Open the effective (topmost) layer of a file for streaming.
    pub fn open_top(&self, descriptor: &FileDescriptor) -> AssetResult<Box<dyn Read + Send>> {
        let (name, id) = descriptor.top_layer();
        let source = self.source(id);
        source.open(name).map_err(|e| AssetError::Io {
            path: name.to_string(),
            source_name: source.name().to_string(),
            source: e,
        })
    }

    /// Fingerprint of every non-ignored layer of every indexed file.
    ///
    /// # Errors
    ///
    /// Any unreadable file fails the whole computation.
    pub fn digest(&self) -> AssetResult<AssetDigest> {
        digest::compute(self)
    }
}

impl fmt::Debug for FileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileIndex")
            .field("sources", &self.sources.len())
            .field("files", &self.files.len())
            .field("extensions", &self.extensions.len())
            .finish()
    }
}
