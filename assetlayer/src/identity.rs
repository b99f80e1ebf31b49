//! Asset identities: the key of both the request queue and the cache.

use std::fmt;

use crate::path::AssetPath;

/// Kind of payload an identity loads into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Json,
    Image,
    Audio,
    Font,
    Bytes,
}

impl AssetKind {
    /// Lowercase name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            AssetKind::Json => "json",
            AssetKind::Image => "image",
            AssetKind::Audio => "audio",
            AssetKind::Font => "font",
            AssetKind::Bytes => "bytes",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A (kind, path) pair identifying one cacheable unit of work.
///
/// The same file loaded as JSON and as bytes yields two identities, and
/// `/a.png` and `/a.png?flipx` are distinct cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId {
    pub kind: AssetKind,
    pub path: AssetPath,
}

impl AssetId {
    pub fn new(kind: AssetKind, path: AssetPath) -> Self {
        Self { kind, path }
    }

    pub fn json(path: AssetPath) -> Self {
        Self::new(AssetKind::Json, path)
    }

    pub fn image(path: AssetPath) -> Self {
        Self::new(AssetKind::Image, path)
    }

    pub fn audio(path: AssetPath) -> Self {
        Self::new(AssetKind::Audio, path)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.path)
    }
}
