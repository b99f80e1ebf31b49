//! In-memory asset source.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use super::{normalize_name, AssetSource, SourceMetadata};

/// An asset source backed by an in-memory file table.
///
/// Useful for assets embedded in the binary and for tests. Every `open`
/// is counted so callers can observe how often the pipeline touched it.
///
/// # Example
///
/// ```
/// use assetlayer::{AssetSource, MemorySource};
///
/// let source = MemorySource::new("embedded")
///     .with_file("/player.config", br#"{"speed": 4}"#.to_vec())
///     .with_metadata("version", "1.0");
///
/// assert_eq!(source.list().unwrap(), vec!["/player.config"]);
/// assert_eq!(source.metadata()["version"], "1.0");
/// ```
#[derive(Debug, Default)]
pub struct MemorySource {
    name: String,
    files: BTreeMap<String, Bytes>,
    metadata: SourceMetadata,
    opens: AtomicU64,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add (or replace) a file.
    pub fn with_file(mut self, name: &str, data: impl Into<Bytes>) -> Self {
        self.insert(name, data);
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Add (or replace) a file in place.
    pub fn insert(&mut self, name: &str, data: impl Into<Bytes>) {
        self.files.insert(normalize_name(name), data.into());
    }

    /// Number of times any file was opened.
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::Relaxed)
    }
}

impl AssetSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self) -> io::Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        let data = self.files.get(name).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("'{}' is not in memory source '{}'", name, self.name),
            )
        })?;
        self.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(Cursor::new(data)))
    }

    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_is_sorted_and_normalised() {
        let source = MemorySource::new("mem")
            .with_file("b.json", b"{}".to_vec())
            .with_file("/a.json", b"{}".to_vec());
        assert_eq!(source.list().unwrap(), vec!["/a.json", "/b.json"]);
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let source = MemorySource::new("mem");
        let err = source.open("/nope").err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(source.open_count(), 0);
    }

    #[test]
    fn test_open_counts_reads() {
        let source = MemorySource::new("mem").with_file("/a", b"x".to_vec());
        source.read("/a").unwrap();
        source.read("/a").unwrap();
        assert_eq!(source.open_count(), 2);
    }
}
