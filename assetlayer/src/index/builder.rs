//! Builder for [`FileIndex`].

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use super::{FileDescriptor, FileIndex, RegisteredSource, SourceId};
use crate::config::IgnorePatterns;
use crate::error::{AssetError, AssetResult};
use crate::path::extension_of;
use crate::source::{normalize_name, AssetSource, SourceRole};

/// Builder for a [`FileIndex`].
///
/// Sources are listed in parallel but merged strictly in the order they were
/// added, so the result does not depend on thread scheduling.
///
/// # Example
///
/// ```ignore
/// let index = FileIndex::builder()
///     .add_source(Arc::new(DirectorySource::new("assets")?), SourceRole::Base)
///     .add_source(Arc::new(DirectorySource::new("mods/a")?), SourceRole::Patch)
///     .path_ignore(IgnorePatterns::new(&["*.psd"])?)
///     .build()?;
/// ```
#[derive(Default)]
pub struct FileIndexBuilder {
    sources: Vec<RegisteredSource>,
    path_ignore: IgnorePatterns,
    digest_ignore: IgnorePatterns,
}

impl FileIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source after all previously added ones.
    pub fn add_source(mut self, source: Arc<dyn AssetSource>, role: SourceRole) -> Self {
        self.sources.push(RegisteredSource { source, role });
        self
    }

    /// Files matching these patterns are left out of the index.
    pub fn path_ignore(mut self, patterns: IgnorePatterns) -> Self {
        self.path_ignore = patterns;
        self
    }

    /// Files matching these patterns are indexed but not digested.
    pub fn digest_ignore(mut self, patterns: IgnorePatterns) -> Self {
        self.digest_ignore = patterns;
        self
    }

    /// List every source and merge the listings.
    ///
    /// # Errors
    ///
    /// Fails if any source cannot be listed; a partial index would leave
    /// assets silently unreachable.
    pub fn build(self) -> AssetResult<FileIndex> {
        let start = Instant::now();

        let listings: Vec<Vec<String>> = self
            .sources
            .par_iter()
            .map(|registered| {
                registered
                    .source
                    .list()
                    .map_err(|e| AssetError::Source {
                        name: registered.source.name().to_string(),
                        source: e,
                    })
            })
            .collect::<AssetResult<_>>()?;

        let mut files: BTreeMap<String, FileDescriptor> = BTreeMap::new();
        let mut ignored = 0usize;

        for (position, names) in listings.into_iter().enumerate() {
            let id = SourceId(position);
            let role = self.sources[position].role;
            let mut added = 0usize;

            for name in names {
                let name = normalize_name(&name);
                if self.path_ignore.matches(&name) {
                    ignored += 1;
                    continue;
                }
                added += 1;

                match files.entry(name.to_lowercase()) {
                    Entry::Vacant(slot) => {
                        slot.insert(FileDescriptor::new(name, id));
                    }
                    Entry::Occupied(mut slot) => match role {
                        SourceRole::Patch => slot.get_mut().patches.push((name, id)),
                        SourceRole::Base => {
                            slot.insert(FileDescriptor::new(name, id));
                        }
                    },
                }
            }

            debug!(
                source = self.sources[position].source.name(),
                role = %role,
                files = added,
                "Indexed asset source"
            );
        }

        let mut extensions: HashMap<String, Vec<String>> = HashMap::new();
        for key in files.keys() {
            if let Some(extension) = extension_of(key) {
                extensions.entry(extension).or_default().push(key.clone());
            }
        }

        info!(
            version = crate::VERSION,
            sources = self.sources.len(),
            files = files.len(),
            ignored,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built asset file index"
        );

        Ok(FileIndex {
            sources: self.sources,
            files,
            extensions,
            digest_ignore: self.digest_ignore,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, SourceMetadata};
    use std::io::{self, Read};

    struct BrokenSource;

    impl AssetSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        fn list(&self) -> io::Result<Vec<String>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }

        fn open(&self, _name: &str) -> io::Result<Box<dyn Read + Send>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }

        fn metadata(&self) -> &SourceMetadata {
            unimplemented!("never indexed")
        }
    }

    #[test]
    fn test_unlistable_source_fails_build() {
        let result = FileIndexBuilder::new()
            .add_source(
                Arc::new(MemorySource::new("ok").with_file("/a", b"".to_vec())),
                SourceRole::Base,
            )
            .add_source(Arc::new(BrokenSource), SourceRole::Patch)
            .build();

        match result {
            Err(AssetError::Source { name, .. }) => assert_eq!(name, "broken"),
            other => panic!("expected source error, got {:?}", other.map(|i| i.len())),
        }
    }

    #[test]
    fn test_many_sources_merge_in_registration_order() {
        let mut builder = FileIndexBuilder::new();
        for i in 0..16 {
            let source = MemorySource::new(format!("s{}", i)).with_file("/shared.json", vec![i]);
            let role = if i == 0 {
                SourceRole::Base
            } else {
                SourceRole::Patch
            };
            builder = builder.add_source(Arc::new(source), role);
        }
        let index = builder.build().unwrap();

        let expected: Vec<SourceId> = (1..16).map(SourceId).collect();
        assert_eq!(
            index.resolve("/shared.json").unwrap().patch_sources(),
            expected
        );
    }

    #[test]
    fn test_empty_builder() {
        let index = FileIndexBuilder::new().build().unwrap();
        assert!(index.is_empty());
        assert_eq!(index.source_count(), 0);
    }
}
