//! Directory-tree asset source.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::{AssetSource, SourceMetadata};
use crate::error::{AssetError, AssetResult};

/// File names at the source root holding the source's metadata object.
///
/// These files describe the source and are not listed as assets.
pub const METADATA_FILE_NAMES: &[&str] = &["_metadata", ".metadata"];

/// An asset source reading files below a root directory.
///
/// File names are the root-relative paths with `/` separators, e.g. a file
/// at `<root>/items/sword.png` is listed as `/items/sword.png`.
#[derive(Debug)]
pub struct DirectorySource {
    root: PathBuf,
    name: String,
    metadata: SourceMetadata,
}

impl DirectorySource {
    /// Open a directory as a source, reading its metadata file if present.
    ///
    /// # Errors
    ///
    /// Fails if the root is not a directory or the metadata file is not a
    /// JSON object.
    pub fn new(root: impl Into<PathBuf>) -> AssetResult<Self> {
        let root = root.into();
        let name = root.display().to_string();

        if !root.is_dir() {
            return Err(AssetError::Source {
                name,
                source: io::Error::new(io::ErrorKind::NotFound, "not a directory"),
            });
        }

        let metadata = read_metadata(&root, &name)?;
        debug!(root = %name, keys = metadata.len(), "Opened directory source");

        Ok(Self {
            root,
            name,
            metadata,
        })
    }

    /// Root directory of this source.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn real_path(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }
}

fn read_metadata(root: &Path, name: &str) -> AssetResult<SourceMetadata> {
    for file_name in METADATA_FILE_NAMES {
        let path = root.join(file_name);
        if !path.is_file() {
            continue;
        }

        let file = File::open(&path).map_err(|e| AssetError::Source {
            name: name.to_string(),
            source: e,
        })?;
        let value: serde_json::Value = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| AssetError::malformed(path.display().to_string(), e))?;

        return match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(AssetError::malformed(
                path.display().to_string(),
                "metadata must be a JSON object",
            )),
        };
    }
    Ok(SourceMetadata::new())
}

impl AssetSource for DirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = match entry.path().strip_prefix(&self.root) {
                Ok(relative) => relative,
                Err(_) => continue,
            };

            // Only the root-level metadata file is special
            if entry.depth() == 1 {
                let file_name = entry.file_name().to_string_lossy();
                if METADATA_FILE_NAMES.contains(&file_name.as_ref()) {
                    continue;
                }
            }

            let components: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            names.push(format!("/{}", components.join("/")));
        }

        names.sort();
        Ok(names)
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        let file = File::open(self.real_path(name))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("items/melee")).unwrap();
        fs::write(temp.path().join("items/melee/Sword.png"), b"png").unwrap();
        fs::write(temp.path().join("player.config"), b"{}").unwrap();
        fs::write(
            temp.path().join("_metadata"),
            br#"{"name": "base", "version": "1.2"}"#,
        )
        .unwrap();
        temp
    }

    #[test]
    fn test_list_walks_tree_and_skips_metadata() {
        let temp = create_tree();
        let source = DirectorySource::new(temp.path()).unwrap();

        assert_eq!(
            source.list().unwrap(),
            vec!["/items/melee/Sword.png", "/player.config"]
        );
    }

    #[test]
    fn test_metadata_is_parsed() {
        let temp = create_tree();
        let source = DirectorySource::new(temp.path()).unwrap();
        assert_eq!(source.metadata()["version"], "1.2");
    }

    #[test]
    fn test_nested_metadata_name_is_an_asset() {
        let temp = create_tree();
        fs::write(temp.path().join("items/_metadata"), b"data").unwrap();
        let source = DirectorySource::new(temp.path()).unwrap();
        assert!(source
            .list()
            .unwrap()
            .contains(&"/items/_metadata".to_string()));
    }

    #[test]
    fn test_read_file() {
        let temp = create_tree();
        let source = DirectorySource::new(temp.path()).unwrap();
        assert_eq!(source.read("/items/melee/Sword.png").unwrap(), b"png");
        assert!(source.read("/missing.png").is_err());
    }

    #[test]
    fn test_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let result = DirectorySource::new(temp.path().join("nope"));
        assert!(matches!(result, Err(AssetError::Source { .. })));
    }

    #[test]
    fn test_rejects_non_object_metadata() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("_metadata"), b"[1, 2]").unwrap();
        assert!(DirectorySource::new(temp.path()).is_err());
    }
}
