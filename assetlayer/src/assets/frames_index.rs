//! Which `.frames` file applies to an image.
//!
//! For `/items/melee/sword.png` the candidates are, in order:
//!
//! ```text
//! /items/melee/sword.frames
//! /items/melee/default.frames
//! /items/default.frames
//! /default.frames
//! ```
//!
//! Resolution only consults the file index, so it is cheap, but it runs for
//! every image load; results are remembered per image path.

use std::collections::HashMap;

use crate::index::FileIndex;
use crate::path::AssetPath;

const FRAMES_EXTENSION: &str = "frames";
const DEFAULT_FRAMES_STEM: &str = "default";

/// Cached image path → frames file resolutions.
#[derive(Debug, Default)]
pub(crate) struct FramesIndex {
    resolved: HashMap<String, Option<String>>,
}

impl FramesIndex {
    /// The frames file for `image_path`, if any.
    pub fn resolve(&mut self, index: &FileIndex, image_path: &str) -> Option<String> {
        self.resolved
            .entry(image_path.to_lowercase())
            .or_insert_with(|| find_frames_file(index, image_path))
            .clone()
    }
}

fn find_frames_file(index: &FileIndex, image_path: &str) -> Option<String> {
    let mut directory = AssetPath::directory(image_path);
    let file_name = AssetPath::filename(image_path);
    let stem = file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem);

    let same_stem = format!("{}{}.{}", directory, stem, FRAMES_EXTENSION);
    if let Some(descriptor) = index.resolve(&same_stem) {
        return Some(descriptor.name.clone());
    }

    loop {
        let candidate = format!("{}{}.{}", directory, DEFAULT_FRAMES_STEM, FRAMES_EXTENSION);
        if let Some(descriptor) = index.resolve(&candidate) {
            return Some(descriptor.name.clone());
        }
        directory = parent_directory(&directory)?;
    }
}

/// `/a/b/` → `/a/`; `/` has no parent.
fn parent_directory(directory: &str) -> Option<String> {
    let trimmed = directory.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.rfind('/').map(|idx| trimmed[..=idx].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{AssetSource, MemorySource, SourceRole};
    use std::sync::Arc;

    fn index_with(files: &[&str]) -> FileIndex {
        let mut source = MemorySource::new("mem");
        for file in files {
            source.insert(file, b"{}".to_vec());
        }
        FileIndex::builder()
            .add_source(Arc::new(source) as Arc<dyn AssetSource>, SourceRole::Base)
            .build()
            .unwrap()
    }

    #[test]
    fn test_same_stem_wins() {
        let index = index_with(&["/items/sword.frames", "/items/default.frames"]);
        assert_eq!(
            find_frames_file(&index, "/items/sword.png").as_deref(),
            Some("/items/sword.frames")
        );
    }

    #[test]
    fn test_walks_up_to_default() {
        let index = index_with(&["/default.frames", "/items/default.frames"]);
        assert_eq!(
            find_frames_file(&index, "/items/melee/sword.png").as_deref(),
            Some("/items/default.frames")
        );
        assert_eq!(
            find_frames_file(&index, "/tiles/dirt.png").as_deref(),
            Some("/default.frames")
        );
    }

    #[test]
    fn test_no_frames() {
        let index = index_with(&["/items/sword.png"]);
        assert_eq!(find_frames_file(&index, "/items/sword.png"), None);
    }

    #[test]
    fn test_resolution_is_cached_case_insensitively() {
        let index = index_with(&["/Items/Sword.frames"]);
        let mut frames = FramesIndex::default();

        assert_eq!(
            frames.resolve(&index, "/items/sword.png").as_deref(),
            Some("/Items/Sword.frames")
        );
        assert_eq!(
            frames.resolve(&index, "/ITEMS/SWORD.png").as_deref(),
            Some("/Items/Sword.frames")
        );
        assert_eq!(frames.resolved.len(), 1);
    }

    #[test]
    fn test_parent_directory() {
        assert_eq!(parent_directory("/a/b/").as_deref(), Some("/a/"));
        assert_eq!(parent_directory("/a/").as_deref(), Some("/"));
        assert_eq!(parent_directory("/"), None);
    }
}
