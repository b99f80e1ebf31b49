//! Asset path parsing.
//!
//! Asset paths address a file inside the merged asset set, optionally a
//! value or frame inside that file, and optionally a list of image
//! post-processing directives:
//!
//! ```text
//! /items/sword.png:idle?flipx?scalenearest=2
//! └──── base ────┘ └sub┘ └─── directives ──┘
//!
//! /player.config:movement.speed
//! └──── base ───┘ └── sub ────┘
//! ```
//!
//! A leading `/` marks a path relative to the asset root. Relative paths are
//! resolved against a directory with [`AssetPath::relative_to`].

use std::fmt;
use std::str::FromStr;

use crate::error::{AssetError, AssetResult};

/// Separator between the base path and the sub-path.
const SUB_PATH_SEPARATOR: char = ':';

/// Separator introducing each directive.
const DIRECTIVE_SEPARATOR: char = '?';

/// A parsed asset path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetPath {
    /// File path within the asset set (e.g. `/items/sword.png`).
    pub base: String,

    /// JSON sub-path or image frame name.
    pub sub_path: Option<String>,

    /// Ordered image post-processing directives.
    pub directives: Vec<String>,
}

impl AssetPath {
    /// Create a path that addresses a whole file.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            sub_path: None,
            directives: Vec::new(),
        }
    }

    /// Parse an asset path string.
    ///
    /// Empty directives (`a.png??flipx`) are dropped; an empty sub-path
    /// (`a.json:`) is treated as absent.
    pub fn parse(path: &str) -> AssetResult<Self> {
        let (head, directives) = match path.split_once(DIRECTIVE_SEPARATOR) {
            Some((head, tail)) => (
                head,
                tail.split(DIRECTIVE_SEPARATOR)
                    .filter(|d| !d.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            None => (path, Vec::new()),
        };

        let (base, sub_path) = match head.split_once(SUB_PATH_SEPARATOR) {
            Some((base, sub)) if !sub.is_empty() => (base, Some(sub.to_string())),
            Some((base, _)) => (base, None),
            None => (head, None),
        };

        if base.is_empty() {
            return Err(AssetError::invalid_path(path, "empty file path"));
        }
        if base.ends_with('/') {
            return Err(AssetError::invalid_path(path, "path names a directory"));
        }

        Ok(Self {
            base: base.to_string(),
            sub_path,
            directives,
        })
    }

    /// Parse a path and require it to be root-relative.
    pub fn parse_absolute(path: &str) -> AssetResult<Self> {
        let parsed = Self::parse(path)?;
        if !parsed.is_absolute() {
            return Err(AssetError::invalid_path(
                path,
                "expected an absolute path starting with '/'",
            ));
        }
        Ok(parsed)
    }

    /// Whether the base path is root-relative.
    pub fn is_absolute(&self) -> bool {
        self.base.starts_with('/')
    }

    /// The path with sub-path and directives stripped.
    pub fn file_only(&self) -> AssetPath {
        AssetPath::new(self.base.clone())
    }

    /// The path with directives stripped (sub-path kept).
    pub fn without_directives(&self) -> AssetPath {
        Self {
            base: self.base.clone(),
            sub_path: self.sub_path.clone(),
            directives: Vec::new(),
        }
    }

    /// Whether this path addresses exactly a whole file.
    pub fn is_plain(&self) -> bool {
        self.sub_path.is_none() && self.directives.is_empty()
    }

    /// Lowercase extension of the base file, without the dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.base)
    }

    /// Resolve `path` against the directory `base_dir`.
    ///
    /// Absolute paths are returned normalised; relative ones are joined onto
    /// `base_dir`. `.` and `..` segments in the file portion are collapsed
    /// and `..` never climbs above the root.
    ///
    /// ```
    /// use assetlayer::AssetPath;
    ///
    /// assert_eq!(AssetPath::relative_to("/items/", "sword.png:idle"), "/items/sword.png:idle");
    /// assert_eq!(AssetPath::relative_to("/items/melee", "../icons/a.png"), "/items/icons/a.png");
    /// assert_eq!(AssetPath::relative_to("/items/", "/b.json"), "/b.json");
    /// ```
    pub fn relative_to(base_dir: &str, path: &str) -> String {
        let split_at = path
            .find([SUB_PATH_SEPARATOR, DIRECTIVE_SEPARATOR])
            .unwrap_or(path.len());
        let (file, rest) = path.split_at(split_at);

        let joined = if file.starts_with('/') {
            file.to_string()
        } else {
            format!("{}/{}", base_dir.trim_end_matches('/'), file)
        };

        let mut segments: Vec<&str> = Vec::new();
        for segment in joined.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }

        format!("/{}{}", segments.join("/"), rest)
    }

    /// Directory part of a path, including the trailing slash.
    ///
    /// `"/items/sword.png:idle"` → `"/items/"`.
    pub fn directory(path: &str) -> String {
        let file = file_portion(path);
        match file.rfind('/') {
            Some(idx) => file[..=idx].to_string(),
            None => "/".to_string(),
        }
    }

    /// File name of a path without its directory.
    pub fn filename(path: &str) -> &str {
        let file = file_portion(path);
        match file.rfind('/') {
            Some(idx) => &file[idx + 1..],
            None => file,
        }
    }
}

fn file_portion(path: &str) -> &str {
    let end = path
        .find([SUB_PATH_SEPARATOR, DIRECTIVE_SEPARATOR])
        .unwrap_or(path.len());
    &path[..end]
}

/// Lowercase extension of the last path component, without the dot.
pub(crate) fn extension_of(name: &str) -> Option<String> {
    let file = AssetPath::filename(name);
    file.rsplit_once('.')
        .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
        .map(|(_, ext)| ext.to_lowercase())
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        if let Some(sub) = &self.sub_path {
            write!(f, "{}{}", SUB_PATH_SEPARATOR, sub)?;
        }
        for directive in &self.directives {
            write!(f, "{}{}", DIRECTIVE_SEPARATOR, directive)?;
        }
        Ok(())
    }
}

impl FromStr for AssetPath {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetPath::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_path() {
        let path = AssetPath::parse("/items/sword.png:idle?flipx?scalenearest=2").unwrap();
        assert_eq!(path.base, "/items/sword.png");
        assert_eq!(path.sub_path.as_deref(), Some("idle"));
        assert_eq!(path.directives, vec!["flipx", "scalenearest=2"]);
        assert!(path.is_absolute());
        assert!(!path.is_plain());
    }

    #[test]
    fn test_parse_plain_path() {
        let path = AssetPath::parse("/player.config").unwrap();
        assert!(path.is_plain());
        assert_eq!(path.to_string(), "/player.config");
    }

    #[test]
    fn test_parse_drops_empty_parts() {
        let path = AssetPath::parse("/a.png:??flipx?").unwrap();
        assert_eq!(path.sub_path, None);
        assert_eq!(path.directives, vec!["flipx"]);
    }

    #[test]
    fn test_directives_without_sub_path() {
        let path = AssetPath::parse("/a.png?flipy").unwrap();
        assert_eq!(path.sub_path, None);
        assert_eq!(path.directives, vec!["flipy"]);
        assert_eq!(path.to_string(), "/a.png?flipy");
    }

    #[test]
    fn test_parse_rejects_empty_and_directories() {
        assert!(AssetPath::parse("").is_err());
        assert!(AssetPath::parse(":sub").is_err());
        assert!(AssetPath::parse("/items/").is_err());
    }

    #[test]
    fn test_parse_absolute_requires_root() {
        assert!(AssetPath::parse_absolute("/a.json").is_ok());
        assert!(matches!(
            AssetPath::parse_absolute("a.json"),
            Err(AssetError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_json_sub_path_keeps_brackets_and_dots() {
        let path = AssetPath::parse("/a.json:list[2].name").unwrap();
        assert_eq!(path.sub_path.as_deref(), Some("list[2].name"));
    }

    #[test]
    fn test_relative_to_normalises() {
        assert_eq!(AssetPath::relative_to("/a/b/", "./c.json"), "/a/b/c.json");
        assert_eq!(AssetPath::relative_to("/a/b/", "../../../c.json"), "/c.json");
        assert_eq!(
            AssetPath::relative_to("/a/", "img.png:frame?flipx"),
            "/a/img.png:frame?flipx"
        );
        assert_eq!(AssetPath::relative_to("/a/", "/x//y.json"), "/x/y.json");
    }

    #[test]
    fn test_directory_and_filename() {
        assert_eq!(AssetPath::directory("/items/sword.png:idle"), "/items/");
        assert_eq!(AssetPath::directory("/root.json"), "/");
        assert_eq!(AssetPath::filename("/items/sword.png?flipx"), "sword.png");
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension_of("/a/B.PNG"), Some("png".to_string()));
        assert_eq!(extension_of("/a/.hidden"), None);
        assert_eq!(extension_of("/a.dir/noext"), None);
        assert_eq!(
            AssetPath::parse("/x.frames").unwrap().extension().as_deref(),
            Some("frames")
        );
    }
}
