//! Error types for asset indexing and loading.
//!
//! Loads that are merely waiting on another thread are *not* errors; they
//! surface as [`Loaded::Blocked`](crate::assets::Loaded) inside the loader and
//! never reach callers of the public API.

use std::io;

use thiserror::Error;

/// Result type for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

/// Errors that can occur while indexing, loading or configuring assets.
#[derive(Debug, Error)]
pub enum AssetError {
    /// The path string could not be parsed or is not valid for the request.
    #[error("Invalid asset path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// No source provides the requested file.
    #[error("Asset not found: {path}")]
    NotFound { path: String },

    /// The file exists but its content could not be decoded.
    #[error("Malformed asset '{path}': {reason}")]
    Malformed { path: String, reason: String },

    /// A JSON sub-path does not address a value in the document.
    #[error("Cannot resolve sub-path '{sub_path}' in '{path}': {reason}")]
    SubPath {
        path: String,
        sub_path: String,
        reason: String,
    },

    /// A frames specification violates its alias invariant or is malformed.
    #[error("Invalid frames specification '{path}': {reason}")]
    InvalidFrames { path: String, reason: String },

    /// An asset (transitively) depends on itself.
    #[error("Circular asset dependency through '{path}'")]
    CircularDependency { path: String },

    /// Loading panicked (in a source, decoder or image operation).
    #[error("Loading '{path}' panicked: {message}")]
    Panicked { path: String, message: String },

    /// A cached record does not hold the requested kind of payload.
    #[error("Asset '{path}' is not a {expected} asset")]
    KindMismatch { path: String, expected: &'static str },

    /// Failed to read a single file from a source.
    #[error("Failed to read '{path}' from source '{source_name}': {source}")]
    Io {
        path: String,
        source_name: String,
        #[source]
        source: io::Error,
    },

    /// Failed to list or open an asset source.
    #[error("Failed to read asset source '{name}': {source}")]
    Source {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Invalid settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A worker thread could not be started.
    #[error("Failed to spawn asset worker: {0}")]
    Spawn(#[source] io::Error),
}

impl AssetError {
    pub(crate) fn malformed(path: impl Into<String>, reason: impl ToString) -> Self {
        AssetError::Malformed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        AssetError::NotFound { path: path.into() }
    }

    pub(crate) fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        AssetError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether a configured missing-asset fallback may stand in for this error.
    pub fn is_substitutable(&self) -> bool {
        matches!(
            self,
            AssetError::NotFound { .. } | AssetError::Malformed { .. } | AssetError::Io { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = AssetError::not_found("/items/sword.png");
        assert_eq!(err.to_string(), "Asset not found: /items/sword.png");
    }

    #[test]
    fn test_io_error_exposes_source() {
        let err = AssetError::Io {
            path: "/a.json".to_string(),
            source_name: "base".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("base"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_substitutable_errors() {
        assert!(AssetError::not_found("/a.png").is_substitutable());
        assert!(AssetError::malformed("/a.png", "bad header").is_substitutable());
        assert!(!AssetError::CircularDependency {
            path: "/a.png".to_string()
        }
        .is_substitutable());
        assert!(!AssetError::Config("bad".to_string()).is_substitutable());
    }
}
