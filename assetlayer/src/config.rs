//! Asset pipeline configuration.
//!
//! `Settings` is deserialised from a JSON object with camelCase keys; every
//! key is optional and falls back to the defaults below.
//!
//! ```json
//! {
//!   "assetTimeToLive": 30.0,
//!   "audioDecompressLimit": 4.0,
//!   "workerPoolSize": 4,
//!   "missingImage": "/assetmissing.png",
//!   "missingAudio": "/assetmissing.wav",
//!   "pathIgnore": ["*.psd", "*/.git/*"],
//!   "digestIgnore": ["*.md", "/_previews/*"]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

use crate::error::{AssetError, AssetResult};

/// Default time an unreferenced asset stays cached (in seconds).
pub const DEFAULT_ASSET_TIME_TO_LIVE_SECS: f64 = 30.0;

/// Default duration under which audio is decompressed eagerly (in seconds).
pub const DEFAULT_AUDIO_DECOMPRESS_LIMIT_SECS: f64 = 4.0;

/// Default number of background worker threads.
pub const DEFAULT_WORKER_POOL_SIZE: usize = 4;

/// Settings for the asset pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Seconds an unreferenced cache entry survives after its last access.
    pub asset_time_to_live: f64,

    /// Audio shorter than this many seconds is decompressed after loading.
    pub audio_decompress_limit: f64,

    /// Number of background worker threads.
    ///
    /// With 0 workers nothing drains the request queue: identities queued by
    /// `try_*` / `queue_*`, and short audio awaiting decompression, stay
    /// queued until a caller loads them (`processed_audio` for audio), and
    /// their cache records are never evicted while they stay queued.
    pub worker_pool_size: usize,

    /// Image substituted when an image fails to load.
    pub missing_image: Option<String>,

    /// Audio substituted when audio fails to load.
    pub missing_audio: Option<String>,

    /// Globs hiding matching files from the index entirely.
    pub path_ignore: Vec<String>,

    /// Globs excluding matching files from the digest only.
    pub digest_ignore: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            asset_time_to_live: DEFAULT_ASSET_TIME_TO_LIVE_SECS,
            audio_decompress_limit: DEFAULT_AUDIO_DECOMPRESS_LIMIT_SECS,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            missing_image: None,
            missing_audio: None,
            path_ignore: Vec::new(),
            digest_ignore: Vec::new(),
        }
    }
}

impl Settings {
    /// Parse settings from a JSON string.
    pub fn from_json_str(json: &str) -> AssetResult<Self> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| AssetError::Config(format!("invalid settings JSON: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> AssetResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            AssetError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Check durations and glob syntax.
    pub fn validate(&self) -> AssetResult<()> {
        check_seconds("assetTimeToLive", self.asset_time_to_live)?;
        check_seconds("audioDecompressLimit", self.audio_decompress_limit)?;
        IgnorePatterns::new(&self.path_ignore)?;
        IgnorePatterns::new(&self.digest_ignore)?;
        for (key, path) in [
            ("missingImage", &self.missing_image),
            ("missingAudio", &self.missing_audio),
        ] {
            if let Some(path) = path {
                if !path.starts_with('/') {
                    return Err(AssetError::Config(format!(
                        "{} must be an absolute asset path, got '{}'",
                        key, path
                    )));
                }
            }
        }
        Ok(())
    }

    /// Cache time-to-live as a duration.
    pub fn time_to_live(&self) -> Duration {
        Duration::from_secs_f64(self.asset_time_to_live)
    }

    /// Audio decompression threshold as a duration.
    pub fn audio_decompress_limit(&self) -> Duration {
        Duration::from_secs_f64(self.audio_decompress_limit)
    }

    /// Set the time-to-live in seconds.
    pub fn with_time_to_live(mut self, secs: f64) -> Self {
        self.asset_time_to_live = secs;
        self
    }

    /// Set the worker pool size.
    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    /// Set the missing-image fallback.
    pub fn with_missing_image(mut self, path: impl Into<String>) -> Self {
        self.missing_image = Some(path.into());
        self
    }

    /// Set the missing-audio fallback.
    pub fn with_missing_audio(mut self, path: impl Into<String>) -> Self {
        self.missing_audio = Some(path.into());
        self
    }

    /// Add a path-ignore glob.
    pub fn ignore_path(mut self, pattern: impl Into<String>) -> Self {
        self.path_ignore.push(pattern.into());
        self
    }

    /// Add a digest-ignore glob.
    pub fn ignore_in_digest(mut self, pattern: impl Into<String>) -> Self {
        self.digest_ignore.push(pattern.into());
        self
    }
}

fn check_seconds(key: &str, value: f64) -> AssetResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(AssetError::Config(format!(
            "{} must be a non-negative number of seconds, got {}",
            key, value
        )));
    }
    Ok(())
}

/// A compiled list of case-insensitive glob patterns.
///
/// Patterns are matched against full asset names such as `/items/a.png`;
/// `*` also matches across `/`.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<Pattern>,
}

impl IgnorePatterns {
    const OPTIONS: MatchOptions = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    /// Compile a list of glob strings.
    pub fn new<S: AsRef<str>>(globs: &[S]) -> AssetResult<Self> {
        let patterns = globs
            .iter()
            .map(|g| {
                Pattern::new(g.as_ref()).map_err(|e| {
                    AssetError::Config(format!("invalid glob '{}': {}", g.as_ref(), e))
                })
            })
            .collect::<AssetResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether any pattern matches `name`.
    pub fn matches(&self, name: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(name, Self::OPTIONS))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let settings = Settings::from_json_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.time_to_live(), Duration::from_secs(30));
    }

    #[test]
    fn test_camel_case_keys() {
        let settings = Settings::from_json_str(
            r#"{
                "assetTimeToLive": 2.5,
                "workerPoolSize": 0,
                "missingImage": "/missing.png",
                "digestIgnore": ["*.md"]
            }"#,
        )
        .unwrap();
        assert_eq!(settings.time_to_live(), Duration::from_millis(2500));
        assert_eq!(settings.worker_pool_size, 0);
        assert_eq!(settings.missing_image.as_deref(), Some("/missing.png"));
        assert_eq!(settings.digest_ignore, vec!["*.md"]);
    }

    #[test]
    fn test_rejects_negative_ttl() {
        let err = Settings::from_json_str(r#"{"assetTimeToLive": -1}"#).unwrap_err();
        assert!(matches!(err, AssetError::Config(_)));
    }

    #[test]
    fn test_rejects_bad_glob() {
        let settings = Settings::default().ignore_path("[");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_relative_fallback() {
        let settings = Settings::default().with_missing_audio("missing.wav");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_ignore_patterns_case_insensitive_across_dirs() {
        let patterns = IgnorePatterns::new(&["*.PSD", "/_previews/*"]).unwrap();
        assert!(patterns.matches("/art/deep/dir/source.psd"));
        assert!(patterns.matches("/_previews/a.png"));
        assert!(!patterns.matches("/art/a.png"));
        assert!(IgnorePatterns::default().is_empty());
    }
}
