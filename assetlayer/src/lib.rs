//! AssetLayer - layered asset caching and loading for games
//!
//! This library provides the asset pipeline that sits behind a game's
//! `Assets` facade: a case-insensitive file index merged from multiple
//! sources (with patch layering), a priority request queue drained by a
//! worker pool, a recursive deadlock-avoiding loader, and a TTL cache that
//! keeps externally referenced assets alive.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use assetlayer::{Assets, DirectorySource, Settings, SourceRole};
//!
//! let base = DirectorySource::new("assets/packed")?;
//! let mods = DirectorySource::new("mods/my_mod")?;
//!
//! let assets = Assets::new(
//!     Settings::default(),
//!     vec![
//!         (Arc::new(base) as _, SourceRole::Base),
//!         (Arc::new(mods) as _, SourceRole::Patch),
//!     ],
//! )?;
//!
//! let speed = assets.json("/player.config:movement.speed")?;
//! let sprite = assets.image("/items/sword.png:idle?flipx")?;
//! println!("asset digest: {}", assets.digest());
//! ```

pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod executor;
pub mod font;
pub mod frames;
pub mod identity;
pub mod imaging;
pub mod index;
pub mod json;
pub mod path;
pub mod source;

pub use assets::{AssetRecord, Assets, CleanupStats, ImageRecord};
pub use audio::Audio;
pub use config::{IgnorePatterns, Settings};
pub use error::{AssetError, AssetResult};
pub use executor::QueuePriority;
pub use font::Font;
pub use frames::{FramesSpecification, Rect};
pub use identity::{AssetId, AssetKind};
pub use imaging::Image;
pub use index::{AssetDigest, FileDescriptor, FileIndex, SourceId};
pub use path::AssetPath;
pub use source::{AssetSource, DirectorySource, MemorySource, SourceMetadata, SourceRole};

/// Library version, recorded in logs when an asset set is indexed.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
