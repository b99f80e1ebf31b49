//! The asset pipeline facade.
//!
//! # Overview
//!
//! [`Assets`] owns the file index, the cache, the request queue and the
//! worker pool. It is shared by reference (or `Arc`) between every consumer
//! of asset data; there is no global instance.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Assets                               │
//! │                                                                  │
//! │  json() image() audio() ──► drive ──► load_asset ◄──┐            │
//! │  font() bytes()               │                     │ recursion  │
//! │                               ▼                     │            │
//! │                    ┌─────────────────────┐          │            │
//! │  try_image()  ───► │ Mutex<State>        │    ┌─────┴───────┐    │
//! │  queue_*()         │  RequestQueue       │◄──►│ WorkerPool  │    │
//! │                    │  Cache              │    │ (N threads) │    │
//! │                    │  FramesIndex        │    └─────────────┘    │
//! │                    └─────────────────────┘                       │
//! │                                                                  │
//! │  FileIndex + AssetDigest (immutable, lock-free)                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! The index and digest are built by [`Assets::new`]; reloading means
//! building a new `Assets` and swapping it in. Dropping `Assets` stops and
//! joins the workers; loads already in progress finish first.

mod cache;
mod frames_index;
mod loader;
mod shared;
mod worker;

pub use cache::{AssetRecord, CleanupStats, ImageRecord};
pub use loader::Loaded;

use std::io::Read;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use crate::audio::Audio;
use crate::config::Settings;
use crate::error::AssetResult;
use crate::executor::{spawn_or_join, QueuePriority, WorkerPool};
use crate::font::Font;
use crate::frames::FramesSpecification;
use crate::identity::{AssetId, AssetKind};
use crate::imaging::Image;
use crate::index::{AssetDigest, FileDescriptor, FileIndex};
use crate::path::AssetPath;
use crate::source::{AssetSource, SourceMetadata, SourceRole};
use loader::LoadStack;
use shared::Shared;

/// The asset pipeline.
pub struct Assets {
    shared: Arc<Shared>,
    workers: WorkerPool,
}

impl Assets {
    /// Index `sources` (in load order), compute the digest and start the
    /// workers.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings, an unlistable source, an unreadable file
    /// (digest), or a worker thread that cannot be spawned.
    pub fn new(
        settings: Settings,
        sources: Vec<(Arc<dyn AssetSource>, SourceRole)>,
    ) -> AssetResult<Self> {
        let shared = Arc::new(Shared::new(settings, sources)?);

        let worker_shared = Arc::clone(&shared);
        let stop_shared = Arc::clone(&shared);
        let workers = spawn_or_join(
            shared.settings.worker_pool_size,
            move |index| worker::run(&worker_shared, index),
            move || signal_stop(&stop_shared),
        )?;

        Ok(Self { shared, workers })
    }

    // =========================================================================
    // JSON
    // =========================================================================

    /// A JSON document, or the value at its sub-path
    /// (`/player.config:movement.speed`).
    pub fn json(&self, path: &str) -> AssetResult<Arc<Value>> {
        let path = AssetPath::parse_absolute(path)?;
        let base = path.base.clone();
        self.get(AssetId::json(path))?.into_json(&base)
    }

    /// Resolve a JSON value that may reference another JSON asset.
    ///
    /// A string is an asset path, resolved against `base_dir` when
    /// relative, and is replaced by the document it names. Any other value
    /// is returned as is.
    pub fn fetch_json(&self, value: &Value, base_dir: &str) -> AssetResult<Value> {
        match value {
            Value::String(path) => {
                let resolved = AssetPath::relative_to(base_dir, path);
                Ok(self.json(&resolved)?.as_ref().clone())
            }
            other => Ok(other.clone()),
        }
    }

    // =========================================================================
    // Images
    // =========================================================================

    /// An image, with frame selection and directives applied.
    pub fn image(&self, path: &str) -> AssetResult<Arc<Image>> {
        Ok(self.image_record(path)?.image)
    }

    /// The full image record, including frames and alias information.
    pub fn image_record(&self, path: &str) -> AssetResult<ImageRecord> {
        let path = AssetPath::parse_absolute(path)?;
        let base = path.base.clone();
        self.get(AssetId::image(path))?.into_image(&base)
    }

    /// The image if it is cached; otherwise queue it and return `None`.
    pub fn try_image(&self, path: &str) -> AssetResult<Option<Arc<Image>>> {
        let path = AssetPath::parse_absolute(path)?;
        let base = path.base.clone();
        self.try_get(AssetId::image(path))?
            .map(|record| record.into_image(&base).map(|r| r.image))
            .transpose()
    }

    /// The frames specification that applies to an image file.
    ///
    /// Only the `.frames` file is loaded, not the image.
    pub fn image_frames(&self, path: &str) -> AssetResult<Option<Arc<FramesSpecification>>> {
        let path = AssetPath::parse_absolute(path)?;
        let mut guard = self.shared.state.lock();
        loop {
            let mut stack = LoadStack::default();
            match self.shared.load_frames(&mut guard, &mut stack, &path.base)? {
                Loaded::Ready(frames) => return Ok(frames),
                Loaded::Blocked => self.shared.done.wait(&mut guard),
            }
        }
    }

    // =========================================================================
    // Audio
    // =========================================================================

    /// An audio clip. Short clips may not be decompressed yet.
    pub fn audio(&self, path: &str) -> AssetResult<Arc<Audio>> {
        let path = AssetPath::parse_absolute(path)?;
        let base = path.base.clone();
        self.get(AssetId::audio(path))?.into_audio(&base)
    }

    /// The audio clip if it is cached; otherwise queue it and return `None`.
    pub fn try_audio(&self, path: &str) -> AssetResult<Option<Arc<Audio>>> {
        let path = AssetPath::parse_absolute(path)?;
        let base = path.base.clone();
        self.try_get(AssetId::audio(path))?
            .map(|record| record.into_audio(&base))
            .transpose()
    }

    /// An audio clip with its samples decoded.
    ///
    /// Waits for a worker that is already decompressing it, or decompresses
    /// it on the calling thread.
    pub fn processed_audio(&self, path: &str) -> AssetResult<Arc<Audio>> {
        let path = AssetPath::parse_absolute(path)?;
        let id = AssetId::audio(path);
        let mut guard = self.shared.state.lock();

        loop {
            let audio = self.shared.drive(&mut guard, &id)?.into_audio(&id.path.base)?;
            if audio.is_decompressed() {
                return Ok(audio);
            }

            if guard.queue.priority(&id) == QueuePriority::Working {
                self.shared.done.wait(&mut guard);
                continue;
            }

            guard.queue.mark_working(&id);
            return self.shared.post_process_audio(&mut guard, &id, audio);
        }
    }

    // =========================================================================
    // Fonts, Bytes, Files
    // =========================================================================

    pub fn font(&self, path: &str) -> AssetResult<Arc<Font>> {
        let path = AssetPath::parse_absolute(path)?;
        let base = path.base.clone();
        self.get(AssetId::new(AssetKind::Font, path))?
            .into_font(&base)
    }

    /// Raw content of the effective layer of a file, cached.
    pub fn bytes(&self, path: &str) -> AssetResult<Bytes> {
        let path = AssetPath::parse_absolute(path)?;
        let base = path.base.clone();
        self.get(AssetId::new(AssetKind::Bytes, path))?
            .into_bytes(&base)
    }

    /// Open the effective layer of a file for streaming. Bypasses the cache.
    pub fn open_file(&self, path: &str) -> AssetResult<Box<dyn Read + Send>> {
        let path = AssetPath::parse_absolute(path)?;
        let descriptor = self.shared.index.require(&path.base)?;
        self.shared.index.open_top(descriptor)
    }

    // =========================================================================
    // Index Queries
    // =========================================================================

    /// Files whose names start with `prefix` and end with `suffix`.
    pub fn scan(&self, prefix: Option<&str>, suffix: Option<&str>) -> Vec<String> {
        self.shared.index.scan(prefix, suffix)
    }

    /// Files with the given extension.
    pub fn scan_extension(&self, extension: &str) -> Vec<String> {
        self.shared.index.scan_extension(extension)
    }

    /// Whether the file part of `path` exists in any source.
    pub fn asset_exists(&self, path: &str) -> bool {
        AssetPath::parse_absolute(path)
            .map(|path| self.shared.index.contains(&path.base))
            .unwrap_or(false)
    }

    /// Where the file part of `path` comes from.
    pub fn asset_descriptor(&self, path: &str) -> AssetResult<FileDescriptor> {
        let path = AssetPath::parse_absolute(path)?;
        self.shared.index.require(&path.base).cloned()
    }

    /// Metadata of the source called `source_name`.
    pub fn asset_source_metadata(&self, source_name: &str) -> Option<&SourceMetadata> {
        self.shared.index.source_metadata(source_name)
    }

    /// Fingerprint of the whole asset set.
    pub fn digest(&self) -> AssetDigest {
        self.shared.digest
    }

    pub fn settings(&self) -> &Settings {
        &self.shared.settings
    }

    pub fn index(&self) -> &FileIndex {
        &self.shared.index
    }

    // =========================================================================
    // Background Loading
    // =========================================================================

    /// Queue JSON documents for background loading.
    pub fn queue_jsons<I, S>(&self, paths: I) -> AssetResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.queue(AssetKind::Json, paths)
    }

    /// Queue images for background loading.
    pub fn queue_images<I, S>(&self, paths: I) -> AssetResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.queue(AssetKind::Image, paths)
    }

    /// Queue audio clips for background loading.
    pub fn queue_audios<I, S>(&self, paths: I) -> AssetResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.queue(AssetKind::Audio, paths)
    }

    /// Validate every path, then queue the uncached ones at `Load`.
    /// Returns how many entries were queued or raised.
    fn queue<I, S>(&self, kind: AssetKind, paths: I) -> AssetResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = paths
            .into_iter()
            .map(|path| AssetPath::parse_absolute(path.as_ref()).map(|p| AssetId::new(kind, p)))
            .collect::<AssetResult<Vec<_>>>()?;

        let mut guard = self.shared.state.lock();
        let mut queued = 0;
        for id in ids {
            if !guard.cache.contains(&id) && guard.queue.enqueue(id, QueuePriority::Load) {
                queued += 1;
            }
        }
        if queued > 0 {
            self.shared.queued.notify_all();
        }
        debug!(kind = %kind, queued, "Queued assets for background loading");
        Ok(queued)
    }

    // =========================================================================
    // Cache Maintenance
    // =========================================================================

    /// Evict every unreferenced, unqueued entry regardless of age.
    pub fn clear_cache(&self) -> CleanupStats {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        state.cache.sweep(false, &state.queue)
    }

    /// Evict expired, unreferenced, unqueued entries.
    pub fn cleanup(&self) -> CleanupStats {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        state.cache.sweep(true, &state.queue)
    }

    /// Number of cached records.
    pub fn cached_count(&self) -> usize {
        self.shared.state.lock().cache.len()
    }

    /// Number of queued identities (including ones being worked on).
    pub fn queued_count(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn get(&self, id: AssetId) -> AssetResult<AssetRecord> {
        let mut guard = self.shared.state.lock();
        self.shared.drive(&mut guard, &id)
    }

    fn try_get(&self, id: AssetId) -> AssetResult<Option<AssetRecord>> {
        let mut guard = self.shared.state.lock();
        if let Some(record) = guard.cache.get(&id) {
            return Ok(Some(record));
        }
        if guard.queue.enqueue(id, QueuePriority::Load) {
            self.shared.queued.notify_one();
        }
        Ok(None)
    }
}

fn signal_stop(shared: &Shared) {
    shared.stop.store(true, Ordering::Release);
    // Taking the lock orders the flag before any worker's next wait
    let _guard = shared.state.lock();
    shared.queued.notify_all();
}

impl Drop for Assets {
    fn drop(&mut self) {
        signal_stop(&self.shared);
        self.workers.join();
    }
}

impl std::fmt::Debug for Assets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assets")
            .field("index", &self.shared.index)
            .field("digest", &self.shared.digest.to_hex())
            .field("workers", &self.workers.len())
            .finish()
    }
}
