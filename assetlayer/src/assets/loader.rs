//! The recursive, deadlock-avoiding asset loader.
//!
//! # Overview
//!
//! Every load, whether requested by a caller, picked up by a worker, or
//! needed by another load, goes through [`Shared::load_asset`]. The shared
//! mutex is held for bookkeeping only; file reads, decoding and image
//! processing run with it released.
//!
//! ```text
//!               load_asset(id)
//!                     │
//!        ┌────────────┼──────────────┬─────────────────┐
//!        ▼            ▼              ▼                 ▼
//!    cached?     on this thread's  Working on       claim id
//!    → Ready     load stack?       another thread?  (Working)
//!                → Circular        → Blocked            │
//!                  Dependency                           ▼
//!                                              load_kind(id)
//!                                     (may recurse into load_asset)
//!                                                       │
//!                         ┌─────────────────────────────┼──────────────┐
//!                         ▼                             ▼              ▼
//!                       Ready                        Blocked          Err
//!                  cache, dequeue or             give the claim   dequeue
//!                  queue PostProcess             back, retry      and report
//! ```
//!
//! # Blocked Loads
//!
//! A load that needs an identity another thread is working on does not
//! wait for it while holding its own claim: that is how two threads loading
//! each other's dependencies would deadlock. It returns
//! [`Loaded::Blocked`] instead, which unwinds the whole load, releasing
//! every claim on the way. The top-level caller waits on the "done"
//! condition variable and starts over.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::MutexGuard;
use serde_json::Value;
use tracing::{debug, error};

use super::cache::{AssetRecord, ImageRecord};
use super::shared::{Shared, State};
use crate::audio::Audio;
use crate::error::{AssetError, AssetResult};
use crate::executor::QueuePriority;
use crate::font::Font;
use crate::frames::FramesSpecification;
use crate::identity::{AssetId, AssetKind};
use crate::imaging;
use crate::json;
use crate::path::AssetPath;

/// Outcome of a load that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<T> {
    Ready(T),

    /// A dependency is being loaded by another thread; retry later.
    Blocked,
}

/// Unwrap a `AssetResult<Loaded<T>>`, propagating errors and `Blocked`.
macro_rules! try_ready {
    ($expr:expr) => {
        match $expr? {
            Loaded::Ready(value) => value,
            Loaded::Blocked => return Ok(Loaded::Blocked),
        }
    };
}

type Guard<'a> = MutexGuard<'a, State>;

/// Identities the current thread is loading, outermost first.
#[derive(Debug, Default)]
pub(crate) struct LoadStack {
    ids: Vec<AssetId>,
}

impl LoadStack {
    fn contains(&self, id: &AssetId) -> bool {
        self.ids.contains(id)
    }

    fn push(&mut self, id: AssetId) {
        self.ids.push(id);
    }

    fn pop(&mut self) {
        self.ids.pop();
    }
}

/// The configured fallback for `path`, unless `path` is the fallback.
fn fallback_for(configured: Option<&str>, path: &AssetPath) -> AssetResult<Option<AssetPath>> {
    let fallback = match configured {
        Some(fallback) => AssetPath::parse(fallback)?,
        None => return Ok(None),
    };
    if fallback.base.eq_ignore_ascii_case(&path.base) {
        return Ok(None);
    }
    Ok(Some(fallback))
}

/// Turn a caught panic payload into an error for `id`.
fn panicked(id: &AssetId, payload: &(dyn Any + Send)) -> AssetError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    error!(asset = %id, %message, "Asset load panicked");
    AssetError::Panicked {
        path: id.path.to_string(),
        message,
    }
}

/// Run `f` with the pipeline mutex released, reacquiring it afterwards.
fn unlock_during<T>(guard: &mut Guard<'_>, f: impl FnOnce() -> T) -> T {
    MutexGuard::unlocked(guard, f)
}

impl Shared {
    // =========================================================================
    // Entry Points
    // =========================================================================

    /// Load `id` on the calling thread, waiting while another thread owns
    /// it or one of its dependencies.
    pub(crate) fn drive(&self, guard: &mut Guard<'_>, id: &AssetId) -> AssetResult<AssetRecord> {
        loop {
            let mut stack = LoadStack::default();
            match self.load_asset(guard, &mut stack, id)? {
                Loaded::Ready(record) => return Ok(record),
                Loaded::Blocked => {
                    debug!(asset = %id, "Waiting on in-flight dependency");
                    self.done.wait(guard);
                }
            }
        }
    }

    /// The single re-entrant load entry point.
    pub(crate) fn load_asset(
        &self,
        guard: &mut Guard<'_>,
        stack: &mut LoadStack,
        id: &AssetId,
    ) -> AssetResult<Loaded<AssetRecord>> {
        if let Some(record) = guard.cache.get(id) {
            return Ok(Loaded::Ready(record));
        }
        if stack.contains(id) {
            return Err(AssetError::CircularDependency {
                path: id.path.to_string(),
            });
        }
        if guard.queue.priority(id) == QueuePriority::Working {
            return Ok(Loaded::Blocked);
        }

        let previous = guard.queue.mark_working(id);
        stack.push(id.clone());
        // A panicking load still releases its claim below
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.load_kind(guard, stack, id)))
            .unwrap_or_else(|payload| Err(panicked(id, payload.as_ref())));
        stack.pop();

        match result {
            Ok(Loaded::Ready(record)) => {
                guard.cache.insert(id.clone(), record.clone());
                if self.needs_post_process(&record) {
                    guard.queue.requeue(id, QueuePriority::PostProcess);
                    self.queued.notify_one();
                } else {
                    guard.queue.remove(id);
                }
                self.done.notify_all();
                debug!(asset = %id, "Loaded asset");
                Ok(Loaded::Ready(record))
            }
            Ok(Loaded::Blocked) => {
                guard.queue.requeue(id, previous);
                self.done.notify_all();
                debug!(asset = %id, requeued = %previous, "Asset load blocked");
                Ok(Loaded::Blocked)
            }
            Err(e) => {
                guard.queue.remove(id);
                self.done.notify_all();
                Err(e)
            }
        }
    }

    fn needs_post_process(&self, record: &AssetRecord) -> bool {
        match record {
            AssetRecord::Audio(audio) => {
                !audio.is_decompressed()
                    && audio.duration() < self.settings.audio_decompress_limit()
            }
            _ => false,
        }
    }

    fn load_kind(
        &self,
        guard: &mut Guard<'_>,
        stack: &mut LoadStack,
        id: &AssetId,
    ) -> AssetResult<Loaded<AssetRecord>> {
        match id.kind {
            AssetKind::Json => self.load_json(guard, stack, &id.path),
            AssetKind::Image => self.load_image(guard, stack, &id.path),
            AssetKind::Audio => self.load_audio(guard, stack, &id.path),
            AssetKind::Font => self.load_binary(guard, &id.path, |path, data| {
                Font::from_bytes(path, data).map(|font| AssetRecord::Font(Arc::new(font)))
            }),
            AssetKind::Bytes => {
                self.load_binary(guard, &id.path, |_, data| Ok(AssetRecord::Bytes(data)))
            }
        }
    }

    // =========================================================================
    // JSON
    // =========================================================================

    fn load_json(
        &self,
        guard: &mut Guard<'_>,
        stack: &mut LoadStack,
        path: &AssetPath,
    ) -> AssetResult<Loaded<AssetRecord>> {
        if !path.directives.is_empty() {
            return Err(AssetError::invalid_path(
                path.to_string(),
                "directives only apply to images",
            ));
        }

        if let Some(sub_path) = &path.sub_path {
            let whole = try_ready!(self.load_asset(guard, stack, &AssetId::json(path.file_only())));
            let document = whole.into_json(&path.base)?;
            let value = json::extract(&path.base, &document, sub_path)?;
            return Ok(Loaded::Ready(AssetRecord::Json(Arc::new(value))));
        }

        let descriptor = self.index.require(&path.base)?.clone();
        let document = unlock_during(guard, || -> AssetResult<Value> {
            let mut layers = descriptor.layers();
            let (primary_name, primary_source) = layers
                .next()
                .ok_or_else(|| AssetError::not_found(&path.base))?;
            let primary = json::parse_layer(
                primary_name,
                &self.index.read_layer(primary_name, primary_source)?,
            )?;

            let patches = layers
                .map(|(name, source)| {
                    let bytes = self.index.read_layer(name, source)?;
                    let value = json::parse_layer(name, &bytes)?;
                    Ok((self.index.source(source).name().to_string(), value))
                })
                .collect::<AssetResult<Vec<_>>>()?;

            json::combine_layers(&path.base, primary, patches)
        })?;

        Ok(Loaded::Ready(AssetRecord::Json(Arc::new(document))))
    }

    // =========================================================================
    // Images
    // =========================================================================

    fn load_image(
        &self,
        guard: &mut Guard<'_>,
        stack: &mut LoadStack,
        path: &AssetPath,
    ) -> AssetResult<Loaded<AssetRecord>> {
        let error = match self.load_image_unsubstituted(guard, stack, path) {
            Err(e) if path.is_plain() && e.is_substitutable() => e,
            other => return other,
        };

        let fallback = match fallback_for(self.settings.missing_image.as_deref(), path)? {
            Some(fallback) => fallback,
            None => return Err(error),
        };

        error!(asset = %path, error = %error, fallback = %fallback, "Substituting missing image");
        let record = try_ready!(self.load_asset(guard, stack, &AssetId::image(fallback.clone())));
        let substitute = ImageRecord {
            alias: true,
            ..record.into_image(&fallback.base)?
        };
        Ok(Loaded::Ready(AssetRecord::Image(substitute)))
    }

    fn load_image_unsubstituted(
        &self,
        guard: &mut Guard<'_>,
        stack: &mut LoadStack,
        path: &AssetPath,
    ) -> AssetResult<Loaded<AssetRecord>> {
        if !path.directives.is_empty() {
            let source = try_ready!(self.load_asset(
                guard,
                stack,
                &AssetId::image(path.without_directives())
            ));
            let source = source.into_image(&path.base)?;
            let processed = unlock_during(guard, || {
                imaging::apply_directives(
                    &path.to_string(),
                    source.image.as_ref().clone(),
                    &path.directives,
                )
            })?;
            return Ok(Loaded::Ready(AssetRecord::Image(ImageRecord {
                image: Arc::new(processed),
                frames: None,
                alias: false,
            })));
        }

        if let Some(frame) = &path.sub_path {
            let base = try_ready!(self.load_asset(guard, stack, &AssetId::image(path.file_only())));
            let base = base.into_image(&path.base)?;
            return self.cut_frame(guard, path, frame, base).map(Loaded::Ready);
        }

        let frames = try_ready!(self.load_frames(guard, stack, &path.base));
        let descriptor = self.index.require(&path.base)?.clone();
        let image = unlock_during(guard, || -> AssetResult<imaging::Image> {
            let bytes = self.index.read_top(&descriptor)?;
            imaging::decode(&path.base, &bytes)
        })?;

        Ok(Loaded::Ready(AssetRecord::Image(ImageRecord {
            image: Arc::new(image),
            frames,
            alias: false,
        })))
    }

    fn cut_frame(
        &self,
        guard: &mut Guard<'_>,
        path: &AssetPath,
        frame: &str,
        base: ImageRecord,
    ) -> AssetResult<AssetRecord> {
        let sub_path_error = |reason: String| AssetError::SubPath {
            path: path.base.clone(),
            sub_path: frame.to_string(),
            reason,
        };

        let frames = base
            .frames
            .clone()
            .ok_or_else(|| sub_path_error("image has no frames file".to_string()))?;
        let rect = frames
            .get_rect(frame)
            .ok_or_else(|| sub_path_error(format!("no frame '{}' in {}", frame, frames.frames_file)))?;

        let (width, height) = base.image.dimensions();
        if rect.x0 == 0 && rect.y0 == 0 && rect.x1 == width && rect.y1 == height {
            return Ok(AssetRecord::Image(ImageRecord {
                alias: true,
                ..base
            }));
        }

        let cropped = unlock_during(guard, || imaging::crop(&path.to_string(), &base.image, rect))?;
        Ok(AssetRecord::Image(ImageRecord {
            image: Arc::new(cropped),
            frames: Some(frames),
            alias: false,
        }))
    }

    /// Load and parse the frames file that applies to `image_path`.
    pub(crate) fn load_frames(
        &self,
        guard: &mut Guard<'_>,
        stack: &mut LoadStack,
        image_path: &str,
    ) -> AssetResult<Loaded<Option<Arc<FramesSpecification>>>> {
        let frames_file = match guard.frames.resolve(&self.index, image_path) {
            Some(file) => file,
            None => return Ok(Loaded::Ready(None)),
        };

        let record = try_ready!(self.load_asset(
            guard,
            stack,
            &AssetId::json(AssetPath::new(frames_file.clone()))
        ));
        let document = record.into_json(&frames_file)?;
        let specification = FramesSpecification::parse(&frames_file, &document)?;
        Ok(Loaded::Ready(Some(Arc::new(specification))))
    }

    // =========================================================================
    // Audio, Fonts, Bytes
    // =========================================================================

    fn load_audio(
        &self,
        guard: &mut Guard<'_>,
        stack: &mut LoadStack,
        path: &AssetPath,
    ) -> AssetResult<Loaded<AssetRecord>> {
        let error = match self.load_binary(guard, path, |name, data| {
            Audio::probe(name, data).map(|audio| AssetRecord::Audio(Arc::new(audio)))
        }) {
            Err(e) if path.is_plain() && e.is_substitutable() => e,
            other => return other,
        };

        let fallback = match fallback_for(self.settings.missing_audio.as_deref(), path)? {
            Some(fallback) => fallback,
            None => return Err(error),
        };

        error!(asset = %path, error = %error, fallback = %fallback, "Substituting missing audio");
        let record = try_ready!(self.load_asset(guard, stack, &AssetId::audio(fallback.clone())));
        // A private copy, so the substitute and the fallback age independently
        let audio = record.into_audio(&fallback.base)?;
        Ok(Loaded::Ready(AssetRecord::Audio(Arc::new(
            audio.as_ref().clone(),
        ))))
    }

    /// Read the effective layer of a whole file and decode it with `decode`.
    fn load_binary(
        &self,
        guard: &mut Guard<'_>,
        path: &AssetPath,
        decode: impl FnOnce(&str, Bytes) -> AssetResult<AssetRecord>,
    ) -> AssetResult<Loaded<AssetRecord>> {
        if !path.is_plain() {
            return Err(AssetError::invalid_path(
                path.to_string(),
                "sub-paths and directives are not valid here",
            ));
        }

        let descriptor = self.index.require(&path.base)?.clone();
        let record = unlock_during(guard, || {
            let bytes = self.index.read_top(&descriptor)?;
            decode(&path.base, Bytes::from(bytes))
        })?;
        Ok(Loaded::Ready(record))
    }

    // =========================================================================
    // Post-Processing
    // =========================================================================

    /// Decompress a cached audio record in place.
    ///
    /// The caller must have claimed `id` (`Working`). The claim is released
    /// on every path.
    pub(crate) fn post_process_audio(
        &self,
        guard: &mut Guard<'_>,
        id: &AssetId,
        audio: Arc<Audio>,
    ) -> AssetResult<Arc<Audio>> {
        let path = id.path.to_string();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            unlock_during(guard, || audio.decompress(&path))
        }))
        .unwrap_or_else(|payload| Err(panicked(id, payload.as_ref())));

        let outcome = match result {
            Ok(decompressed) => {
                let decompressed = Arc::new(decompressed);
                guard
                    .cache
                    .replace(id, AssetRecord::Audio(Arc::clone(&decompressed)));
                debug!(asset = %id, "Decompressed audio");
                Ok(decompressed)
            }
            Err(e) => Err(e),
        };

        guard.queue.remove(id);
        self.done.notify_all();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::source::{AssetSource, MemorySource, SourceRole};
    use serde_json::json;

    fn shared(files: &[(&str, &[u8])]) -> Arc<Shared> {
        let mut source = MemorySource::new("mem");
        for (name, data) in files {
            source.insert(name, data.to_vec());
        }
        let sources: Vec<(Arc<dyn AssetSource>, SourceRole)> =
            vec![(Arc::new(source) as Arc<dyn AssetSource>, SourceRole::Base)];
        Arc::new(Shared::new(Settings::default().with_worker_pool_size(0), sources).unwrap())
    }

    fn json_id(path: &str) -> AssetId {
        AssetId::json(AssetPath::parse(path).unwrap())
    }

    #[test]
    fn test_load_on_stack_is_circular() {
        let shared = shared(&[("/a.json", b"{}")]);
        let mut guard = shared.state.lock();
        let mut stack = LoadStack::default();
        stack.push(json_id("/a.json"));

        let result = shared.load_asset(&mut guard, &mut stack, &json_id("/a.json"));
        assert!(matches!(result, Err(AssetError::CircularDependency { .. })));
    }

    #[test]
    fn test_working_elsewhere_is_blocked() {
        let shared = shared(&[("/a.json", b"{}")]);
        let mut guard = shared.state.lock();
        guard.queue.mark_working(&json_id("/a.json"));

        let result = shared
            .load_asset(&mut guard, &mut LoadStack::default(), &json_id("/a.json"))
            .unwrap();
        assert!(matches!(result, Loaded::Blocked));
        assert_eq!(
            guard.queue.priority(&json_id("/a.json")),
            QueuePriority::Working
        );
    }

    #[test]
    fn test_blocked_dependency_releases_claim() {
        let shared = shared(&[("/a.json", b"{\"x\": 1}")]);
        let mut guard = shared.state.lock();
        guard.queue.enqueue(json_id("/a.json:x"), QueuePriority::Load);
        guard.queue.mark_working(&json_id("/a.json"));

        let result = shared
            .load_asset(&mut guard, &mut LoadStack::default(), &json_id("/a.json:x"))
            .unwrap();
        assert!(matches!(result, Loaded::Blocked));
        // Handed back at the priority it had before the attempt
        assert_eq!(
            guard.queue.priority(&json_id("/a.json:x")),
            QueuePriority::Load
        );
    }

    #[test]
    fn test_ready_load_is_cached_and_dequeued() {
        let shared = shared(&[("/a.json", b"{\"x\": [1, 2]}")]);
        let mut guard = shared.state.lock();
        guard.queue.enqueue(json_id("/a.json:x[1]"), QueuePriority::Load);

        let record = shared.drive(&mut guard, &json_id("/a.json:x[1]")).unwrap();
        assert_eq!(*record.into_json("/a.json").unwrap(), json!(2));
        assert!(guard.queue.is_empty());
        assert!(guard.cache.contains(&json_id("/a.json")));
        assert!(guard.cache.contains(&json_id("/a.json:x[1]")));
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let shared = shared(&[("/bad.json", b"{oops")]);
        let mut guard = shared.state.lock();

        let err = shared.drive(&mut guard, &json_id("/bad.json")).unwrap_err();
        assert!(matches!(err, AssetError::Malformed { .. }));
        assert!(!guard.cache.contains(&json_id("/bad.json")));
        assert!(guard.queue.is_empty());
    }

    /// Lists one file and panics whenever it is opened.
    #[derive(Default)]
    struct PanickingSource {
        metadata: crate::source::SourceMetadata,
    }

    impl AssetSource for PanickingSource {
        fn name(&self) -> &str {
            "panicking"
        }

        fn list(&self) -> std::io::Result<Vec<String>> {
            Ok(vec!["/boom.json".to_string()])
        }

        fn open(&self, _name: &str) -> std::io::Result<Box<dyn std::io::Read + Send>> {
            panic!("disk on fire");
        }

        fn metadata(&self) -> &crate::source::SourceMetadata {
            &self.metadata
        }
    }

    #[test]
    fn test_panicking_load_releases_claim() {
        let settings = Settings::default()
            .with_worker_pool_size(0)
            .ignore_in_digest("/boom.json");
        let sources: Vec<(Arc<dyn AssetSource>, SourceRole)> = vec![(
            Arc::new(PanickingSource::default()) as Arc<dyn AssetSource>,
            SourceRole::Base,
        )];
        let shared = Shared::new(settings, sources).unwrap();
        let mut guard = shared.state.lock();

        for _ in 0..2 {
            let err = shared.drive(&mut guard, &json_id("/boom.json")).unwrap_err();
            match err {
                AssetError::Panicked { message, .. } => assert_eq!(message, "disk on fire"),
                other => panic!("unexpected error: {}", other),
            }
            assert!(guard.queue.is_empty());
            assert!(!guard.cache.contains(&json_id("/boom.json")));
        }
    }

    #[test]
    fn test_json_rejects_directives() {
        let shared = shared(&[("/a.json", b"{}")]);
        let mut guard = shared.state.lock();
        let err = shared
            .drive(&mut guard, &json_id("/a.json?flipx"))
            .unwrap_err();
        assert!(matches!(err, AssetError::InvalidPath { .. }));
    }
}
