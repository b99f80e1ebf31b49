//! Loaded-asset cache with TTL eviction.
//!
//! # Eviction Policy
//!
//! An entry is evicted by [`Cache::sweep`] when all of these hold:
//!
//! 1. It was not accessed within the time-to-live (skipped by `clear_cache`)
//! 2. Its payload is not referenced outside the cache ([`AssetRecord::should_persist`])
//! 3. Its identity is not in the request queue
//!
//! Alias records hold a reference to the record they alias, which keeps
//! that record persistent. Aliases are therefore swept first so that an
//! alias and its target can both go in a single pass.
//!
//! Access timestamps are "smeared": a hit moves the stamp to `now` minus a
//! random fraction of a tenth of the TTL, so assets loaded in the same frame
//! do not all expire (and reload) in the same frame.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use crate::audio::Audio;
use crate::error::{AssetError, AssetResult};
use crate::executor::RequestQueue;
use crate::font::Font;
use crate::frames::FramesSpecification;
use crate::identity::{AssetId, AssetKind};
use crate::imaging::Image;

/// Fraction of the TTL used as the upper bound of the freshen jitter.
const FRESHEN_JITTER: f64 = 0.1;

// =============================================================================
// Records
// =============================================================================

/// A decoded image plus the frames that cut it.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub image: Arc<Image>,

    /// Frames of the image file, when a `.frames` file applies.
    pub frames: Option<Arc<FramesSpecification>>,

    /// Shares its image with another record (a whole-image frame or a
    /// missing-image substitute).
    pub alias: bool,
}

/// A cached payload.
#[derive(Debug, Clone)]
pub enum AssetRecord {
    Json(Arc<Value>),
    Image(ImageRecord),
    Audio(Arc<Audio>),
    Font(Arc<Font>),
    Bytes(Bytes),
}

impl AssetRecord {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetRecord::Json(_) => AssetKind::Json,
            AssetRecord::Image(_) => AssetKind::Image,
            AssetRecord::Audio(_) => AssetKind::Audio,
            AssetRecord::Font(_) => AssetKind::Font,
            AssetRecord::Bytes(_) => AssetKind::Bytes,
        }
    }

    /// Whether the payload is still referenced outside the cache.
    ///
    /// Alias images never persist on their own. Byte blobs never persist:
    /// callers hold their own `Bytes` handle, which stays valid after
    /// eviction.
    pub fn should_persist(&self) -> bool {
        match self {
            AssetRecord::Json(value) => Arc::strong_count(value) > 1,
            AssetRecord::Image(record) => !record.alias && Arc::strong_count(&record.image) > 1,
            AssetRecord::Audio(audio) => Arc::strong_count(audio) > 1,
            AssetRecord::Font(font) => Arc::strong_count(font) > 1,
            AssetRecord::Bytes(_) => false,
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, AssetRecord::Image(ImageRecord { alias: true, .. }))
    }

    pub(crate) fn into_json(self, path: &str) -> AssetResult<Arc<Value>> {
        match self {
            AssetRecord::Json(value) => Ok(value),
            _ => Err(mismatch(path, AssetKind::Json)),
        }
    }

    pub(crate) fn into_image(self, path: &str) -> AssetResult<ImageRecord> {
        match self {
            AssetRecord::Image(record) => Ok(record),
            _ => Err(mismatch(path, AssetKind::Image)),
        }
    }

    pub(crate) fn into_audio(self, path: &str) -> AssetResult<Arc<Audio>> {
        match self {
            AssetRecord::Audio(audio) => Ok(audio),
            _ => Err(mismatch(path, AssetKind::Audio)),
        }
    }

    pub(crate) fn into_font(self, path: &str) -> AssetResult<Arc<Font>> {
        match self {
            AssetRecord::Font(font) => Ok(font),
            _ => Err(mismatch(path, AssetKind::Font)),
        }
    }

    pub(crate) fn into_bytes(self, path: &str) -> AssetResult<Bytes> {
        match self {
            AssetRecord::Bytes(bytes) => Ok(bytes),
            _ => Err(mismatch(path, AssetKind::Bytes)),
        }
    }
}

fn mismatch(path: &str, expected: AssetKind) -> AssetError {
    AssetError::KindMismatch {
        path: path.to_string(),
        expected: expected.name(),
    }
}

// =============================================================================
// Cleanup Statistics
// =============================================================================

/// Result of a cache sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Entries considered.
    pub examined: usize,

    /// Entries evicted.
    pub removed: usize,
}

impl fmt::Display for CleanupStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "removed {} of {} cached assets", self.removed, self.examined)
    }
}

// =============================================================================
// Cache
// =============================================================================

#[derive(Debug)]
struct CacheEntry {
    record: AssetRecord,
    accessed: Instant,
}

/// Identity → record map. Lives under the pipeline mutex.
#[derive(Debug)]
pub(crate) struct Cache {
    entries: HashMap<AssetId, CacheEntry>,
    time_to_live: Duration,
}

impl Cache {
    pub fn new(time_to_live: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            time_to_live,
        }
    }

    /// A clone of the record, freshening its access stamp.
    pub fn get(&mut self, id: &AssetId) -> Option<AssetRecord> {
        let ttl = self.time_to_live;
        self.entries.get_mut(id).map(|entry| {
            freshen(&mut entry.accessed, ttl);
            entry.record.clone()
        })
    }

    /// The record without touching its access stamp.
    pub fn peek(&self, id: &AssetId) -> Option<&AssetRecord> {
        self.entries.get(id).map(|entry| &entry.record)
    }

    pub fn contains(&self, id: &AssetId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn insert(&mut self, id: AssetId, record: AssetRecord) {
        let mut accessed = Instant::now();
        freshen(&mut accessed, self.time_to_live);
        self.entries.insert(id, CacheEntry { record, accessed });
    }

    /// Swap the payload of an existing entry, keeping its access stamp.
    pub fn replace(&mut self, id: &AssetId, record: AssetRecord) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.record = record;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Evict every entry that is expired (when `check_ttl`), not persistent
    /// and not queued.
    pub fn sweep(&mut self, check_ttl: bool, queue: &RequestQueue) -> CleanupStats {
        let now = Instant::now();
        let examined = self.entries.len();
        let mut removed = 0;

        for aliases in [true, false] {
            let ttl = self.time_to_live;
            let before = self.entries.len();
            self.entries.retain(|id, entry| {
                if entry.record.is_alias() != aliases {
                    return true;
                }
                let expired = !check_ttl || now.saturating_duration_since(entry.accessed) >= ttl;
                !(expired && !entry.record.should_persist() && !queue.contains(id))
            });
            removed += before - self.entries.len();
        }

        let stats = CleanupStats { examined, removed };
        debug!(
            examined = stats.examined,
            removed = stats.removed,
            remaining = self.entries.len(),
            check_ttl,
            "Swept asset cache"
        );
        stats
    }
}

/// Move `accessed` forward to a smeared "now", never backwards.
fn freshen(accessed: &mut Instant, ttl: Duration) {
    let now = Instant::now();
    let jitter = ttl.mul_f64(FRESHEN_JITTER * rand::random::<f64>());
    let stamp = now.checked_sub(jitter).unwrap_or(now);
    if stamp > *accessed {
        *accessed = stamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::QueuePriority;
    use crate::path::AssetPath;
    use serde_json::json;

    fn json_id(name: &str) -> AssetId {
        AssetId::json(AssetPath::new(name))
    }

    fn image_id(name: &str) -> AssetId {
        AssetId::image(AssetPath::new(name))
    }

    fn image_record(image: Arc<Image>, alias: bool) -> AssetRecord {
        AssetRecord::Image(ImageRecord {
            image,
            frames: None,
            alias,
        })
    }

    #[test]
    fn test_should_persist_tracks_external_references() {
        let value = Arc::new(json!({"a": 1}));
        let record = AssetRecord::Json(Arc::clone(&value));
        assert!(record.should_persist());

        drop(value);
        assert!(!record.should_persist());
    }

    #[test]
    fn test_alias_never_persists() {
        let image = Arc::new(Image::new(1, 1));
        let _held = Arc::clone(&image);
        assert!(!image_record(Arc::clone(&image), true).should_persist());
        assert!(image_record(image, false).should_persist());
    }

    #[test]
    fn test_bytes_never_persist() {
        assert!(!AssetRecord::Bytes(Bytes::from_static(b"x")).should_persist());
    }

    #[test]
    fn test_clear_respects_persistence_and_queue() {
        let mut cache = Cache::new(Duration::from_secs(3600));
        let mut queue = RequestQueue::new();

        let held = Arc::new(json!(1));
        cache.insert(json_id("/held.json"), AssetRecord::Json(Arc::clone(&held)));
        cache.insert(json_id("/free.json"), AssetRecord::Json(Arc::new(json!(2))));
        cache.insert(json_id("/queued.json"), AssetRecord::Json(Arc::new(json!(3))));
        queue.enqueue(json_id("/queued.json"), QueuePriority::PostProcess);

        let stats = cache.sweep(false, &queue);
        assert_eq!(stats, CleanupStats { examined: 3, removed: 1 });
        assert!(cache.contains(&json_id("/held.json")));
        assert!(cache.contains(&json_id("/queued.json")));
        assert!(!cache.contains(&json_id("/free.json")));
    }

    #[test]
    fn test_cleanup_keeps_unexpired_entries() {
        let mut cache = Cache::new(Duration::from_secs(3600));
        cache.insert(json_id("/a.json"), AssetRecord::Json(Arc::new(json!(1))));

        let stats = cache.sweep(true, &RequestQueue::new());
        assert_eq!(stats.removed, 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cleanup_evicts_expired_entries() {
        let mut cache = Cache::new(Duration::ZERO);
        cache.insert(json_id("/a.json"), AssetRecord::Json(Arc::new(json!(1))));

        let stats = cache.sweep(true, &RequestQueue::new());
        assert_eq!(stats.removed, 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_alias_and_target_go_in_one_pass() {
        let mut cache = Cache::new(Duration::ZERO);
        let image = Arc::new(Image::new(2, 2));
        cache.insert(image_id("/base.png"), image_record(Arc::clone(&image), false));
        cache.insert(image_id("/alias.png"), image_record(image, true));

        assert!(cache.peek(&image_id("/base.png")).unwrap().should_persist());

        let stats = cache.sweep(true, &RequestQueue::new());
        assert_eq!(stats.removed, 2);
    }

    #[test]
    fn test_get_freshens_but_never_moves_back() {
        let mut cache = Cache::new(Duration::from_secs(10));
        let id = json_id("/a.json");
        cache.insert(id.clone(), AssetRecord::Json(Arc::new(json!(1))));

        let before = cache.entries[&id].accessed;
        for _ in 0..20 {
            assert!(cache.get(&id).is_some());
            let after = cache.entries[&id].accessed;
            assert!(after >= before);
        }
        assert!(cache.entries[&id].accessed <= Instant::now());
    }

    #[test]
    fn test_replace_keeps_entry() {
        let mut cache = Cache::new(Duration::from_secs(10));
        let id = json_id("/a.json");
        assert!(!cache.replace(&id, AssetRecord::Json(Arc::new(json!(0)))));

        cache.insert(id.clone(), AssetRecord::Json(Arc::new(json!(1))));
        assert!(cache.replace(&id, AssetRecord::Json(Arc::new(json!(2)))));
        match cache.peek(&id) {
            Some(AssetRecord::Json(value)) => assert_eq!(**value, json!(2)),
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_kind_mismatch() {
        let record = AssetRecord::Bytes(Bytes::from_static(b"x"));
        assert_eq!(record.kind(), AssetKind::Bytes);
        assert!(matches!(
            record.into_json("/a"),
            Err(AssetError::KindMismatch { expected: "json", .. })
        ));
    }
}
