//! Request queue for asset loads.
//!
//! The queue maps each [`AssetId`] to a [`QueuePriority`]. It doubles as the
//! in-flight table: an identity a thread is currently loading stays in the
//! queue at [`QueuePriority::Working`] until that thread is done with it.
//!
//! Identities are ordered by priority (highest first), then by insertion
//! order (FIFO within the same priority level). This ensures:
//!
//! 1. `Load` requests preempt `PostProcess` work
//! 2. Requests at the same priority are served in order
//! 3. An identity is never queued twice
//!
//! # Example
//!
//! ```
//! use assetlayer::{AssetId, AssetPath, QueuePriority};
//! use assetlayer::executor::RequestQueue;
//!
//! let mut queue = RequestQueue::new();
//! let a = AssetId::json(AssetPath::new("/a.json"));
//! let b = AssetId::json(AssetPath::new("/b.json"));
//!
//! queue.enqueue(a.clone(), QueuePriority::PostProcess);
//! queue.enqueue(b.clone(), QueuePriority::Load);
//!
//! // Load comes out first despite being queued second
//! assert_eq!(queue.next_pending(), Some((b, QueuePriority::Load)));
//! ```

use std::fmt;

use indexmap::IndexMap;

use crate::identity::AssetId;

// =============================================================================
// Queue Priority
// =============================================================================

/// Priority of a queued identity. Ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueuePriority {
    /// Not queued.
    None,

    /// Claimed by a thread; never picked up by workers.
    Working,

    /// Loaded, awaiting post-processing.
    PostProcess,

    /// Awaiting its initial load.
    Load,
}

impl QueuePriority {
    /// Whether a worker may pick up an identity at this priority.
    pub fn is_pending(&self) -> bool {
        *self > QueuePriority::Working
    }
}

impl fmt::Display for QueuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueuePriority::None => write!(f, "none"),
            QueuePriority::Working => write!(f, "working"),
            QueuePriority::PostProcess => write!(f, "post-process"),
            QueuePriority::Load => write!(f, "load"),
        }
    }
}

// =============================================================================
// Request Queue
// =============================================================================

/// Insertion-ordered identity → priority map.
///
/// The queue is not thread-safe; the asset pipeline keeps it under its
/// shared mutex.
#[derive(Default)]
pub struct RequestQueue {
    entries: IndexMap<AssetId, QueuePriority>,
}

impl RequestQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `id` at `priority`, or raise its existing priority.
    ///
    /// Never lowers a priority, never duplicates an identity, and leaves a
    /// `Working` entry untouched. Returns `true` if the entry changed.
    pub fn enqueue(&mut self, id: AssetId, priority: QueuePriority) -> bool {
        if priority == QueuePriority::None {
            return false;
        }
        match self.entries.get_mut(&id) {
            Some(QueuePriority::Working) => false,
            Some(current) if *current < priority => {
                *current = priority;
                true
            }
            Some(_) => false,
            None => {
                self.entries.insert(id, priority);
                true
            }
        }
    }

    /// Current priority of `id` (`None` when absent).
    pub fn priority(&self, id: &AssetId) -> QueuePriority {
        self.entries.get(id).copied().unwrap_or(QueuePriority::None)
    }

    /// Claim `id` for the calling thread.
    ///
    /// Returns the priority the entry had before.
    pub fn mark_working(&mut self, id: &AssetId) -> QueuePriority {
        match self.entries.get_mut(id) {
            Some(current) => std::mem::replace(current, QueuePriority::Working),
            None => {
                self.entries.insert(id.clone(), QueuePriority::Working);
                QueuePriority::None
            }
        }
    }

    /// Put `id` at the back of the `priority` band.
    ///
    /// Unlike [`enqueue`](Self::enqueue) this may lower the priority; it is
    /// how a thread hands back an entry it claimed. `None` removes it.
    pub fn requeue(&mut self, id: &AssetId, priority: QueuePriority) {
        self.entries.shift_remove(id);
        if priority != QueuePriority::None {
            self.entries.insert(id.clone(), priority);
        }
    }

    /// Drop `id` from the queue.
    pub fn remove(&mut self, id: &AssetId) -> QueuePriority {
        self.entries
            .shift_remove(id)
            .unwrap_or(QueuePriority::None)
    }

    /// The oldest identity at the highest pending priority.
    pub fn next_pending(&self) -> Option<(AssetId, QueuePriority)> {
        let mut best: Option<(&AssetId, QueuePriority)> = None;
        for (id, &priority) in &self.entries {
            if !priority.is_pending() {
                continue;
            }
            // Strict comparison keeps the earliest entry within a band
            if best.map_or(true, |(_, p)| priority > p) {
                best = Some((id, priority));
                if priority == QueuePriority::Load {
                    break;
                }
            }
        }
        best.map(|(id, priority)| (id.clone(), priority))
    }

    /// Whether any entry awaits a worker.
    pub fn has_pending(&self) -> bool {
        self.entries.values().any(QueuePriority::is_pending)
    }

    /// Whether `id` is queued at any priority (including `Working`).
    pub fn contains(&self, id: &AssetId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of queued identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries at `priority`.
    pub fn count_at(&self, priority: QueuePriority) -> usize {
        self.entries.values().filter(|p| **p == priority).count()
    }
}

impl fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestQueue")
            .field("len", &self.entries.len())
            .field("load", &self.count_at(QueuePriority::Load))
            .field("post_process", &self.count_at(QueuePriority::PostProcess))
            .field("working", &self.count_at(QueuePriority::Working))
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
