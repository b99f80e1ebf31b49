//! State shared between the `Assets` handle and its workers.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::info;

use super::cache::Cache;
use super::frames_index::FramesIndex;
use crate::config::{IgnorePatterns, Settings};
use crate::error::AssetResult;
use crate::executor::RequestQueue;
use crate::index::{AssetDigest, FileIndex};
use crate::source::{AssetSource, SourceRole};

/// Everything the mutex protects.
#[derive(Debug)]
pub(crate) struct State {
    pub queue: RequestQueue,
    pub cache: Cache,
    pub frames: FramesIndex,
}

pub(crate) struct Shared {
    pub settings: Settings,

    /// Immutable after construction; read without the mutex.
    pub index: FileIndex,
    pub digest: AssetDigest,

    pub state: Mutex<State>,

    /// Signalled when an identity becomes pending.
    pub queued: Condvar,

    /// Signalled whenever an identity leaves the `Working` state.
    pub done: Condvar,

    pub stop: AtomicBool,
}

impl Shared {
    /// Index the sources and compute the digest.
    pub fn new(
        settings: Settings,
        sources: Vec<(Arc<dyn AssetSource>, SourceRole)>,
    ) -> AssetResult<Self> {
        settings.validate()?;
        let start = Instant::now();

        let index = sources
            .into_iter()
            .fold(FileIndex::builder(), |builder, (source, role)| {
                builder.add_source(source, role)
            })
            .path_ignore(IgnorePatterns::new(&settings.path_ignore)?)
            .digest_ignore(IgnorePatterns::new(&settings.digest_ignore)?)
            .build()?;
        let digest = index.digest()?;

        info!(
            sources = index.source_count(),
            files = index.len(),
            digest = %digest,
            workers = settings.worker_pool_size,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Asset pipeline ready"
        );

        Ok(Self {
            state: Mutex::new(State {
                queue: RequestQueue::new(),
                cache: Cache::new(settings.time_to_live()),
                frames: FramesIndex::default(),
            }),
            queued: Condvar::new(),
            done: Condvar::new(),
            stop: AtomicBool::new(false),
            settings,
            index,
            digest,
        })
    }
}
