//! Named background worker threads.
//!
//! The pool only owns the threads. What a worker does, and how it learns
//! that it should stop, is decided by the closure it is spawned with; the
//! asset pipeline drives its workers from the shared request queue.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{AssetError, AssetResult};

/// Prefix of worker thread names (`asset-worker-0`, `asset-worker-1`, ...).
pub const WORKER_THREAD_PREFIX: &str = "asset-worker";

/// A fixed set of worker threads.
#[derive(Debug, Default)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` threads, each running `work(index)` until it returns.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::Spawn`] if a thread cannot be created. Threads
    /// started before the failure are left running; the caller is expected
    /// to signal them to stop and call [`join`](Self::join) on the pool it
    /// gets back from the error path.
    pub fn spawn<F>(size: usize, work: F) -> Result<Self, (Self, AssetError)>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        let mut pool = Self::default();

        for index in 0..size {
            let work = Arc::clone(&work);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", WORKER_THREAD_PREFIX, index))
                .spawn(move || work(index));

            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => return Err((pool, AssetError::Spawn(e))),
            }
        }

        debug!(workers = size, "Started asset workers");
        Ok(pool)
    }

    /// Number of running threads.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every thread to exit.
    pub fn join(&mut self) {
        let count = self.handles.len();
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().map(String::from);
            if handle.join().is_err() {
                warn!(thread = ?name, "Asset worker panicked");
            }
        }
        if count > 0 {
            debug!(workers = count, "Stopped asset workers");
        }
    }
}

/// Spawn a pool; if any thread fails to start, run `on_failure` (which must
/// make the started workers return) and join them before reporting the error.
pub(crate) fn spawn_or_join<F>(
    size: usize,
    work: F,
    on_failure: impl FnOnce(),
) -> AssetResult<WorkerPool>
where
    F: Fn(usize) + Send + Sync + 'static,
{
    match WorkerPool::spawn(size, work) {
        Ok(pool) => Ok(pool),
        Err((mut partial, error)) => {
            on_failure();
            partial.join();
            Err(error)
        }
    }
}
