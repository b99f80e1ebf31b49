//! The background worker loop.

use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::MutexGuard;
use tracing::{debug, error, trace};

use super::cache::AssetRecord;
use super::loader::{LoadStack, Loaded};
use super::shared::{Shared, State};
use crate::executor::QueuePriority;
use crate::identity::AssetId;

/// How long a worker pauses after a blocked load before trying the queue
/// again.
const BLOCKED_BACKOFF: Duration = Duration::from_millis(5);

/// Serve the request queue until the stop flag is raised.
pub(crate) fn run(shared: &Shared, worker: usize) {
    debug!(worker, "Asset worker started");
    let mut guard = shared.state.lock();

    loop {
        while !shared.stop.load(Ordering::Acquire) && !guard.queue.has_pending() {
            shared.queued.wait(&mut guard);
        }
        if shared.stop.load(Ordering::Acquire) {
            break;
        }

        let Some((id, priority)) = guard.queue.next_pending() else {
            continue;
        };
        trace!(worker, asset = %id, %priority, "Picked up asset");

        match priority {
            QueuePriority::Load => load(shared, &mut guard, &id),
            QueuePriority::PostProcess => post_process(shared, &mut guard, &id),
            QueuePriority::Working | QueuePriority::None => {}
        }
    }

    debug!(worker, "Asset worker stopped");
}

fn load(shared: &Shared, guard: &mut MutexGuard<'_, State>, id: &AssetId) {
    match shared.load_asset(guard, &mut LoadStack::default(), id) {
        Ok(Loaded::Ready(_)) => {
            // A cache hit leaves the queue entry behind
            if guard.queue.priority(id) == QueuePriority::Load {
                guard.queue.remove(id);
            }
        }
        Ok(Loaded::Blocked) => {
            shared.done.wait_for(guard, BLOCKED_BACKOFF);
        }
        Err(e) => {
            error!(asset = %id, error = %e, "Background asset load failed");
        }
    }
}

fn post_process(shared: &Shared, guard: &mut MutexGuard<'_, State>, id: &AssetId) {
    let audio = match guard.cache.peek(id) {
        Some(AssetRecord::Audio(audio)) if !audio.is_decompressed() => audio.clone(),
        _ => {
            guard.queue.remove(id);
            return;
        }
    };

    guard.queue.mark_working(id);
    if let Err(e) = shared.post_process_audio(guard, id, audio) {
        error!(asset = %id, error = %e, "Audio post-processing failed");
    }
}
