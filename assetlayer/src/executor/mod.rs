//! Scheduling primitives for background asset work.
//!
//! # Overview
//!
//! ```text
//! ┌──────────────┐  enqueue / raise   ┌──────────────────────────────┐
//! │ try_image()  │ ─────────────────► │         RequestQueue         │
//! │ queue_*()    │                    │  id → Load | PostProcess |   │
//! └──────────────┘                    │       Working                │
//!                                     └──────────────┬───────────────┘
//!                                                    │ next_pending()
//!                                                    ▼
//!                                     ┌──────────────────────────────┐
//!                                     │  WorkerPool (asset-worker-N) │
//!                                     │  load / post-process outside │
//!                                     │  the lock, signal "done"     │
//!                                     └──────────────────────────────┘
//! ```
//!
//! The queue is a plain data structure; locking and condition variables
//! live with the asset pipeline that owns it.

mod pool;
mod queue;

pub use pool::{WorkerPool, WORKER_THREAD_PREFIX};
pub(crate) use pool::spawn_or_join;
pub use queue::{QueuePriority, RequestQueue};
