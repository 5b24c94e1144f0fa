//! Bounded worker pool for pipeline stages.
//!
//! Each [`Pipeline`](crate::Pipeline) owns one pool; stages are submitted
//! fire-and-forget with `ThreadPool::spawn` and report back through the
//! scheduler. Task ids are counted per pool.
//!
//! ```ignore
//! let pool = WorkerPool::new(4)?;
//! let task = pool.spawn(move || run_stage(job));
//! assert!(pool.num_threads() >= 1);
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::MaskError;

/// Identifier of a task submitted to one [`WorkerPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
  pub fn raw(self) -> u64 {
    self.0
  }
}

/// Rayon thread pool with a pending-task counter.
pub struct WorkerPool {
  pool: Arc<rayon::ThreadPool>,
  /// Tasks queued or running.
  pending: Arc<AtomicUsize>,
  next_task: AtomicU64,
}

impl WorkerPool {
  /// Build a pool with `num_threads` workers; 0 lets rayon pick from the
  /// available parallelism.
  pub fn new(num_threads: usize) -> Result<Self, MaskError> {
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("mask-stage-{i}"));
    if num_threads > 0 {
      builder = builder.num_threads(num_threads);
    }
    let pool = builder
      .build()
      .map_err(|e| MaskError::WorkerPool(e.to_string()))?;

    Ok(Self {
      pool: Arc::new(pool),
      pending: Arc::new(AtomicUsize::new(0)),
      next_task: AtomicU64::new(0),
    })
  }

  /// Queue work on the pool (non-blocking).
  pub fn spawn<F>(&self, work: F) -> TaskId
  where
    F: FnOnce() + Send + 'static,
  {
    let task_id = TaskId(self.next_task.fetch_add(1, Ordering::Relaxed));
    self.pending.fetch_add(1, Ordering::AcqRel);

    let pending = Arc::clone(&self.pending);
    self.pool.spawn(move || {
      work();
      pending.fetch_sub(1, Ordering::AcqRel);
    });

    task_id
  }

  /// Number of worker threads in this pool.
  pub fn num_threads(&self) -> usize {
    self.pool.current_num_threads()
  }

  /// Number of tasks currently queued or running.
  pub fn pending_count(&self) -> usize {
    self.pending.load(Ordering::Acquire)
  }

  /// Total tasks ever submitted.
  pub fn submitted(&self) -> u64 {
    self.next_task.load(Ordering::Relaxed)
  }
}

// =============================================================================
// Tests
// =============================================================================
