//! Stage scheduler.
//!
//! All per-run mutable state sits behind one mutex; a condvar wakes awaiting
//! callers whenever a stage finishes. Stages of one mask run strictly in
//! append order, and a stage only starts once every read it recorded at
//! append time has reached that version (snapshot semantics).

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};
use web_time::Instant;

use super::types::{MaskId, PipelineStage, PipelineStats};
use super::LayoutCache;
use crate::error::{MaskError, Result, StageError};
#[cfg(feature = "metrics")]
use crate::metrics::PipelineMetrics;
use crate::mask::{Operation, StageInput};
use crate::raster::{MaskKind, RasterData};
use crate::symmetry::{Symmetry, SymmetryLayout};
use crate::threading::WorkerPool;

/// Static description of a mask slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SlotInfo {
  pub name: String,
  pub kind: MaskKind,
  pub seed: u64,
  pub symmetry: Symmetry,
  /// Size after every appended stage has run.
  pub size: usize,
}

/// Where a queued stage's read dependency stands.
enum ReadState {
  /// Waiting for `mask` to complete its stage `version`.
  Waiting { mask: MaskId, version: u64 },
  Ready(Arc<RasterData>),
  Failed(Arc<StageError>),
}

struct QueuedStage {
  sequence: u64,
  version: u64,
  operation: Operation,
  layout: Arc<SymmetryLayout>,
  reads: Vec<ReadState>,
}

impl QueuedStage {
  fn failed_read(&self) -> Option<Arc<StageError>> {
    self.reads.iter().find_map(|read| match read {
      ReadState::Failed(error) => Some(Arc::clone(error)),
      _ => None,
    })
  }

  fn ready(&self) -> bool {
    self
      .reads
      .iter()
      .all(|read| matches!(read, ReadState::Ready(_)))
  }
}

struct MaskSlot {
  info: SlotInfo,
  /// Latest completed raster; taken while a stage runs.
  current: Option<Arc<RasterData>>,
  /// Seeded once at creation; taken while a stage runs.
  rng: Option<ChaCha8Rng>,
  queue: VecDeque<QueuedStage>,
  running: bool,
  appended: u64,
  completed: u64,
  failure: Option<Arc<StageError>>,
}

impl MaskSlot {
  fn idle(&self) -> bool {
    !self.running && self.completed == self.appended
  }

  /// Read of this mask at its latest appended version.
  fn read_state(&self, id: MaskId) -> ReadState {
    if let Some(failure) = &self.failure {
      return ReadState::Failed(Arc::clone(failure));
    }
    match &self.current {
      Some(raster) if self.idle() => ReadState::Ready(Arc::clone(raster)),
      _ => ReadState::Waiting {
        mask: id,
        version: self.appended,
      },
    }
  }
}

struct SchedulerState {
  slots: Vec<MaskSlot>,
  log: Vec<PipelineStage>,
  next_sequence: u64,
  stats: PipelineStats,
}

/// Work handed to the pool.
struct Job {
  mask: MaskId,
  name: String,
  sequence: u64,
  version: u64,
  operation: Operation,
  layout: Arc<SymmetryLayout>,
  reads: Vec<Arc<RasterData>>,
  raster: Arc<RasterData>,
  rng: ChaCha8Rng,
}

pub(crate) struct Scheduler {
  state: Mutex<SchedulerState>,
  idle: Condvar,
  pool: WorkerPool,
  #[cfg(feature = "metrics")]
  metrics: Mutex<PipelineMetrics>,
}

impl Scheduler {
  pub(crate) fn new(worker_threads: usize) -> Result<Self> {
    Ok(Self {
      state: Mutex::new(SchedulerState {
        slots: Vec::new(),
        log: Vec::new(),
        next_sequence: 0,
        stats: PipelineStats::default(),
      }),
      idle: Condvar::new(),
      pool: WorkerPool::new(worker_threads)?,
      #[cfg(feature = "metrics")]
      metrics: Mutex::new(PipelineMetrics::new()),
    })
  }

  fn lock(&self) -> MutexGuard<'_, SchedulerState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub(crate) fn worker_threads(&self) -> usize {
    self.pool.num_threads()
  }

  /// Add a slot holding a zero-filled raster.
  pub(crate) fn register(&self, info: SlotInfo) -> MaskId {
    let raster = RasterData::new(info.kind, info.size);
    let rng = ChaCha8Rng::seed_from_u64(info.seed);

    let mut state = self.lock();
    let id = MaskId(state.slots.len() as u32);
    debug!(
      mask = %info.name,
      kind = %info.kind,
      size = info.size,
      seed = info.seed,
      "mask created"
    );
    state.slots.push(MaskSlot {
      info,
      current: Some(Arc::new(raster)),
      rng: Some(rng),
      queue: VecDeque::new(),
      running: false,
      appended: 0,
      completed: 0,
      failure: None,
    });
    id
  }

  pub(crate) fn info(&self, id: MaskId) -> Result<SlotInfo> {
    let state = self.lock();
    state
      .slots
      .get(id.index())
      .map(|slot| slot.info.clone())
      .ok_or(MaskError::ForeignMask)
  }

  /// Record a stage and dispatch whatever became runnable.
  ///
  /// Returns the stage's run-wide sequence index.
  pub(crate) fn append(
    self: &Arc<Self>,
    target: MaskId,
    operation: Operation,
    reads: &[MaskId],
    layouts: &LayoutCache,
  ) -> Result<u64> {
    let mut guard = self.lock();
    let state = &mut *guard;

    if let Some(expected) = operation.arity() {
      if reads.len() != expected {
        return Err(MaskError::InvalidParameter {
          operation: operation.name(),
          parameter: "reads",
          reason: format!("expected {expected} read dependencies, got {}", reads.len()),
        });
      }
    }

    let slot_count = state.slots.len();
    if target.index() >= slot_count || reads.iter().any(|read| read.index() >= slot_count) {
      return Err(MaskError::ForeignMask);
    }

    let (name, symmetry, from) = {
      let info = &state.slots[target.index()].info;
      (info.name.clone(), info.symmetry, info.size)
    };
    for read in reads {
      let info = &state.slots[read.index()].info;
      if info.size != from {
        return Err(MaskError::SizeMismatch {
          name: info.name.clone(),
          expected: from,
          actual: info.size,
        });
      }
    }
    let to = operation.output_size(from);
    let layout = layouts.get(symmetry, to)?;

    let read_states: Vec<ReadState> = reads
      .iter()
      .map(|&read| state.slots[read.index()].read_state(read))
      .collect();

    let sequence = state.next_sequence;
    state.next_sequence += 1;
    state.log.push(PipelineStage {
      owner: target,
      owner_name: name.clone(),
      sequence_index: sequence,
      operation_name: operation.name(),
      read_dependencies: reads.to_vec(),
    });
    state.stats.appended += 1;

    let slot = &mut state.slots[target.index()];
    slot.appended += 1;
    slot.info.size = to;
    let version = slot.appended;

    if slot.failure.is_some() {
      warn!(
        mask = %name,
        sequence,
        operation = operation.name(),
        "stage dropped behind failed stage"
      );
      state.stats.failed += 1;
      return Ok(sequence);
    }

    debug!(
      mask = %name,
      sequence,
      operation = operation.name(),
      reads = reads.len(),
      "stage appended"
    );
    slot.queue.push_back(QueuedStage {
      sequence,
      version,
      operation,
      layout,
      reads: read_states,
    });

    self.dispatch_ready(state);
    Ok(sequence)
  }

  /// Start or poison queue heads until nothing changes.
  fn dispatch_ready(self: &Arc<Self>, state: &mut SchedulerState) {
    loop {
      let mut progressed = false;

      for index in 0..state.slots.len() {
        let id = MaskId(index as u32);
        let slot = &mut state.slots[index];
        if slot.running || slot.failure.is_some() {
          continue;
        }
        let Some(head) = slot.queue.front() else {
          continue;
        };

        if let Some(cause) = head.failed_read() {
          if let Some(stage) = slot.queue.pop_front() {
            let error = StageError::Poisoned {
              mask: slot.info.name.clone(),
              sequence: stage.sequence,
              operation: stage.operation.name(),
              source: cause,
            };
            self.fail(state, id, Arc::new(error));
            progressed = true;
          }
          continue;
        }
        if !head.ready() {
          continue;
        }

        let Some(stage) = slot.queue.pop_front() else {
          continue;
        };
        let (Some(raster), Some(rng)) = (slot.current.take(), slot.rng.take()) else {
          let error = StageError::Failed {
            mask: slot.info.name.clone(),
            sequence: stage.sequence,
            operation: stage.operation.name(),
            message: "mask raster unavailable".to_string(),
          };
          self.fail(state, id, Arc::new(error));
          progressed = true;
          continue;
        };

        slot.running = true;
        let job = Job {
          mask: id,
          name: slot.info.name.clone(),
          sequence: stage.sequence,
          version: stage.version,
          operation: stage.operation,
          layout: stage.layout,
          reads: stage
            .reads
            .into_iter()
            .filter_map(|read| match read {
              ReadState::Ready(raster) => Some(raster),
              _ => None,
            })
            .collect(),
          raster,
          rng,
        };
        debug!(
          mask = %job.name,
          sequence = job.sequence,
          operation = job.operation.name(),
          "stage dispatched"
        );

        let scheduler = Arc::clone(self);
        self.pool.spawn(move || scheduler.run(job));
        progressed = true;
      }

      if !progressed {
        break;
      }
    }
  }

  /// Execute one stage on a worker thread.
  fn run(self: Arc<Self>, job: Job) {
    let Job {
      mask,
      name,
      sequence,
      version,
      operation,
      layout,
      reads,
      mut raster,
      mut rng,
    } = job;

    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
      operation.apply(StageInput {
        raster: Arc::make_mut(&mut raster),
        rng: &mut rng,
        reads: &reads,
        layout: &layout,
      })
    }));
    let elapsed_us = started.elapsed().as_micros() as u64;
    drop(reads);

    #[cfg(feature = "metrics")]
    self
      .metrics
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .record_stage(operation.name(), elapsed_us);

    let result = match outcome {
      Ok(Ok(())) => Ok(raster),
      Ok(Err(error)) => Err(StageError::Failed {
        mask: name,
        sequence,
        operation: operation.name(),
        message: error.to_string(),
      }),
      Err(payload) => Err(StageError::Panicked {
        mask: name,
        sequence,
        operation: operation.name(),
        message: panic_message(payload.as_ref()),
      }),
    };
    self.complete(mask, sequence, version, rng, result, elapsed_us);
  }

  fn complete(
    self: &Arc<Self>,
    mask: MaskId,
    sequence: u64,
    version: u64,
    rng: ChaCha8Rng,
    result: std::result::Result<Arc<RasterData>, StageError>,
    elapsed_us: u64,
  ) {
    let mut guard = self.lock();
    let state = &mut *guard;

    match result {
      Ok(raster) => {
        let slot = &mut state.slots[mask.index()];
        slot.running = false;
        slot.completed = version;
        slot.current = Some(Arc::clone(&raster));
        slot.rng = Some(rng);
        debug!(mask = %slot.info.name, sequence, elapsed_us, "stage complete");
        state.stats.completed += 1;

        for other in &mut state.slots {
          for stage in &mut other.queue {
            for read in &mut stage.reads {
              if matches!(read, ReadState::Waiting { mask: m, version: v } if *m == mask && *v == version) {
                *read = ReadState::Ready(Arc::clone(&raster));
              }
            }
          }
        }
      }
      Err(error) => self.fail(state, mask, Arc::new(error)),
    }

    self.dispatch_ready(state);
    self.idle.notify_all();
  }

  /// Record a failure once and poison everything downstream of it.
  fn fail(&self, state: &mut SchedulerState, mask: MaskId, error: Arc<StageError>) {
    let slot = &mut state.slots[mask.index()];
    let dropped = slot.queue.len() as u64;
    warn!(mask = %slot.info.name, error = %error, dropped, "stage failed");

    slot.running = false;
    slot.queue.clear();
    slot.failure = Some(Arc::clone(&error));
    state.stats.failed += 1 + dropped;

    for other in &mut state.slots {
      for stage in &mut other.queue {
        for read in &mut stage.reads {
          if matches!(read, ReadState::Waiting { mask: m, .. } if *m == mask) {
            *read = ReadState::Failed(Arc::clone(&error));
          }
        }
      }
    }
    self.idle.notify_all();
  }

  /// Block until every listed mask has completed all appended stages.
  fn wait_idle(&self, ids: &[MaskId]) -> Result<MutexGuard<'_, SchedulerState>> {
    let mut state = self.lock();
    loop {
      let mut pending = false;
      for id in ids {
        let slot = state.slots.get(id.index()).ok_or(MaskError::ForeignMask)?;
        if let Some(failure) = &slot.failure {
          return Err(MaskError::Stage(Arc::clone(failure)));
        }
        pending |= !slot.idle();
      }
      if !pending {
        return Ok(state);
      }
      state = self.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
    }
  }

  pub(crate) fn await_masks(&self, ids: &[MaskId]) -> Result<()> {
    self.wait_idle(ids).map(drop)
  }

  pub(crate) fn await_all(&self) -> Result<()> {
    let ids: Vec<MaskId> = {
      let state = self.lock();
      (0..state.slots.len() as u32).map(MaskId).collect()
    };
    self.await_masks(&ids)
  }

  /// Await `id` and return its final raster.
  pub(crate) fn snapshot(&self, id: MaskId) -> Result<Arc<RasterData>> {
    let state = self.wait_idle(&[id])?;
    let slot = &state.slots[id.index()];
    slot
      .current
      .clone()
      .ok_or_else(|| MaskError::Unavailable(slot.info.name.clone()))
  }

  pub(crate) fn stage_log(&self) -> Vec<PipelineStage> {
    self.lock().log.clone()
  }

  pub(crate) fn stats(&self) -> PipelineStats {
    self.lock().stats
  }

  #[cfg(feature = "metrics")]
  pub(crate) fn metrics(&self) -> PipelineMetrics {
    self
      .metrics
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
