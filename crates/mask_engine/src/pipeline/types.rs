//! Pipeline configuration and bookkeeping types.
//!
//! ```text
//!   mask handle call ──► append ──► PipelineStage logged
//!                                     │
//!                                     ▼
//!                    ┌──────────── Pending ────────────┐
//!                    │ predecessor complete AND        │
//!                    │ every read at recorded version  │
//!                    └───────────────┬─────────────────┘
//!                                    ▼
//!                                 Running  (worker pool)
//!                                 │     │
//!                          Ok     ▼     ▼   Err / panic
//!                            Complete   Failed ──► poisons later stages
//!                                                  and every reader
//! ```

use serde::{Deserialize, Serialize};

use crate::symmetry::{SymmetrySettings, SymmetrySource};

/// Opaque handle of a mask slot in one pipeline's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaskId(pub(crate) u32);

impl MaskId {
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

/// Settings of one generation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
  /// Root seed; masks without an explicit seed derive theirs from it.
  pub seed: u64,
  pub symmetry: SymmetrySettings,
  /// Worker threads; 0 lets rayon choose.
  pub worker_threads: usize,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      seed: 0,
      symmetry: SymmetrySettings::default(),
      worker_threads: 0,
    }
  }
}

impl PipelineConfig {
  pub fn new(seed: u64, symmetry: SymmetrySettings) -> Self {
    Self {
      seed,
      symmetry,
      ..Self::default()
    }
  }

  pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
    self.worker_threads = worker_threads;
    self
  }
}

/// Creation parameters of a mask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskSpec {
  pub size: usize,
  pub name: String,
  /// Explicit seed; `None` draws one from the pipeline's root RNG.
  pub seed: Option<u64>,
  pub symmetry: SymmetrySource,
}

impl MaskSpec {
  pub fn new(size: usize, name: impl Into<String>) -> Self {
    Self {
      size,
      name: name.into(),
      seed: None,
      symmetry: SymmetrySource::Terrain,
    }
  }

  pub fn seed(mut self, seed: u64) -> Self {
    self.seed = Some(seed);
    self
  }

  pub fn symmetry(mut self, symmetry: SymmetrySource) -> Self {
    self.symmetry = symmetry;
    self
  }
}

/// Log entry written when a stage is appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PipelineStage {
  pub owner: MaskId,
  pub owner_name: String,
  /// Position in the run-wide append order.
  pub sequence_index: u64,
  pub operation_name: &'static str,
  pub read_dependencies: Vec<MaskId>,
}

/// Stage counters of one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
  pub appended: u64,
  pub completed: u64,
  /// Stages that failed, were poisoned, or were dropped behind a failure.
  pub failed: u64,
}

impl PipelineStats {
  /// Stages neither completed nor failed.
  pub fn outstanding(&self) -> u64 {
    self.appended.saturating_sub(self.completed + self.failed)
  }
}
