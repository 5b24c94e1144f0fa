//! Per-run pipeline context.
//!
//! A [`Pipeline`] owns everything one generation run shares: the root seed,
//! the active [`SymmetrySettings`], the mask arena, the stage scheduler and
//! its worker pool. Construct one per run and drop it at the end; nothing is
//! global.
//!
//! ```ignore
//! let pipeline = Pipeline::new(PipelineConfig::new(42, SymmetrySettings::uniform(Symmetry::Point2)))?;
//! let land = pipeline.boolean_mask(256, "land")?;
//! land.randomize(0.2)?.inflate(2.0)?.smooth(4)?;
//! let raster = land.final_raster()?;
//! ```

mod scheduler;
mod types;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

pub(crate) use scheduler::SlotInfo;
use scheduler::Scheduler;
pub use types::{MaskId, MaskSpec, PipelineConfig, PipelineStage, PipelineStats};

use crate::error::{MaskError, Result, SymmetryError};
use crate::mask::{Mask, Operation};
#[cfg(feature = "metrics")]
use crate::metrics::PipelineMetrics;
use crate::raster::{Cell, RasterData};
use crate::symmetry::{Symmetry, SymmetryLayout, SymmetrySettings};

// =============================================================================
// Layout cache
// =============================================================================

/// Symmetry layouts built so far in this run.
#[derive(Default)]
pub(crate) struct LayoutCache {
  layouts: Mutex<HashMap<(Symmetry, usize), Arc<SymmetryLayout>>>,
}

impl LayoutCache {
  pub(crate) fn get(&self, symmetry: Symmetry, size: usize) -> std::result::Result<Arc<SymmetryLayout>, SymmetryError> {
    let mut layouts = self.layouts.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(layout) = layouts.get(&(symmetry, size)) {
      return Ok(Arc::clone(layout));
    }
    let layout = Arc::new(SymmetryLayout::new(symmetry, size)?);
    layouts.insert((symmetry, size), Arc::clone(&layout));
    Ok(layout)
  }
}

// =============================================================================
// Pipeline
// =============================================================================

struct Shared {
  config: PipelineConfig,
  /// Seeds masks created without an explicit seed, in creation order.
  root_rng: Mutex<ChaCha8Rng>,
  layouts: LayoutCache,
  scheduler: Arc<Scheduler>,
}

/// Cheaply clonable handle to one run's context.
#[derive(Clone)]
pub struct Pipeline {
  shared: Arc<Shared>,
}

impl std::fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline")
      .field("seed", &self.shared.config.seed)
      .field("symmetry", &self.shared.config.symmetry)
      .finish_non_exhaustive()
  }
}

impl Pipeline {
  pub fn new(config: PipelineConfig) -> Result<Self> {
    let scheduler = Arc::new(Scheduler::new(config.worker_threads)?);
    info!(
      seed = config.seed,
      terrain = %config.symmetry.terrain(),
      team = %config.symmetry.team(),
      spawn = %config.symmetry.spawn(),
      workers = scheduler.worker_threads(),
      "pipeline created"
    );
    Ok(Self {
      shared: Arc::new(Shared {
        root_rng: Mutex::new(ChaCha8Rng::seed_from_u64(config.seed)),
        config,
        layouts: LayoutCache::default(),
        scheduler,
      }),
    })
  }

  /// Pipeline without symmetry, for tests and tools.
  pub fn with_seed(seed: u64) -> Result<Self> {
    Self::new(PipelineConfig::new(seed, SymmetrySettings::default()))
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.shared.config
  }

  pub fn seed(&self) -> u64 {
    self.shared.config.seed
  }

  pub fn symmetry_settings(&self) -> &SymmetrySettings {
    &self.shared.config.symmetry
  }

  pub fn worker_threads(&self) -> usize {
    self.shared.scheduler.worker_threads()
  }

  /// True when both handles refer to the same run.
  pub fn same_run(&self, other: &Pipeline) -> bool {
    Arc::ptr_eq(&self.shared, &other.shared)
  }

  // ---------------------------------------------------------------------------
  // Mask creation
  // ---------------------------------------------------------------------------

  /// Create a zero-filled mask.
  ///
  /// Fails immediately when the mask's symmetry cannot tile `spec.size`.
  pub fn create<T: Cell>(&self, spec: MaskSpec) -> Result<Mask<T>> {
    let symmetry = self.shared.config.symmetry.get(spec.symmetry);
    self.register(spec.name, spec.size, symmetry, spec.seed)
  }

  /// Register a slot with an already resolved symmetry.
  pub(crate) fn register<T: Cell>(
    &self,
    name: String,
    size: usize,
    symmetry: Symmetry,
    seed: Option<u64>,
  ) -> Result<Mask<T>> {
    self.layout(symmetry, size)?;
    let seed = match seed {
      Some(seed) => seed,
      None => self
        .shared
        .root_rng
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .next_u64(),
    };
    let id = self.shared.scheduler.register(SlotInfo {
      name,
      kind: T::KIND,
      seed,
      symmetry,
      size,
    });
    Ok(Mask::from_parts(self.clone(), id))
  }

  pub fn boolean_mask(&self, size: usize, name: impl Into<String>) -> Result<Mask<bool>> {
    self.create(MaskSpec::new(size, name))
  }

  pub fn float_mask(&self, size: usize, name: impl Into<String>) -> Result<Mask<f32>> {
    self.create(MaskSpec::new(size, name))
  }

  pub fn integer_mask(&self, size: usize, name: impl Into<String>) -> Result<Mask<i32>> {
    self.create(MaskSpec::new(size, name))
  }

  /// Cached layout for a symmetry at a size.
  pub fn layout(&self, symmetry: Symmetry, size: usize) -> Result<Arc<SymmetryLayout>> {
    Ok(self.shared.layouts.get(symmetry, size)?)
  }

  // ---------------------------------------------------------------------------
  // Map methods
  // ---------------------------------------------------------------------------

  /// New mask taking `when_set` where `selector` is set and `otherwise`
  /// elsewhere.
  pub fn select<T: Cell>(
    &self,
    selector: &Mask<bool>,
    when_set: &Mask<T>,
    otherwise: &Mask<T>,
    name: impl Into<String>,
  ) -> Result<Mask<T>> {
    let owners = [selector.pipeline(), when_set.pipeline(), otherwise.pipeline()];
    if owners.iter().any(|owner| !owner.same_run(self)) {
      return Err(MaskError::ForeignMask);
    }
    let out = self.create::<T>(MaskSpec::new(when_set.size()?, name))?;
    self.append(
      out.id(),
      Operation::Select,
      &[selector.id(), when_set.id(), otherwise.id()],
    )?;
    Ok(out)
  }

  /// New mask holding the cell-wise maximum of `masks`.
  pub fn maximum<T: Cell>(&self, masks: &[&Mask<T>], name: impl Into<String>) -> Result<Mask<T>> {
    let Some(first) = masks.first() else {
      return Err(MaskError::InvalidParameter {
        operation: "maximum",
        parameter: "masks",
        reason: "needs at least one mask".to_string(),
      });
    };
    if masks.iter().any(|mask| !mask.pipeline().same_run(self)) {
      return Err(MaskError::ForeignMask);
    }
    let out = self.create::<T>(MaskSpec::new(first.size()?, name))?;
    let reads: Vec<MaskId> = masks.iter().map(|mask| mask.id()).collect();
    self.append(out.id(), Operation::Maximum, &reads)?;
    Ok(out)
  }

  /// Union of boolean masks.
  pub fn union(&self, masks: &[&Mask<bool>], name: impl Into<String>) -> Result<Mask<bool>> {
    self.maximum(masks, name)
  }

  // ---------------------------------------------------------------------------
  // Scheduling
  // ---------------------------------------------------------------------------

  /// Append a stage to `target` reading `reads` at their current versions.
  pub fn append(&self, target: MaskId, operation: Operation, reads: &[MaskId]) -> Result<u64> {
    self
      .shared
      .scheduler
      .append(target, operation, reads, &self.shared.layouts)
  }

  /// Block until every stage appended so far to `masks` (and everything
  /// they read) has completed. The first failure found is returned.
  pub fn await_masks(&self, masks: &[MaskId]) -> Result<()> {
    self.shared.scheduler.await_masks(masks)
  }

  /// Await every mask of the run.
  pub fn await_all(&self) -> Result<()> {
    self.shared.scheduler.await_all()
  }

  pub(crate) fn snapshot(&self, id: MaskId) -> Result<Arc<RasterData>> {
    self.shared.scheduler.snapshot(id)
  }

  pub(crate) fn info(&self, id: MaskId) -> Result<SlotInfo> {
    self.shared.scheduler.info(id)
  }

  /// Every stage appended so far, in append order.
  pub fn stage_log(&self) -> Vec<PipelineStage> {
    self.shared.scheduler.stage_log()
  }

  pub fn stats(&self) -> PipelineStats {
    self.shared.scheduler.stats()
  }

  #[cfg(feature = "metrics")]
  pub fn metrics(&self) -> PipelineMetrics {
    self.shared.scheduler.metrics()
  }
}
