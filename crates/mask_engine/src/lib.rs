//! mask_engine - Symmetry-constrained raster masks for procedural map generation
//!
//! Every layer of a generated map (height, passability, resources) is a
//! square [`Mask`] whose values respect the run's [`Symmetry`], so opposing
//! start positions stay fair. Mask operations are scheduled as stages on a
//! per-run [`Pipeline`] and executed on a worker pool; awaiting a mask is the
//! only synchronization point.
//!
//! # Features
//!
//! - **Symmetry model**: mirror axes, four-way symmetries and point rotations
//!   of order 2 to 16, with cached canonical-source layouts
//! - **Mask engine**: generators, set algebra, morphology, resize and queries
//!   over boolean, float and integer rasters
//! - **Deferred pipeline**: per-mask stage order, snapshot reads of other
//!   masks, failures shared with every dependent await
//! - **Pipeline graphs**: serializable operation DAGs resolved through a
//!   closed registry
//!
//! # Example
//!
//! ```ignore
//! use mask_engine::{Pipeline, PipelineConfig, Symmetry, SymmetrySettings};
//!
//! let pipeline = Pipeline::new(PipelineConfig::new(7, SymmetrySettings::uniform(Symmetry::Point2)))?;
//! let land = pipeline.boolean_mask(256, "land")?;
//! land.randomize(0.2)?.inflate(2.0)?.smooth(4)?;
//!
//! let raster = land.final_raster()?;
//! assert_eq!(raster.get(3, 7), raster.get(252, 248));
//! ```

pub mod error;
pub mod raster;
pub mod symmetry;

pub use error::{GraphError, MaskError, StageError, SymmetryError};
pub use raster::{Cell, MaskKind, Numeric, Raster, RasterData};
pub use symmetry::{
  num_sym_points, rotated_radians, symmetry_points, Symmetry, SymmetryLayout, SymmetryPoints,
  SymmetrySettings, SymmetrySource,
};

// Typed mask handles and their operations
pub mod mask;
pub use mask::{
  BooleanMask, FloatMask, IntegerMask, Mask, NeighborPolicy, Operation, ResizeFilter, ResizePlan,
  Snapshot,
};

// Per-run context and stage scheduler
pub mod pipeline;
pub use pipeline::{MaskId, MaskSpec, Pipeline, PipelineConfig, PipelineStage, PipelineStats};

// Serializable operation graphs
pub mod graph;
pub use graph::{GenerationContext, GraphDocument, MaskValue, PipelineGraph, Value, VertexKind};

// Worker pool backing the scheduler
pub mod threading;
pub use threading::{TaskId, WorkerPool};

#[cfg(feature = "metrics")]
pub mod metrics;
#[cfg(feature = "metrics")]
pub use metrics::{PipelineMetrics, TimingWindow};
