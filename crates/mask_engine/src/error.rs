//! Error types for the mask engine.
//!
//! Configuration problems (bad sizes, incompatible symmetry pairings, type
//! mismatches) surface as [`MaskError`] or [`GraphError`] at the call that
//! introduced them. Execution problems are captured at the stage boundary as
//! [`StageError`], shared through an `Arc`, and handed to every await that
//! depends on the failed stage.

use std::sync::Arc;

use thiserror::Error;

use crate::raster::MaskKind;
use crate::symmetry::Symmetry;

/// Invalid symmetry configuration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SymmetryError {
  #[error("grid size must be positive")]
  ZeroSize,

  #[error("grid size {size} exceeds the largest supported size {max}")]
  GridTooLarge { size: usize, max: usize },

  #[error("{symmetry:?} needs a grid at least {min} cells across, got {size}")]
  GridTooSmall {
    symmetry: Symmetry,
    size: usize,
    min: usize,
  },

  #[error(
    "spawn symmetry {spawn:?} ({spawn_points} points) does not evenly divide terrain symmetry \
     {terrain:?} ({terrain_points} points)"
  )]
  IncompatibleSpawn {
    terrain: Symmetry,
    terrain_points: usize,
    spawn: Symmetry,
    spawn_points: usize,
  },

  #[error("unknown symmetry `{0}`")]
  Unknown(String),
}

/// Failure of a scheduled stage, or of a stage that depended on one.
#[derive(Clone, Debug, Error)]
pub enum StageError {
  #[error("stage #{sequence} `{operation}` on mask `{mask}` failed: {message}")]
  Failed {
    mask: String,
    sequence: u64,
    operation: &'static str,
    message: String,
  },

  #[error("stage #{sequence} `{operation}` on mask `{mask}` panicked: {message}")]
  Panicked {
    mask: String,
    sequence: u64,
    operation: &'static str,
    message: String,
  },

  #[error("stage #{sequence} `{operation}` on mask `{mask}` poisoned by upstream failure")]
  Poisoned {
    mask: String,
    sequence: u64,
    operation: &'static str,
    #[source]
    source: Arc<StageError>,
  },
}

impl StageError {
  /// The failure that started the chain, following poisoned links upstream.
  pub fn root_cause(&self) -> &StageError {
    match self {
      StageError::Poisoned { source, .. } => source.root_cause(),
      other => other,
    }
  }
}

/// Errors raised by mask construction, scheduling and queries.
#[derive(Clone, Debug, Error)]
pub enum MaskError {
  #[error(transparent)]
  Symmetry(#[from] SymmetryError),

  #[error("mask `{name}` is {actual}x{actual}, expected {expected}x{expected}")]
  SizeMismatch {
    name: String,
    expected: usize,
    actual: usize,
  },

  #[error("mask `{name}` holds {actual:?} cells, operation needs {expected:?}")]
  KindMismatch {
    name: String,
    expected: MaskKind,
    actual: MaskKind,
  },

  #[error("cannot resize mask `{name}` from {from} to {to}: {reason}")]
  IncompatibleResize {
    name: String,
    from: usize,
    to: usize,
    reason: &'static str,
  },

  #[error("invalid `{parameter}` for {operation}: {reason}")]
  InvalidParameter {
    operation: &'static str,
    parameter: &'static str,
    reason: String,
  },

  #[error("({x}, {y}) is outside mask `{name}` of size {size}")]
  OutOfBounds {
    name: String,
    x: i32,
    y: i32,
    size: usize,
  },

  #[error("masks belong to different pipelines")]
  ForeignMask,

  #[error("mask `{0}` has no completed raster")]
  Unavailable(String),

  #[error("failed to build worker pool: {0}")]
  WorkerPool(String),

  #[error(transparent)]
  Stage(#[from] Arc<StageError>),
}

/// Errors raised while composing, importing or evaluating a pipeline graph.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("could not resolve operation {operation} on class {class}")]
  UnresolvedOperation { operation: String, class: String },

  #[error("unknown mask class `{0}`")]
  UnknownMaskClass(String),

  #[error("unknown parameter type `{0}`")]
  UnknownParameterType(String),

  #[error("vertex {vertex} has no parameter `{parameter}`")]
  UnknownParameter { vertex: u32, parameter: String },

  #[error("vertex {vertex} has no result `{result}`")]
  UnknownResult { vertex: u32, result: String },

  #[error("no vertex with id {0}")]
  UnknownVertex(u32),

  #[error("no endpoint named `{0}`")]
  UnknownEndpoint(String),

  #[error("endpoint `{0}` is already defined")]
  DuplicateEndpoint(String),

  #[error("parameter `{parameter}` of vertex {vertex} expects {expected}, got {actual}")]
  TypeMismatch {
    vertex: u32,
    parameter: String,
    expected: String,
    actual: String,
  },

  #[error("vertex {vertex} is not fully defined: unbound parameters {missing:?}")]
  NotFullyDefined { vertex: u32, missing: Vec<String> },

  #[error("vertex {vertex} is fully defined but has not been computed")]
  NotComputed { vertex: u32 },

  #[error("parameter `{parameter}` of vertex {vertex} is already bound")]
  AlreadyBound { vertex: u32, parameter: String },

  #[error("graph contains a cycle through vertex {0}")]
  Cycle(u32),

  #[error("vertex {vertex} records {actual} literal expressions for {expected} parameters")]
  ArityMismatch {
    vertex: u32,
    expected: usize,
    actual: usize,
  },

  #[error("cannot evaluate `{expression}`: {reason}")]
  Expression { expression: String, reason: String },

  #[error("missing value for input endpoint `{0}`")]
  MissingInput(String),

  #[error(transparent)]
  Mask(#[from] MaskError),

  #[error(transparent)]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = MaskError> = std::result::Result<T, E>;
