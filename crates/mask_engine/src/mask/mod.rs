//! Typed masks and the operations they schedule.
//!
//! A [`Mask`] is a handle into its pipeline's arena. Every mutating call
//! appends one stage and returns the handle so calls chain; queries await the
//! mask first and read the frozen raster.

mod algebra;
mod distance;
mod generate;
mod handle;
mod morphology;
mod ops;
mod query;
mod resize;

pub use handle::{BooleanMask, FloatMask, IntegerMask, Mask, Snapshot, DEFAULT_SMOOTH_DENSITY};
pub(crate) use ops::StageInput;
pub use ops::{NeighborPolicy, Operation, ResizeFilter, TransformFn};
pub use resize::ResizePlan;


#[cfg(test)]
#[path = "handle_test.rs"]
mod handle_test;
