//! Typed mask handles.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use glam::IVec2;
use rand::Rng;

use super::ops::{NeighborPolicy, Operation, TransformFn};
use super::query;
use super::resize::ResizePlan;
use crate::error::{MaskError, Result};
use crate::pipeline::{MaskId, Pipeline};
use crate::raster::{Cell, Numeric, Raster, RasterData};
use crate::symmetry::Symmetry;

pub type BooleanMask = Mask<bool>;
pub type FloatMask = Mask<f32>;
pub type IntegerMask = Mask<i32>;

/// Density a plain boolean `smooth` keeps a cell set at.
pub const DEFAULT_SMOOTH_DENSITY: f64 = 0.5;

// =============================================================================
// Mask
// =============================================================================

/// Handle to one mask slot of a pipeline.
///
/// Cloning the handle does not copy the mask; use [`Mask::copy`] for that.
pub struct Mask<T: Cell> {
  pipeline: Pipeline,
  id: MaskId,
  kind: PhantomData<fn() -> T>,
}

impl<T: Cell> Clone for Mask<T> {
  fn clone(&self) -> Self {
    Self {
      pipeline: self.pipeline.clone(),
      id: self.id,
      kind: PhantomData,
    }
  }
}

impl<T: Cell> fmt::Debug for Mask<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Mask")
      .field("kind", &T::KIND)
      .field("id", &self.id)
      .finish()
  }
}

impl<T: Cell> Mask<T> {
  pub(crate) fn from_parts(pipeline: Pipeline, id: MaskId) -> Self {
    Self {
      pipeline,
      id,
      kind: PhantomData,
    }
  }

  #[inline]
  pub fn id(&self) -> MaskId {
    self.id
  }

  #[inline]
  pub fn pipeline(&self) -> &Pipeline {
    &self.pipeline
  }

  pub fn name(&self) -> Result<String> {
    Ok(self.pipeline.info(self.id)?.name)
  }

  /// Size after every stage appended so far.
  pub fn size(&self) -> Result<usize> {
    Ok(self.pipeline.info(self.id)?.size)
  }

  pub fn seed(&self) -> Result<u64> {
    Ok(self.pipeline.info(self.id)?.seed)
  }

  pub fn symmetry(&self) -> Result<Symmetry> {
    Ok(self.pipeline.info(self.id)?.symmetry)
  }

  fn push(&self, operation: Operation) -> Result<&Self> {
    self.pipeline.append(self.id, operation, &[])?;
    Ok(self)
  }

  fn push_reading<U: Cell>(&self, operation: Operation, other: &Mask<U>) -> Result<&Self> {
    if !other.pipeline.same_run(&self.pipeline) {
      return Err(MaskError::ForeignMask);
    }
    self.pipeline.append(self.id, operation, &[other.id])?;
    Ok(self)
  }

  /// New empty mask with this mask's size and symmetry.
  fn sibling<U: Cell>(&self, name: String) -> Result<Mask<U>> {
    let info = self.pipeline.info(self.id)?;
    self.pipeline.register(name, info.size, info.symmetry, None)
  }

  // ---------------------------------------------------------------------------
  // Generators
  // ---------------------------------------------------------------------------

  pub fn fill(&self, value: T) -> Result<&Self> {
    self.push(Operation::Fill {
      value: value.to_f64(),
    })
  }

  /// Overwrite with the values of `other`.
  pub fn init_from(&self, other: &Mask<T>) -> Result<&Self> {
    self.push_reading(Operation::CopyFrom, other)
  }

  // ---------------------------------------------------------------------------
  // Set algebra
  // ---------------------------------------------------------------------------

  pub fn combine(&self, other: &Mask<T>) -> Result<&Self> {
    self.push_reading(Operation::Combine, other)
  }

  pub fn intersect(&self, other: &Mask<T>) -> Result<&Self> {
    self.push_reading(Operation::Intersect, other)
  }

  pub fn subtract(&self, other: &Mask<T>) -> Result<&Self> {
    self.push_reading(Operation::Subtract, other)
  }

  pub fn invert(&self) -> Result<&Self> {
    self.push(Operation::Invert)
  }

  // ---------------------------------------------------------------------------
  // Morphology
  // ---------------------------------------------------------------------------

  pub fn inflate(&self, radius: f64) -> Result<&Self> {
    self.inflate_with(radius, NeighborPolicy::default())
  }

  pub fn inflate_with(&self, radius: f64, policy: NeighborPolicy) -> Result<&Self> {
    check_non_negative("inflate", "radius", radius)?;
    self.push(Operation::Inflate { radius, policy })
  }

  pub fn deflate(&self, radius: f64) -> Result<&Self> {
    self.deflate_with(radius, NeighborPolicy::default())
  }

  pub fn deflate_with(&self, radius: f64, policy: NeighborPolicy) -> Result<&Self> {
    check_non_negative("deflate", "radius", radius)?;
    self.push(Operation::Deflate { radius, policy })
  }

  /// Box blur; booleans keep cells whose neighborhood is at least half set.
  pub fn smooth(&self, radius: usize) -> Result<&Self> {
    self.smooth_with(radius, DEFAULT_SMOOTH_DENSITY, NeighborPolicy::default())
  }

  pub fn smooth_with(&self, radius: usize, density: f64, policy: NeighborPolicy) -> Result<&Self> {
    check_unit("smooth", "density", density)?;
    self.push(Operation::Smooth {
      radius,
      density,
      policy,
    })
  }

  /// Set a border band `width` cells wide.
  pub fn fill_edge(&self, width: usize, value: T) -> Result<&Self> {
    self.push(Operation::FillEdge {
      width,
      value: value.to_f64(),
    })
  }

  /// Set a centered disk of diameter `extent`.
  pub fn fill_center(&self, extent: f64, value: T) -> Result<&Self> {
    check_non_negative("fill_center", "extent", extent)?;
    self.push(Operation::FillCenter {
      extent,
      value: value.to_f64(),
    })
  }

  // ---------------------------------------------------------------------------
  // Resize
  // ---------------------------------------------------------------------------

  fn resize(&self, plan: impl FnOnce(&str, Symmetry, usize) -> Result<ResizePlan>) -> Result<&Self> {
    let info = self.pipeline.info(self.id)?;
    let plan = plan(&info.name, info.symmetry, info.size)?;
    self.push(Operation::Resize {
      size: plan.size,
      filter: plan.filter,
    })
  }

  pub fn set_size(&self, size: usize) -> Result<&Self> {
    self.resize(|name, symmetry, from| ResizePlan::set_size(name, symmetry, from, size))
  }

  pub fn enlarge(&self, factor: usize) -> Result<&Self> {
    self.resize(|name, symmetry, from| ResizePlan::enlarge(name, symmetry, from, factor))
  }

  pub fn shrink(&self, factor: usize) -> Result<&Self> {
    self.resize(|name, symmetry, from| ResizePlan::shrink(name, symmetry, from, factor))
  }

  pub fn resample(&self, size: usize) -> Result<&Self> {
    self.resize(|name, symmetry, from| ResizePlan::resample(name, symmetry, from, size))
  }

  // ---------------------------------------------------------------------------
  // Custom stages
  // ---------------------------------------------------------------------------

  /// Append a caller-defined stage.
  ///
  /// `f` sees the whole raster; only its canonical cells survive, the rest
  /// are overwritten from them afterwards.
  pub fn transform<F>(&self, name: &'static str, f: F) -> Result<&Self>
  where
    F: Fn(&mut Raster<T>) -> std::result::Result<(), String> + Send + Sync + 'static,
  {
    let apply: TransformFn = Arc::new(move |data: &mut RasterData| match T::view_mut(data) {
      Some(raster) => f(raster),
      None => Err(format!("expected a {} raster, got {}", T::KIND, data.kind())),
    });
    self.push(Operation::Transform { name, apply })
  }

  // ---------------------------------------------------------------------------
  // Derived masks
  // ---------------------------------------------------------------------------

  /// New mask initialized from this one at its current version.
  pub fn copy(&self) -> Result<Mask<T>> {
    let name = format!("{}_copy", self.name()?);
    self.copy_named(name)
  }

  pub fn copy_named(&self, name: impl Into<String>) -> Result<Mask<T>> {
    let copy = self.sibling::<T>(name.into())?;
    copy.init_from(self)?;
    Ok(copy)
  }

  /// Euclidean distance to the nearest set cell, as a new float mask.
  pub fn distance_field(&self) -> Result<FloatMask> {
    let field = self.sibling::<f32>(format!("{}_distance", self.name()?))?;
    field.push_reading(Operation::DistanceField, self)?;
    Ok(field)
  }

  // ---------------------------------------------------------------------------
  // Await and queries
  // ---------------------------------------------------------------------------

  /// Block until every stage appended so far has completed.
  pub fn wait(&self) -> Result<&Self> {
    self.pipeline.await_masks(&[self.id])?;
    Ok(self)
  }

  /// Await the mask and return its frozen raster.
  pub fn final_raster(&self) -> Result<Snapshot<T>> {
    let data = self.pipeline.snapshot(self.id)?;
    let actual = data.kind();
    match Snapshot::new(data) {
      Some(snapshot) => Ok(snapshot),
      None => Err(MaskError::KindMismatch {
        name: self.name()?,
        expected: T::KIND,
        actual,
      }),
    }
  }

  pub fn value_at(&self, x: usize, y: usize) -> Result<T> {
    let raster = self.final_raster()?;
    let size = raster.size();
    if x >= size || y >= size {
      return Err(MaskError::OutOfBounds {
        name: self.name()?,
        x: x as i32,
        y: y as i32,
        size,
      });
    }
    Ok(raster.get(x, y))
  }

  pub fn sum(&self) -> Result<f64> {
    Ok(query::sum(self.final_raster()?.raster()))
  }

  pub fn min(&self) -> Result<f64> {
    Ok(query::min(self.final_raster()?.raster()))
  }

  pub fn max(&self) -> Result<f64> {
    Ok(query::max(self.final_raster()?.raster()))
  }

  pub fn average(&self) -> Result<f64> {
    Ok(query::average(self.final_raster()?.raster()))
  }

  /// Number of set cells (true, or positive).
  pub fn count(&self) -> Result<usize> {
    Ok(query::count(self.final_raster()?.raster()))
  }

  /// A uniformly chosen set cell.
  pub fn random_position(&self, rng: &mut impl Rng) -> Result<Option<IVec2>> {
    Ok(query::random_position(self.final_raster()?.raster(), rng))
  }

  /// Symmetric, greedily spaced set cells at least `spacing` apart.
  pub fn spaced_coordinates(&self, spacing: f64) -> Result<Vec<IVec2>> {
    let raster = self.final_raster()?;
    let layout = self.pipeline.layout(self.symmetry()?, raster.size())?;
    Ok(query::spaced_coordinates(&raster, &layout, spacing))
  }
}

// =============================================================================
// BooleanMask
// =============================================================================

impl Mask<bool> {
  /// Set each canonical cell with probability `density`.
  pub fn randomize(&self, density: f64) -> Result<&Self> {
    check_unit("randomize", "density", density)?;
    self.push(Operation::Randomize { density })
  }

  /// Keep only set cells with an unset 4-neighbor.
  pub fn outline(&self) -> Result<&Self> {
    self.outline_with(NeighborPolicy::default())
  }

  pub fn outline_with(&self, policy: NeighborPolicy) -> Result<&Self> {
    self.push(Operation::Outline { policy })
  }

  pub fn smooth_density(&self, radius: usize, density: f64) -> Result<&Self> {
    self.smooth_with(radius, density, NeighborPolicy::default())
  }

  /// Randomized boundary erosion.
  pub fn acid(&self, strength: f64, radius: f64) -> Result<&Self> {
    self.acid_with(strength, radius, NeighborPolicy::default())
  }

  pub fn acid_with(&self, strength: f64, radius: f64, policy: NeighborPolicy) -> Result<&Self> {
    check_unit("acid", "strength", strength)?;
    check_non_negative("acid", "radius", radius)?;
    self.push(Operation::Acid {
      strength,
      radius,
      policy,
    })
  }

  /// Set where `other` is at least `threshold`.
  pub fn init_from_float<U: Numeric>(&self, other: &Mask<U>, threshold: f64) -> Result<&Self> {
    self.push_reading(Operation::InitFromThreshold { threshold }, other)
  }
}

// =============================================================================
// Numeric masks
// =============================================================================

impl<T: Numeric> Mask<T> {
  /// Uniform values in `[min, max)` on every canonical cell.
  pub fn randomize_range(&self, min: T, max: T) -> Result<&Self> {
    let (min, max) = (min.to_f64(), max.to_f64());
    if min > max {
      return Err(MaskError::InvalidParameter {
        operation: "randomize_range",
        parameter: "min",
        reason: format!("{min} is greater than max {max}"),
      });
    }
    self.push(Operation::RandomizeRange { min, max })
  }

  pub fn add_perlin_noise(&self, resolution: f64, scale: f64) -> Result<&Self> {
    if resolution <= 0.0 {
      return Err(MaskError::InvalidParameter {
        operation: "add_perlin_noise",
        parameter: "resolution",
        reason: format!("must be positive, got {resolution}"),
      });
    }
    self.push(Operation::AddPerlinNoise { resolution, scale })
  }

  pub fn add_gaussian_noise(&self, scale: f64) -> Result<&Self> {
    check_non_negative("add_gaussian_noise", "scale", scale)?;
    self.push(Operation::AddGaussianNoise { scale })
  }

  pub fn add(&self, other: &Mask<T>) -> Result<&Self> {
    self.push_reading(Operation::Add, other)
  }

  pub fn multiply(&self, other: &Mask<T>) -> Result<&Self> {
    self.push_reading(Operation::Multiply, other)
  }

  pub fn add_scalar(&self, value: T) -> Result<&Self> {
    self.push(Operation::AddScalar {
      value: value.to_f64(),
    })
  }

  pub fn multiply_scalar(&self, value: T) -> Result<&Self> {
    self.push(Operation::MultiplyScalar {
      value: value.to_f64(),
    })
  }

  pub fn clamp(&self, min: T, max: T) -> Result<&Self> {
    let (min, max) = (min.to_f64(), max.to_f64());
    if min > max {
      return Err(MaskError::InvalidParameter {
        operation: "clamp",
        parameter: "min",
        reason: format!("{min} is greater than max {max}"),
      });
    }
    self.push(Operation::Clamp { min, max })
  }

  /// `high` where `other` is set, `low` elsewhere.
  pub fn init_from_boolean(&self, other: &BooleanMask, low: T, high: T) -> Result<&Self> {
    self.push_reading(
      Operation::InitFromBoolean {
        low: low.to_f64(),
        high: high.to_f64(),
      },
      other,
    )
  }
}

fn check_unit(operation: &'static str, parameter: &'static str, value: f64) -> Result<()> {
  if (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(MaskError::InvalidParameter {
      operation,
      parameter,
      reason: format!("must be within [0, 1], got {value}"),
    })
  }
}

fn check_non_negative(operation: &'static str, parameter: &'static str, value: f64) -> Result<()> {
  if value >= 0.0 {
    Ok(())
  } else {
    Err(MaskError::InvalidParameter {
      operation,
      parameter,
      reason: format!("must not be negative, got {value}"),
    })
  }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Frozen raster of an awaited mask.
///
/// Later stages on the mask never change a snapshot already taken.
#[derive(Clone)]
pub struct Snapshot<T: Cell> {
  data: Arc<RasterData>,
  kind: PhantomData<fn() -> T>,
}

impl<T: Cell> Snapshot<T> {
  /// `None` when `data` does not hold `T` cells.
  pub(crate) fn new(data: Arc<RasterData>) -> Option<Self> {
    T::view(&data)?;
    Some(Self {
      data,
      kind: PhantomData,
    })
  }

  pub fn raster(&self) -> &Raster<T> {
    match T::view(&self.data) {
      Some(raster) => raster,
      None => unreachable!("snapshot kind is checked on construction"),
    }
  }

  /// Type-erased raster, as exporters take it.
  pub fn data(&self) -> &Arc<RasterData> {
    &self.data
  }
}

impl<T: Cell> Deref for Snapshot<T> {
  type Target = Raster<T>;

  fn deref(&self) -> &Raster<T> {
    self.raster()
  }
}

impl<T: Cell> fmt::Debug for Snapshot<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Snapshot")
      .field("kind", &T::KIND)
      .field("size", &self.data.size())
      .finish()
  }
}
