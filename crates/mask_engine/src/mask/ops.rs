//! Stage operations.
//!
//! An [`Operation`] is the unit of work a mask handle appends to the pipeline.
//! Every operation writes the canonical cells of its target and then lets the
//! stage's [`SymmetryLayout`] copy them to their partners, so the symmetry
//! invariant holds after every completed stage.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{algebra, distance, generate, morphology, resize};
use crate::error::MaskError;
use crate::raster::{dispatch, Cell, RasterData};
use crate::symmetry::SymmetryLayout;

/// Consumer-supplied canonical-cell writer.
pub type TransformFn = Arc<dyn Fn(&mut RasterData) -> Result<(), String> + Send + Sync>;

/// Which neighbors a neighborhood-sensitive operation may read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NeighborPolicy {
  /// Read the fully mirrored raster, so sector edges see their partners.
  #[default]
  Mirrored,
  /// Ignore every cell outside the canonical region.
  CanonicalOnly,
}

impl NeighborPolicy {
  pub fn name(self) -> &'static str {
    match self {
      NeighborPolicy::Mirrored => "MIRRORED",
      NeighborPolicy::CanonicalOnly => "CANONICAL_ONLY",
    }
  }
}

impl fmt::Display for NeighborPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for NeighborPolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "MIRRORED" => Ok(NeighborPolicy::Mirrored),
      "CANONICAL_ONLY" => Ok(NeighborPolicy::CanonicalOnly),
      _ => Err(format!("unknown neighbor policy `{s}`")),
    }
  }
}

/// Sampling used when a mask changes size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResizeFilter {
  Nearest,
  /// Block mean; majority for booleans.
  Area,
}

/// One scheduled mutation of a mask.
///
/// Operations that read other masks receive them, in declared order, as the
/// stage's read dependencies.
#[derive(Clone)]
pub enum Operation {
  Fill { value: f64 },
  Randomize { density: f64 },
  RandomizeRange { min: f64, max: f64 },
  AddPerlinNoise { resolution: f64, scale: f64 },
  AddGaussianNoise { scale: f64 },
  /// Converting copy of read 0.
  CopyFrom,
  /// `high` where read 0 is set, `low` elsewhere.
  InitFromBoolean { low: f64, high: f64 },
  /// Set where read 0 is at least `threshold`.
  InitFromThreshold { threshold: f64 },
  Combine,
  Intersect,
  Subtract,
  Add,
  Multiply,
  Invert,
  AddScalar { value: f64 },
  MultiplyScalar { value: f64 },
  Clamp { min: f64, max: f64 },
  Inflate { radius: f64, policy: NeighborPolicy },
  Deflate { radius: f64, policy: NeighborPolicy },
  Outline { policy: NeighborPolicy },
  Smooth { radius: usize, density: f64, policy: NeighborPolicy },
  Acid { strength: f64, radius: f64, policy: NeighborPolicy },
  FillEdge { width: usize, value: f64 },
  FillCenter { extent: f64, value: f64 },
  Resize { size: usize, filter: ResizeFilter },
  /// Euclidean distance to the nearest set cell of read 0.
  DistanceField,
  /// Read 1 where read 0 is set, read 2 elsewhere.
  Select,
  /// Cell-wise maximum (union for booleans) of all reads.
  Maximum,
  Transform { name: &'static str, apply: TransformFn },
}

impl Operation {
  pub fn name(&self) -> &'static str {
    match self {
      Operation::Fill { .. } => "fill",
      Operation::Randomize { .. } => "randomize",
      Operation::RandomizeRange { .. } => "randomize_range",
      Operation::AddPerlinNoise { .. } => "add_perlin_noise",
      Operation::AddGaussianNoise { .. } => "add_gaussian_noise",
      Operation::CopyFrom => "init",
      Operation::InitFromBoolean { .. } => "init_from_boolean",
      Operation::InitFromThreshold { .. } => "init_from_threshold",
      Operation::Combine => "combine",
      Operation::Intersect => "intersect",
      Operation::Subtract => "subtract",
      Operation::Add => "add",
      Operation::Multiply => "multiply",
      Operation::Invert => "invert",
      Operation::AddScalar { .. } => "add_scalar",
      Operation::MultiplyScalar { .. } => "multiply_scalar",
      Operation::Clamp { .. } => "clamp",
      Operation::Inflate { .. } => "inflate",
      Operation::Deflate { .. } => "deflate",
      Operation::Outline { .. } => "outline",
      Operation::Smooth { .. } => "smooth",
      Operation::Acid { .. } => "acid",
      Operation::FillEdge { .. } => "fill_edge",
      Operation::FillCenter { .. } => "fill_center",
      Operation::Resize { .. } => "resize",
      Operation::DistanceField => "distance_field",
      Operation::Select => "select",
      Operation::Maximum => "maximum",
      Operation::Transform { name, .. } => *name,
    }
  }

  /// Number of read dependencies the operation consumes, `None` for any.
  pub fn arity(&self) -> Option<usize> {
    match self {
      Operation::CopyFrom
      | Operation::InitFromBoolean { .. }
      | Operation::InitFromThreshold { .. }
      | Operation::Combine
      | Operation::Intersect
      | Operation::Subtract
      | Operation::Add
      | Operation::Multiply
      | Operation::DistanceField => Some(1),
      Operation::Select => Some(3),
      Operation::Maximum => None,
      _ => Some(0),
    }
  }

  /// Size of the target after this stage.
  pub fn output_size(&self, current: usize) -> usize {
    match self {
      Operation::Resize { size, .. } => *size,
      _ => current,
    }
  }

  /// Run the operation on the stage's private copy of the target raster.
  pub(crate) fn apply(&self, input: StageInput<'_>) -> Result<(), MaskError> {
    let StageInput {
      raster,
      rng,
      reads,
      layout,
    } = input;

    if let Some(expected) = self.arity() {
      if reads.len() != expected {
        return Err(MaskError::InvalidParameter {
          operation: self.name(),
          parameter: "reads",
          reason: format!("expected {expected} read dependencies, got {}", reads.len()),
        });
      }
    }
    for read in reads {
      if read.size() != raster.size() {
        return Err(MaskError::SizeMismatch {
          name: format!("read of {}", self.name()),
          expected: raster.size(),
          actual: read.size(),
        });
      }
    }

    match self {
      Operation::Fill { value } => dispatch!(raster, r => generate::fill(r, layout, *value)),
      Operation::Randomize { density } => {
        dispatch!(raster, r => generate::randomize(r, layout, rng, *density))
      }
      Operation::RandomizeRange { min, max } => {
        dispatch!(raster, r => generate::randomize_range(r, layout, rng, *min, *max))
      }
      Operation::AddPerlinNoise { resolution, scale } => {
        dispatch!(raster, r => generate::add_perlin_noise(r, layout, rng, *resolution, *scale))
      }
      Operation::AddGaussianNoise { scale } => {
        dispatch!(raster, r => generate::add_gaussian_noise(r, layout, rng, *scale))
      }
      Operation::CopyFrom => dispatch!(raster, r => generate::copy_from(r, layout, &reads[0])),
      Operation::InitFromBoolean { low, high } => {
        dispatch!(raster, r => generate::init_from_boolean(r, layout, &reads[0], *low, *high))
      }
      Operation::InitFromThreshold { threshold } => {
        dispatch!(raster, r => generate::init_from_threshold(r, layout, &reads[0], *threshold))
      }
      Operation::Combine => dispatch!(raster, r => algebra::binary(r, layout, &reads[0], Cell::combine)),
      Operation::Intersect => {
        dispatch!(raster, r => algebra::binary(r, layout, &reads[0], Cell::intersect))
      }
      Operation::Subtract => dispatch!(raster, r => algebra::binary(r, layout, &reads[0], Cell::subtract)),
      Operation::Add => dispatch!(raster, r => algebra::binary(r, layout, &reads[0], Cell::add)),
      Operation::Multiply => dispatch!(raster, r => algebra::binary(r, layout, &reads[0], Cell::multiply)),
      Operation::Invert => dispatch!(raster, r => algebra::unary(r, layout, Cell::invert)),
      Operation::AddScalar { value } => {
        dispatch!(raster, r => algebra::map_f64(r, layout, |v| v + value))
      }
      Operation::MultiplyScalar { value } => {
        dispatch!(raster, r => algebra::map_f64(r, layout, |v| v * value))
      }
      Operation::Clamp { min, max } => {
        if min > max {
          return Err(MaskError::InvalidParameter {
            operation: "clamp",
            parameter: "min",
            reason: format!("{min} is greater than max {max}"),
          });
        }
        dispatch!(raster, r => algebra::map_f64(r, layout, |v| v.clamp(*min, *max)))
      }
      Operation::Inflate { radius, policy } => {
        dispatch!(raster, r => morphology::inflate(r, layout, *radius, *policy))
      }
      Operation::Deflate { radius, policy } => {
        dispatch!(raster, r => morphology::deflate(r, layout, *radius, *policy))
      }
      Operation::Outline { policy } => dispatch!(raster, r => morphology::outline(r, layout, *policy)),
      Operation::Smooth {
        radius,
        density,
        policy,
      } => dispatch!(raster, r => morphology::smooth(r, layout, *radius, *density, *policy)),
      Operation::Acid {
        strength,
        radius,
        policy,
      } => dispatch!(raster, r => morphology::acid(r, layout, rng, *strength, *radius, *policy)),
      Operation::FillEdge { width, value } => {
        dispatch!(raster, r => morphology::fill_edge(r, layout, *width, *value))
      }
      Operation::FillCenter { extent, value } => {
        dispatch!(raster, r => morphology::fill_center(r, layout, *extent, *value))
      }
      Operation::Resize { filter, .. } => {
        let resized = dispatch!(&*raster, r => Cell::wrap(resize::resize(r, layout, *filter)));
        *raster = resized;
      }
      Operation::DistanceField => {
        dispatch!(raster, r => distance::distance_field(r, layout, &reads[0]))
      }
      Operation::Select => {
        dispatch!(raster, r => algebra::select(r, layout, &reads[0], &reads[1], &reads[2]))
      }
      Operation::Maximum => dispatch!(raster, r => algebra::maximum(r, layout, reads)),
      Operation::Transform { name, apply } => {
        apply(raster).map_err(|reason| MaskError::InvalidParameter {
          operation: *name,
          parameter: "transform",
          reason,
        })?;
      }
    }

    if raster.size() != layout.size() {
      return Err(MaskError::SizeMismatch {
        name: self.name().to_string(),
        expected: layout.size(),
        actual: raster.size(),
      });
    }
    dispatch!(raster, r => layout.apply(r.as_mut_slice()));
    Ok(())
  }
}

impl fmt::Debug for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Everything a running stage may touch.
pub(crate) struct StageInput<'a> {
  pub raster: &'a mut RasterData,
  pub rng: &'a mut ChaCha8Rng,
  pub reads: &'a [Arc<RasterData>],
  pub layout: &'a SymmetryLayout,
}

/// Cells of a read dependency as `T`, converting only when kinds differ.
pub(crate) fn cells<T: Cell>(data: &RasterData) -> Cow<'_, [T]> {
  match T::view(data) {
    Some(r) => Cow::Borrowed(r.as_slice()),
    None => Cow::Owned(dispatch!(data, r => r.as_slice().iter().map(|v| T::from_f64(v.to_f64())).collect())),
  }
}
