//! Size changes and the rules that make them symmetry-safe.

use super::ops::ResizeFilter;
use crate::error::{MaskError, Result};
use crate::raster::{Cell, Raster};
use crate::symmetry::{Symmetry, SymmetryLayout, MAX_GRID_SIZE};

/// Validated resize request: target size plus sampling filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizePlan {
  pub size: usize,
  pub filter: ResizeFilter,
}

impl ResizePlan {
  /// Nearest-neighbor resample to any size the symmetry can tile.
  pub fn set_size(name: &str, symmetry: Symmetry, from: usize, to: usize) -> Result<Self> {
    check_target(name, symmetry, from, to)?;
    Ok(Self {
      size: to,
      filter: ResizeFilter::Nearest,
    })
  }

  /// Grow by an integral factor.
  pub fn enlarge(name: &str, symmetry: Symmetry, from: usize, factor: usize) -> Result<Self> {
    if factor == 0 {
      return Err(incompatible(name, from, 0, "enlarge factor must be positive"));
    }
    let to = from
      .checked_mul(factor)
      .ok_or_else(|| incompatible(name, from, usize::MAX, "enlarged size overflows"))?;
    check_target(name, symmetry, from, to)?;
    Ok(Self {
      size: to,
      filter: ResizeFilter::Nearest,
    })
  }

  /// Shrink by an integral divisor of the current size.
  pub fn shrink(name: &str, symmetry: Symmetry, from: usize, factor: usize) -> Result<Self> {
    if factor == 0 || from % factor != 0 {
      let to = if factor == 0 { 0 } else { from / factor };
      return Err(incompatible(name, from, to, "shrink factor must evenly divide the size"));
    }
    let to = from / factor;
    check_target(name, symmetry, from, to)?;
    Ok(Self {
      size: to,
      filter: ResizeFilter::Area,
    })
  }

  /// Enlarge or shrink when the ratio is integral, nearest-neighbor otherwise.
  pub fn resample(name: &str, symmetry: Symmetry, from: usize, to: usize) -> Result<Self> {
    check_target(name, symmetry, from, to)?;
    if to >= from && to % from == 0 {
      Self::enlarge(name, symmetry, from, to / from)
    } else if to < from && from % to == 0 {
      Self::shrink(name, symmetry, from, from / to)
    } else {
      Self::set_size(name, symmetry, from, to)
    }
  }
}

/// Target must be positive, indexable, and wide enough for every sector.
fn check_target(name: &str, symmetry: Symmetry, from: usize, to: usize) -> Result<()> {
  if to == 0 {
    return Err(incompatible(name, from, to, "target size must be positive"));
  }
  if to > MAX_GRID_SIZE {
    return Err(incompatible(name, from, to, "target size exceeds the largest supported grid"));
  }
  if to < symmetry.min_grid_size() {
    return Err(incompatible(
      name,
      from,
      to,
      "target size is finer than the symmetry's sector granularity",
    ));
  }
  Ok(())
}

fn incompatible(name: &str, from: usize, to: usize, reason: &'static str) -> MaskError {
  MaskError::IncompatibleResize {
    name: name.to_string(),
    from,
    to,
    reason,
  }
}

/// Resample `source` onto the canonical cells of `layout`, then mirror.
pub(super) fn resize<T: Cell>(source: &Raster<T>, layout: &SymmetryLayout, filter: ResizeFilter) -> Raster<T> {
  let from = source.size();
  let to = layout.size();
  let mut out = Raster::filled(to, T::zero());
  if from == to {
    out.as_mut_slice().copy_from_slice(source.as_slice());
    return out;
  }

  let ratio = from as f64 / to as f64;
  let factor = (from / to).max(1);
  let data = out.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    let (x, y) = (c % to, c / to);
    data[c] = match filter {
      ResizeFilter::Nearest => {
        let sx = (((x as f64 + 0.5) * ratio) as usize).min(from - 1);
        let sy = (((y as f64 + 0.5) * ratio) as usize).min(from - 1);
        source.get(sx, sy)
      }
      ResizeFilter::Area => {
        let mut total = 0.0;
        for sy in y * factor..((y + 1) * factor).min(from) {
          for sx in x * factor..((x + 1) * factor).min(from) {
            total += source.get(sx, sy).to_f64();
          }
        }
        T::from_f64(total / (factor * factor) as f64)
      }
    };
  }
  layout.apply(data);
  out
}
