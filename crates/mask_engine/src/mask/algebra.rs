//! Cell-wise set algebra and arithmetic over canonical cells.

use std::sync::Arc;

use super::ops::cells;
use crate::raster::{Cell, Raster, RasterData};
use crate::symmetry::SymmetryLayout;

pub(super) fn binary<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  other: &RasterData,
  op: impl Fn(T, T) -> T,
) {
  let other = cells::<T>(other);
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    data[c] = op(data[c], other[c]);
  }
}

pub(super) fn unary<T: Cell>(raster: &mut Raster<T>, layout: &SymmetryLayout, op: impl Fn(T) -> T) {
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    data[c] = op(data[c]);
  }
}

/// Apply `op` in `f64` space and convert back.
pub(super) fn map_f64<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  op: impl Fn(f64) -> f64,
) {
  unary(raster, layout, |v| T::from_f64(op(v.to_f64())));
}

pub(super) fn select<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  selector: &RasterData,
  when_set: &RasterData,
  otherwise: &RasterData,
) {
  let when_set = cells::<T>(when_set);
  let otherwise = cells::<T>(otherwise);
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    data[c] = if selector.is_set(c) {
      when_set[c]
    } else {
      otherwise[c]
    };
  }
}

/// Fold every read with `combine`; the first read seeds the result.
pub(super) fn maximum<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  reads: &[Arc<RasterData>],
) {
  let Some((first, rest)) = reads.split_first() else {
    return;
  };
  let first = cells::<T>(first);
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    data[c as usize] = first[c as usize];
  }
  for read in rest {
    binary(raster, layout, read, Cell::combine);
  }
}
