//! Neighborhood operations.
//!
//! Each pass reads a frozen copy of the raster taken at stage start, which is
//! already fully mirrored. Under [`NeighborPolicy::CanonicalOnly`] every
//! non-canonical neighbor is treated as absent.

use glam::IVec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::ops::NeighborPolicy;
use crate::raster::{Cell, MaskKind, Raster};
use crate::symmetry::SymmetryLayout;

const FOUR_NEIGHBORS: [IVec2; 4] = [IVec2::NEG_X, IVec2::X, IVec2::NEG_Y, IVec2::Y];

/// Which cells a neighborhood pass may read.
struct Visibility<'a> {
  layout: &'a SymmetryLayout,
  policy: NeighborPolicy,
  size: i32,
}

impl<'a> Visibility<'a> {
  fn new(layout: &'a SymmetryLayout, policy: NeighborPolicy) -> Self {
    Self {
      layout,
      policy,
      size: layout.size() as i32,
    }
  }

  /// Index of `p` if it is in bounds and visible.
  #[inline]
  fn index(&self, p: IVec2) -> Option<usize> {
    if p.x < 0 || p.y < 0 || p.x >= self.size || p.y >= self.size {
      return None;
    }
    let i = (p.y * self.size + p.x) as usize;
    match self.policy {
      NeighborPolicy::Mirrored => Some(i),
      NeighborPolicy::CanonicalOnly => self.layout.is_canonical(i).then_some(i),
    }
  }

  #[inline]
  fn point(&self, index: usize) -> IVec2 {
    IVec2::new(index as i32 % self.size, index as i32 / self.size)
  }
}

/// Offsets within Euclidean distance `radius`, center included.
fn disk(radius: f64) -> Vec<IVec2> {
  let reach = radius.max(0.0).floor() as i32;
  let limit = radius * radius;
  let mut offsets = Vec::new();
  for dy in -reach..=reach {
    for dx in -reach..=reach {
      if (dx * dx + dy * dy) as f64 <= limit {
        offsets.push(IVec2::new(dx, dy));
      }
    }
  }
  offsets
}

fn fold_disk<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  radius: f64,
  policy: NeighborPolicy,
  op: impl Fn(T, T) -> T,
) {
  let source = raster.as_slice().to_vec();
  let visibility = Visibility::new(layout, policy);
  let offsets = disk(radius);
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    let p = visibility.point(c);
    let mut acc = source[c];
    for &offset in &offsets {
      if let Some(q) = visibility.index(p + offset) {
        acc = op(acc, source[q]);
      }
    }
    data[c] = acc;
  }
}

/// Grow set cells by `radius` (maximum filter for numbers).
pub(super) fn inflate<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  radius: f64,
  policy: NeighborPolicy,
) {
  fold_disk(raster, layout, radius, policy, Cell::combine);
}

/// Shrink set cells by `radius` (minimum filter for numbers).
pub(super) fn deflate<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  radius: f64,
  policy: NeighborPolicy,
) {
  fold_disk(raster, layout, radius, policy, Cell::intersect);
}

/// True when a set cell touches a visible unset 4-neighbor.
fn on_boundary<T: Cell>(source: &[T], visibility: &Visibility<'_>, c: usize) -> bool {
  if !source[c].is_set() {
    return false;
  }
  let p = visibility.point(c);
  FOUR_NEIGHBORS
    .iter()
    .filter_map(|&n| visibility.index(p + n))
    .any(|q| !source[q].is_set())
}

/// Keep only set cells on the border of their region.
pub(super) fn outline<T: Cell>(raster: &mut Raster<T>, layout: &SymmetryLayout, policy: NeighborPolicy) {
  let source = raster.as_slice().to_vec();
  let visibility = Visibility::new(layout, policy);
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    let edge = on_boundary(&source, &visibility, c);
    data[c] = T::from_f64(if edge { 1.0 } else { 0.0 });
  }
}

/// Box-blur over a `(2 * radius + 1)²` window of visible cells.
///
/// Booleans become set where the visible set fraction reaches `density`;
/// numbers take the window mean.
pub(super) fn smooth<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  radius: usize,
  density: f64,
  policy: NeighborPolicy,
) {
  let size = raster.size();
  let visibility = Visibility::new(layout, policy);

  // Summed-area tables of visible values and visible counts
  let stride = size + 1;
  let mut sums = vec![0.0f64; stride * stride];
  let mut counts = vec![0.0f64; stride * stride];
  for y in 0..size {
    let mut row_sum = 0.0;
    let mut row_count = 0.0;
    for x in 0..size {
      let p = IVec2::new(x as i32, y as i32);
      if let Some(i) = visibility.index(p) {
        row_sum += raster.as_slice()[i].to_f64();
        row_count += 1.0;
      }
      let at = (y + 1) * stride + (x + 1);
      sums[at] = sums[at - stride] + row_sum;
      counts[at] = counts[at - stride] + row_count;
    }
  }

  let boolean = T::KIND == MaskKind::Boolean;
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    let (x, y) = (c % size, c / size);
    let x0 = x.saturating_sub(radius);
    let y0 = y.saturating_sub(radius);
    let x1 = (x + radius + 1).min(size);
    let y1 = (y + radius + 1).min(size);
    let window = |table: &[f64]| {
      table[y1 * stride + x1] - table[y0 * stride + x1] - table[y1 * stride + x0]
        + table[y0 * stride + x0]
    };
    let sum = window(&sums);
    let count = window(&counts);
    if count <= 0.0 {
      continue;
    }
    let mean = sum / count;
    data[c] = if boolean {
      T::from_f64(if mean >= density { 1.0 } else { 0.0 })
    } else {
      T::from_f64(mean)
    };
  }
}

/// Randomly eat into set regions from their borders.
///
/// Each canonical cell draws once whether it erodes (probability
/// `strength`); a boundary cell erodes if its canonical source drew a hit,
/// clearing every set cell within `radius`.
pub(super) fn acid<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  rng: &mut ChaCha8Rng,
  strength: f64,
  radius: f64,
  policy: NeighborPolicy,
) {
  let source = raster.as_slice().to_vec();
  let visibility = Visibility::new(layout, policy);

  let mut hit = vec![false; source.len()];
  for &c in layout.canonical_indices() {
    hit[c as usize] = rng.random::<f64>() < strength;
  }
  let seeds: Vec<bool> = (0..source.len())
    .map(|q| hit[layout.source_of(q)] && on_boundary(&source, &visibility, q))
    .collect();

  let offsets = disk(radius);
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    if !source[c].is_set() {
      continue;
    }
    let p = visibility.point(c);
    let eaten = offsets
      .iter()
      .filter_map(|&o| visibility.index(p + o))
      .any(|q| seeds[q]);
    if eaten {
      data[c] = T::zero();
    }
  }
}

/// Set a `width`-cell band along every grid edge.
pub(super) fn fill_edge<T: Cell>(raster: &mut Raster<T>, layout: &SymmetryLayout, width: usize, value: f64) {
  let size = raster.size();
  let last = size - 1;
  let value = T::from_f64(value);
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    let (x, y) = (c % size, c / size);
    let edge_distance = x.min(y).min(last - x).min(last - y);
    if edge_distance < width {
      data[c] = value;
    }
  }
}

/// Set a disk of diameter `extent` around the grid center.
pub(super) fn fill_center<T: Cell>(raster: &mut Raster<T>, layout: &SymmetryLayout, extent: f64, value: f64) {
  let size = raster.size();
  let half = size as f64 / 2.0;
  let radius = extent / 2.0;
  let value = T::from_f64(value);
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    let dx = (c % size) as f64 + 0.5 - half;
    let dy = (c / size) as f64 + 0.5 - half;
    if dx * dx + dy * dy <= radius * radius {
      data[c] = value;
    }
  }
}
