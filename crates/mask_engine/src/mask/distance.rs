//! Exact Euclidean distance transform (Felzenszwalb & Huttenlocher).

use crate::raster::{Cell, Raster, RasterData};
use crate::symmetry::SymmetryLayout;

/// Stand-in for "no set cell" that keeps the parabola math finite.
const FAR: f64 = 1e20;

/// Write the distance from each canonical cell to the nearest set cell of
/// `source`. Masks with no set cell read `2 * size` everywhere.
pub(super) fn distance_field<T: Cell>(raster: &mut Raster<T>, layout: &SymmetryLayout, source: &RasterData) {
  let size = raster.size();
  let cap = (2 * size) as f64;
  let squared = squared_distances(size, |i| source.is_set(i));
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    data[c] = T::from_f64(squared[c].sqrt().min(cap));
  }
}

/// Squared distance to the nearest set cell, columns then rows.
pub(crate) fn squared_distances(size: usize, is_set: impl Fn(usize) -> bool) -> Vec<f64> {
  let mut grid: Vec<f64> = (0..size * size)
    .map(|i| if is_set(i) { 0.0 } else { FAR })
    .collect();

  let mut f = vec![0.0; size];
  let mut d = vec![0.0; size];
  let mut v = vec![0usize; size];
  let mut z = vec![0.0; size + 1];

  for x in 0..size {
    for y in 0..size {
      f[y] = grid[y * size + x];
    }
    transform_1d(&f, &mut d, &mut v, &mut z);
    for y in 0..size {
      grid[y * size + x] = d[y];
    }
  }
  for y in 0..size {
    let row = y * size..(y + 1) * size;
    f.copy_from_slice(&grid[row.clone()]);
    transform_1d(&f, &mut d, &mut v, &mut z);
    grid[row].copy_from_slice(&d);
  }
  grid
}

/// Lower envelope of parabolas rooted at `(q, f[q])`.
fn transform_1d(f: &[f64], d: &mut [f64], v: &mut [usize], z: &mut [f64]) {
  let n = f.len();
  if n == 0 {
    return;
  }
  let intersect = |q: usize, p: usize| {
    let (qf, pf) = (q as f64, p as f64);
    ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
  };

  let mut k = 0;
  v[0] = 0;
  z[0] = f64::NEG_INFINITY;
  z[1] = f64::INFINITY;
  for q in 1..n {
    let mut s = intersect(q, v[k]);
    while s <= z[k] {
      k -= 1;
      s = intersect(q, v[k]);
    }
    k += 1;
    v[k] = q;
    z[k] = s;
    z[k + 1] = f64::INFINITY;
  }

  k = 0;
  for (q, out) in d.iter_mut().enumerate().take(n) {
    while z[k + 1] < q as f64 {
      k += 1;
    }
    let offset = q as f64 - v[k] as f64;
    *out = offset * offset + f[v[k]];
  }
}
