//! Read-only queries over final rasters.

use glam::IVec2;
use rand::Rng;

use crate::raster::{Cell, Raster};
use crate::symmetry::SymmetryLayout;

pub(crate) fn sum<T: Cell>(raster: &Raster<T>) -> f64 {
  raster.as_slice().iter().map(|v| v.to_f64()).sum()
}

pub(crate) fn count<T: Cell>(raster: &Raster<T>) -> usize {
  raster.as_slice().iter().filter(|v| v.is_set()).count()
}

pub(crate) fn min<T: Cell>(raster: &Raster<T>) -> f64 {
  raster
    .as_slice()
    .iter()
    .map(|v| v.to_f64())
    .fold(f64::INFINITY, f64::min)
}

pub(crate) fn max<T: Cell>(raster: &Raster<T>) -> f64 {
  raster
    .as_slice()
    .iter()
    .map(|v| v.to_f64())
    .fold(f64::NEG_INFINITY, f64::max)
}

pub(crate) fn average<T: Cell>(raster: &Raster<T>) -> f64 {
  if raster.is_empty() {
    0.0
  } else {
    sum(raster) / raster.len() as f64
  }
}

/// Uniformly chosen set cell, `None` when nothing is set.
pub(crate) fn random_position<T: Cell>(raster: &Raster<T>, rng: &mut impl Rng) -> Option<IVec2> {
  let set: Vec<usize> = raster
    .as_slice()
    .iter()
    .enumerate()
    .filter(|(_, v)| v.is_set())
    .map(|(i, _)| i)
    .collect();
  if set.is_empty() {
    return None;
  }
  Some(raster.point(set[rng.random_range(0..set.len())]))
}

/// Greedy, symmetric selection of set cells at least `spacing` apart.
///
/// Canonical cells are visited in index order. A cell is accepted together
/// with all of its partners when none of them is blocked and no two of them
/// are closer than `spacing`; every accepted cell then blocks its disk.
pub(crate) fn spaced_coordinates<T: Cell>(
  raster: &Raster<T>,
  layout: &SymmetryLayout,
  spacing: f64,
) -> Vec<IVec2> {
  let size = raster.size() as i32;
  let reach = spacing.max(0.0).ceil() as i32;
  let limit = spacing * spacing;
  let mut blocked = vec![false; raster.len()];
  let mut accepted = Vec::new();

  let index = |p: IVec2| (p.y * size + p.x) as usize;

  for &c in layout.canonical_indices() {
    let c = c as usize;
    if !raster.as_slice()[c].is_set() || blocked[c] {
      continue;
    }
    let p = raster.point(c);
    let mut group = vec![p];
    group.extend(layout.symmetry_points(p));

    let clear = group.iter().all(|&q| !blocked[index(q)]);
    let separated = group.iter().enumerate().all(|(i, a)| {
      group[i + 1..]
        .iter()
        .all(|b| (*a - *b).as_dvec2().length_squared() >= limit)
    });
    if !clear || !separated {
      continue;
    }

    for &q in &group {
      for dy in -reach..=reach {
        for dx in -reach..=reach {
          let n = q + IVec2::new(dx, dy);
          if n.x < 0 || n.y < 0 || n.x >= size || n.y >= size {
            continue;
          }
          if ((dx * dx + dy * dy) as f64) < limit {
            blocked[index(n)] = true;
          }
        }
      }
    }
    accepted.extend(group);
  }
  accepted
}
