//! Generators: write canonical cells from the mask's own RNG or a read.
//!
//! Random draws happen once per canonical cell in ascending index order, so
//! the same seed always yields the same raster regardless of scheduling.

use noise::{NoiseFn, Perlin};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use super::ops::cells;
use crate::raster::{Cell, Raster, RasterData};
use crate::symmetry::SymmetryLayout;

pub(super) fn fill<T: Cell>(raster: &mut Raster<T>, _layout: &SymmetryLayout, value: f64) {
  raster.as_mut_slice().fill(T::from_f64(value));
}

/// Set each canonical cell with probability `density`.
pub(super) fn randomize<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  rng: &mut ChaCha8Rng,
  density: f64,
) {
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let set = rng.random::<f64>() < density;
    data[c as usize] = T::from_f64(if set { 1.0 } else { 0.0 });
  }
}

/// Uniform values in `[min, max)`.
pub(super) fn randomize_range<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  rng: &mut ChaCha8Rng,
  min: f64,
  max: f64,
) {
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    data[c as usize] = T::from_f64(min + rng.random::<f64>() * (max - min));
  }
}

/// Add Perlin noise with `resolution` lattice cells across the mask.
pub(super) fn add_perlin_noise<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  rng: &mut ChaCha8Rng,
  resolution: f64,
  scale: f64,
) {
  let perlin = Perlin::new(rng.random::<u32>());
  let size = raster.size() as f64;
  let step = resolution / size;
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    let x = (c % layout.size()) as f64;
    let y = (c / layout.size()) as f64;
    let noise = perlin.get([x * step, y * step]) * scale;
    data[c] = T::from_f64(data[c].to_f64() + noise);
  }
}

pub(super) fn add_gaussian_noise<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  rng: &mut ChaCha8Rng,
  scale: f64,
) {
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    let sample: f64 = rng.sample(StandardNormal);
    data[c] = T::from_f64(data[c].to_f64() + sample * scale);
  }
}

pub(super) fn copy_from<T: Cell>(raster: &mut Raster<T>, layout: &SymmetryLayout, source: &RasterData) {
  let source = cells::<T>(source);
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    data[c as usize] = source[c as usize];
  }
}

pub(super) fn init_from_boolean<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  source: &RasterData,
  low: f64,
  high: f64,
) {
  let (low, high) = (T::from_f64(low), T::from_f64(high));
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    data[c] = if source.is_set(c) { high } else { low };
  }
}

pub(super) fn init_from_threshold<T: Cell>(
  raster: &mut Raster<T>,
  layout: &SymmetryLayout,
  source: &RasterData,
  threshold: f64,
) {
  let data = raster.as_mut_slice();
  for &c in layout.canonical_indices() {
    let c = c as usize;
    let set = source.value_f64(c) >= threshold;
    data[c] = T::from_f64(if set { 1.0 } else { 0.0 });
  }
}
