//! Square rasters and the cell types masks are built from.
//!
//! Cells are stored row-major: `index = y * size + x`. A [`Raster`] is plain
//! data; symmetry is enforced by the stages that write it, never by the
//! raster itself.

use std::fmt;

use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::symmetry::SymmetryLayout;

// =============================================================================
// MaskKind
// =============================================================================

/// Cell type of a mask, named after its graph class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaskKind {
  #[serde(rename = "BooleanMask")]
  Boolean,
  #[serde(rename = "FloatMask")]
  Float,
  #[serde(rename = "IntegerMask")]
  Integer,
}

impl MaskKind {
  pub const ALL: [MaskKind; 3] = [MaskKind::Boolean, MaskKind::Float, MaskKind::Integer];

  pub fn class_name(self) -> &'static str {
    match self {
      MaskKind::Boolean => "BooleanMask",
      MaskKind::Float => "FloatMask",
      MaskKind::Integer => "IntegerMask",
    }
  }

  pub fn from_class_name(name: &str) -> Option<Self> {
    MaskKind::ALL.into_iter().find(|kind| kind.class_name() == name)
  }
}

impl fmt::Display for MaskKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.class_name())
  }
}

// =============================================================================
// Raster
// =============================================================================

/// Square grid of cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster<T> {
  size: usize,
  data: Vec<T>,
}

impl<T: Copy> Raster<T> {
  /// Raster with every cell set to `value`.
  pub fn filled(size: usize, value: T) -> Self {
    Self {
      size,
      data: vec![value; size * size],
    }
  }

  /// Wrap row-major cells; `None` when the length is not `size * size`.
  pub fn from_vec(size: usize, data: Vec<T>) -> Option<Self> {
    (data.len() == size * size).then_some(Self { size, data })
  }

  /// Build a raster by evaluating `f(x, y)` for every cell.
  pub fn from_fn(size: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
    let mut data = Vec::with_capacity(size * size);
    for y in 0..size {
      for x in 0..size {
        data.push(f(x, y));
      }
    }
    Self { size, data }
  }

  #[inline]
  pub fn size(&self) -> usize {
    self.size
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.data.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// Flat row-major cells, as handed to exporters.
  #[inline]
  pub fn as_slice(&self) -> &[T] {
    &self.data
  }

  #[inline]
  pub fn as_mut_slice(&mut self) -> &mut [T] {
    &mut self.data
  }

  #[inline]
  pub fn index(&self, x: usize, y: usize) -> usize {
    y * self.size + x
  }

  #[inline]
  pub fn point(&self, index: usize) -> IVec2 {
    IVec2::new((index % self.size) as i32, (index / self.size) as i32)
  }

  #[inline]
  pub fn in_bounds(&self, p: IVec2) -> bool {
    p.x >= 0 && p.y >= 0 && (p.x as usize) < self.size && (p.y as usize) < self.size
  }

  #[inline]
  pub fn get(&self, x: usize, y: usize) -> T {
    self.data[self.index(x, y)]
  }

  #[inline]
  pub fn set(&mut self, x: usize, y: usize, value: T) {
    let i = self.index(x, y);
    self.data[i] = value;
  }

  /// Checked lookup by signed coordinate.
  pub fn get_point(&self, p: IVec2) -> Option<T> {
    self
      .in_bounds(p)
      .then(|| self.data[self.index(p.x as usize, p.y as usize)])
  }
}

// =============================================================================
// Cell
// =============================================================================

/// Value stored in a mask cell.
///
/// The binary operators carry the set-algebra meaning for `bool` and the
/// arithmetic meaning for numbers; `combine` is union/max, `intersect` is
/// intersection/min.
pub trait Cell: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
  const KIND: MaskKind;

  fn zero() -> Self;
  fn to_f64(self) -> f64;
  fn from_f64(value: f64) -> Self;
  fn is_set(self) -> bool;

  fn combine(self, other: Self) -> Self;
  fn intersect(self, other: Self) -> Self;
  fn subtract(self, other: Self) -> Self;
  fn add(self, other: Self) -> Self;
  fn multiply(self, other: Self) -> Self;
  fn invert(self) -> Self;

  fn wrap(raster: Raster<Self>) -> RasterData;
  fn view(data: &RasterData) -> Option<&Raster<Self>>;
  fn view_mut(data: &mut RasterData) -> Option<&mut Raster<Self>>;
}

impl Cell for bool {
  const KIND: MaskKind = MaskKind::Boolean;

  fn zero() -> Self {
    false
  }

  fn to_f64(self) -> f64 {
    if self {
      1.0
    } else {
      0.0
    }
  }

  /// Majority rule: half or more counts as set.
  fn from_f64(value: f64) -> Self {
    value >= 0.5
  }

  fn is_set(self) -> bool {
    self
  }

  fn combine(self, other: Self) -> Self {
    self || other
  }

  fn intersect(self, other: Self) -> Self {
    self && other
  }

  fn subtract(self, other: Self) -> Self {
    self && !other
  }

  fn add(self, other: Self) -> Self {
    self || other
  }

  fn multiply(self, other: Self) -> Self {
    self && other
  }

  fn invert(self) -> Self {
    !self
  }

  fn wrap(raster: Raster<Self>) -> RasterData {
    RasterData::Boolean(raster)
  }

  fn view(data: &RasterData) -> Option<&Raster<Self>> {
    match data {
      RasterData::Boolean(r) => Some(r),
      _ => None,
    }
  }

  fn view_mut(data: &mut RasterData) -> Option<&mut Raster<Self>> {
    match data {
      RasterData::Boolean(r) => Some(r),
      _ => None,
    }
  }
}

impl Cell for f32 {
  const KIND: MaskKind = MaskKind::Float;

  fn zero() -> Self {
    0.0
  }

  fn to_f64(self) -> f64 {
    self as f64
  }

  fn from_f64(value: f64) -> Self {
    value as f32
  }

  fn is_set(self) -> bool {
    self > 0.0
  }

  fn combine(self, other: Self) -> Self {
    self.max(other)
  }

  fn intersect(self, other: Self) -> Self {
    self.min(other)
  }

  fn subtract(self, other: Self) -> Self {
    self - other
  }

  fn add(self, other: Self) -> Self {
    self + other
  }

  fn multiply(self, other: Self) -> Self {
    self * other
  }

  fn invert(self) -> Self {
    -self
  }

  fn wrap(raster: Raster<Self>) -> RasterData {
    RasterData::Float(raster)
  }

  fn view(data: &RasterData) -> Option<&Raster<Self>> {
    match data {
      RasterData::Float(r) => Some(r),
      _ => None,
    }
  }

  fn view_mut(data: &mut RasterData) -> Option<&mut Raster<Self>> {
    match data {
      RasterData::Float(r) => Some(r),
      _ => None,
    }
  }
}

impl Cell for i32 {
  const KIND: MaskKind = MaskKind::Integer;

  fn zero() -> Self {
    0
  }

  fn to_f64(self) -> f64 {
    self as f64
  }

  /// Rounds to nearest; out-of-range values saturate.
  fn from_f64(value: f64) -> Self {
    value.round() as i32
  }

  fn is_set(self) -> bool {
    self > 0
  }

  fn combine(self, other: Self) -> Self {
    self.max(other)
  }

  fn intersect(self, other: Self) -> Self {
    self.min(other)
  }

  fn subtract(self, other: Self) -> Self {
    self.saturating_sub(other)
  }

  fn add(self, other: Self) -> Self {
    self.saturating_add(other)
  }

  fn multiply(self, other: Self) -> Self {
    self.saturating_mul(other)
  }

  fn invert(self) -> Self {
    self.saturating_neg()
  }

  fn wrap(raster: Raster<Self>) -> RasterData {
    RasterData::Integer(raster)
  }

  fn view(data: &RasterData) -> Option<&Raster<Self>> {
    match data {
      RasterData::Integer(r) => Some(r),
      _ => None,
    }
  }

  fn view_mut(data: &mut RasterData) -> Option<&mut Raster<Self>> {
    match data {
      RasterData::Integer(r) => Some(r),
      _ => None,
    }
  }
}

/// Cells with arithmetic meaning (noise, scalar math, ranges).
pub trait Numeric: Cell {}

impl Numeric for f32 {}

impl Numeric for i32 {}

// =============================================================================
// RasterData
// =============================================================================

/// Type-erased raster held by a pipeline mask slot.
#[derive(Clone, Debug, PartialEq)]
pub enum RasterData {
  Boolean(Raster<bool>),
  Float(Raster<f32>),
  Integer(Raster<i32>),
}

/// Run `$body` with `$r` bound to the typed raster inside a [`RasterData`].
macro_rules! dispatch {
  ($data:expr, $r:ident => $body:expr) => {
    match $data {
      $crate::raster::RasterData::Boolean($r) => $body,
      $crate::raster::RasterData::Float($r) => $body,
      $crate::raster::RasterData::Integer($r) => $body,
    }
  };
}
pub(crate) use dispatch;

impl RasterData {
  /// Zero-filled raster of the given kind.
  pub fn new(kind: MaskKind, size: usize) -> Self {
    match kind {
      MaskKind::Boolean => RasterData::Boolean(Raster::filled(size, false)),
      MaskKind::Float => RasterData::Float(Raster::filled(size, 0.0)),
      MaskKind::Integer => RasterData::Integer(Raster::filled(size, 0)),
    }
  }

  pub fn kind(&self) -> MaskKind {
    match self {
      RasterData::Boolean(_) => MaskKind::Boolean,
      RasterData::Float(_) => MaskKind::Float,
      RasterData::Integer(_) => MaskKind::Integer,
    }
  }

  pub fn size(&self) -> usize {
    dispatch!(self, r => r.size())
  }

  /// Cell as `f64` (booleans read as 0 or 1).
  pub fn value_f64(&self, index: usize) -> f64 {
    dispatch!(self, r => r.as_slice()[index].to_f64())
  }

  pub fn is_set(&self, index: usize) -> bool {
    dispatch!(self, r => r.as_slice()[index].is_set())
  }

  /// Every cell as `f64`, for cross-kind reads.
  pub fn to_f64_vec(&self) -> Vec<f64> {
    dispatch!(self, r => r.as_slice().iter().map(|v| v.to_f64()).collect())
  }

  pub fn is_symmetric(&self, layout: &SymmetryLayout) -> bool {
    dispatch!(self, r => layout.is_symmetric(r.as_slice()))
  }
}

#[cfg(test)]
#[path = "raster_test.rs"]
mod raster_test;
