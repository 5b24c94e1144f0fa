//! Symmetry model: pure grid geometry for fair multiplayer maps.
//!
//! Every mask is generated on its *canonical region* only and then copied to
//! the remaining cells, so that each cell holds the same value as all of its
//! mirror/rotation partners.
//!
//! ```text
//!   X (vertical axis)     Z (horizontal axis)    XZ (main diagonal)    POINT2 (center)
//!  ┌──────┬──────┐        ┌─────────────┐        ┌─────────────┐       ┌─────────────┐
//!  │ canon│mirror│        │  canonical  │        │╲  canonical │       │  canonical  │
//!  │      │      │        ├─────────────┤        │  ╲          │       │ ─ ─ ─ ─ ─ ─ │
//!  │      │      │        │   mirror    │        │ m  ╲        │       │   rotated   │
//!  └──────┴──────┘        └─────────────┘        └──────╲──────┘       └─────────────┘
//! ```
//!
//! Perfect symmetries (axes, `Quad`, `Diag`, `Point2`, `Point4`) map pixels to
//! pixels exactly. The other rotations cannot, so each cell copies the nearest
//! in-sector pixel of its exact inverse rotation; square corners that rotate
//! off the grid keep their own value.

use std::f64::consts::TAU;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use glam::{DVec2, IVec2};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::SymmetryError;

/// Non-identity partners of a coordinate.
pub type SymmetryPoints = SmallVec<[IVec2; 16]>;

/// Largest grid side; cell indices of every layout fit in `u32`.
pub const MAX_GRID_SIZE: usize = u16::MAX as usize;

/// Tolerance for angle comparisons at sector boundaries.
const ANGLE_EPSILON: f64 = 1e-9;

/// Search radius (in pixels) around a rounded inverse rotation.
const SOURCE_SEARCH_RADIUS: i32 = 2;

/// Search radius (in pixels) around a rounded forward rotation.
const PARTNER_SEARCH_RADIUS: i32 = 4;

// =============================================================================
// Symmetry
// =============================================================================

/// Geometric equivalence a generated map must respect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Symmetry {
  None,
  /// Mirror across the vertical center axis.
  X,
  /// Mirror across the horizontal center axis.
  Z,
  /// Mirror across the main diagonal.
  Xz,
  /// Mirror across the anti-diagonal.
  Zx,
  /// Both center axes.
  Quad,
  /// Both diagonals.
  Diag,
  Point2,
  Point3,
  Point4,
  Point5,
  Point6,
  Point7,
  Point8,
  Point9,
  Point10,
  Point11,
  Point12,
  Point13,
  Point14,
  Point15,
  Point16,
}

impl Symmetry {
  pub const ALL: [Symmetry; 22] = [
    Symmetry::None,
    Symmetry::X,
    Symmetry::Z,
    Symmetry::Xz,
    Symmetry::Zx,
    Symmetry::Quad,
    Symmetry::Diag,
    Symmetry::Point2,
    Symmetry::Point3,
    Symmetry::Point4,
    Symmetry::Point5,
    Symmetry::Point6,
    Symmetry::Point7,
    Symmetry::Point8,
    Symmetry::Point9,
    Symmetry::Point10,
    Symmetry::Point11,
    Symmetry::Point12,
    Symmetry::Point13,
    Symmetry::Point14,
    Symmetry::Point15,
    Symmetry::Point16,
  ];

  /// Order of the rotation for `PointN` symmetries.
  pub fn rotation_order(self) -> Option<usize> {
    let order = match self {
      Symmetry::Point2 => 2,
      Symmetry::Point3 => 3,
      Symmetry::Point4 => 4,
      Symmetry::Point5 => 5,
      Symmetry::Point6 => 6,
      Symmetry::Point7 => 7,
      Symmetry::Point8 => 8,
      Symmetry::Point9 => 9,
      Symmetry::Point10 => 10,
      Symmetry::Point11 => 11,
      Symmetry::Point12 => 12,
      Symmetry::Point13 => 13,
      Symmetry::Point14 => 14,
      Symmetry::Point15 => 15,
      Symmetry::Point16 => 16,
      _ => return None,
    };
    Some(order)
  }

  /// Number of mirror copies, identity included.
  pub fn num_sym_points(self) -> usize {
    match self {
      Symmetry::None => 1,
      Symmetry::X | Symmetry::Z | Symmetry::Xz | Symmetry::Zx => 2,
      Symmetry::Quad | Symmetry::Diag => 4,
      other => other.rotation_order().unwrap_or(1),
    }
  }

  /// True when every canonical pixel has exactly `num_sym_points - 1`
  /// partners (up to fixed points on the axes).
  pub fn is_perfect(self) -> bool {
    !matches!(self.rotation_order(), Some(order) if order != 2 && order != 4)
  }

  /// Angular width of one rotational sector in degrees.
  pub fn sector_degrees(self) -> Option<f32> {
    self.rotation_order().map(|order| 360.0 / order as f32)
  }

  /// Smallest grid that still gives every sector its own pixels.
  pub fn min_grid_size(self) -> usize {
    if self.is_perfect() {
      1
    } else {
      self.rotation_order().unwrap_or(1)
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Symmetry::None => "NONE",
      Symmetry::X => "X",
      Symmetry::Z => "Z",
      Symmetry::Xz => "XZ",
      Symmetry::Zx => "ZX",
      Symmetry::Quad => "QUAD",
      Symmetry::Diag => "DIAG",
      Symmetry::Point2 => "POINT2",
      Symmetry::Point3 => "POINT3",
      Symmetry::Point4 => "POINT4",
      Symmetry::Point5 => "POINT5",
      Symmetry::Point6 => "POINT6",
      Symmetry::Point7 => "POINT7",
      Symmetry::Point8 => "POINT8",
      Symmetry::Point9 => "POINT9",
      Symmetry::Point10 => "POINT10",
      Symmetry::Point11 => "POINT11",
      Symmetry::Point12 => "POINT12",
      Symmetry::Point13 => "POINT13",
      Symmetry::Point14 => "POINT14",
      Symmetry::Point15 => "POINT15",
      Symmetry::Point16 => "POINT16",
    }
  }
}

impl fmt::Display for Symmetry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Symmetry {
  type Err = SymmetryError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let upper = s.trim().to_ascii_uppercase();
    Symmetry::ALL
      .into_iter()
      .find(|symmetry| symmetry.name() == upper)
      .ok_or_else(|| SymmetryError::Unknown(s.to_string()))
  }
}

/// Mirror-copy count of a symmetry, identity included.
pub fn num_sym_points(symmetry: Symmetry) -> usize {
  symmetry.num_sym_points()
}

/// Convert degrees to radians normalized into `[0, 2π)`.
///
/// Angles within epsilon of a full turn snap to zero, so a pixel lying on the
/// first sector boundary always belongs to sector 0.
pub fn rotated_radians(degrees: f64) -> f64 {
  normalize_radians(degrees.to_radians())
}

fn normalize_radians(radians: f64) -> f64 {
  let wrapped = radians.rem_euclid(TAU);
  if TAU - wrapped < ANGLE_EPSILON {
    0.0
  } else {
    wrapped
  }
}

/// All non-identity coordinates that must hold the same value as `point`.
///
/// Builds a one-off [`SymmetryLayout`]; callers querying many points should
/// keep a layout around instead.
pub fn symmetry_points(
  point: IVec2,
  symmetry: Symmetry,
  size: usize,
) -> Result<SymmetryPoints, SymmetryError> {
  Ok(SymmetryLayout::new(symmetry, size)?.symmetry_points(point))
}

// =============================================================================
// Settings
// =============================================================================

/// Which of the three configured symmetries an operation follows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymmetrySource {
  #[default]
  Terrain,
  Team,
  Spawn,
}

#[derive(Deserialize)]
struct RawSymmetrySettings {
  terrain: Symmetry,
  team: Symmetry,
  spawn: Symmetry,
}

/// Terrain, team and spawn symmetries of one generation run.
///
/// Spawns are a subset of terrain mirror points, so the spawn point count must
/// evenly divide the terrain point count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSymmetrySettings")]
pub struct SymmetrySettings {
  terrain: Symmetry,
  team: Symmetry,
  spawn: Symmetry,
}

impl SymmetrySettings {
  pub fn new(terrain: Symmetry, team: Symmetry, spawn: Symmetry) -> Result<Self, SymmetryError> {
    let terrain_points = terrain.num_sym_points();
    let spawn_points = spawn.num_sym_points();
    if terrain_points % spawn_points != 0 {
      return Err(SymmetryError::IncompatibleSpawn {
        terrain,
        terrain_points,
        spawn,
        spawn_points,
      });
    }
    Ok(Self {
      terrain,
      team,
      spawn,
    })
  }

  /// Same symmetry for terrain, teams and spawns.
  pub fn uniform(symmetry: Symmetry) -> Self {
    Self {
      terrain: symmetry,
      team: symmetry,
      spawn: symmetry,
    }
  }

  pub fn get(&self, source: SymmetrySource) -> Symmetry {
    match source {
      SymmetrySource::Terrain => self.terrain,
      SymmetrySource::Team => self.team,
      SymmetrySource::Spawn => self.spawn,
    }
  }

  pub fn terrain(&self) -> Symmetry {
    self.terrain
  }

  pub fn team(&self) -> Symmetry {
    self.team
  }

  pub fn spawn(&self) -> Symmetry {
    self.spawn
  }
}

impl Default for SymmetrySettings {
  fn default() -> Self {
    Self::uniform(Symmetry::None)
  }
}

impl TryFrom<RawSymmetrySettings> for SymmetrySettings {
  type Error = SymmetryError;

  fn try_from(raw: RawSymmetrySettings) -> Result<Self, Self::Error> {
    Self::new(raw.terrain, raw.team, raw.spawn)
  }
}

// =============================================================================
// Geometry
// =============================================================================

/// Sector table for non-perfect rotations.
struct Sector {
  order: usize,
  angle: f64,
  inside: Vec<bool>,
}

struct Geometry {
  symmetry: Symmetry,
  size: usize,
  last: i32,
  sector: Option<Sector>,
}

impl Geometry {
  fn new(symmetry: Symmetry, size: usize) -> Self {
    let sector = match symmetry.rotation_order() {
      Some(order) if !symmetry.is_perfect() => {
        let angle = TAU / order as f64;
        let inside = (0..size * size)
          .map(|i| sector_index(offset_of(size, i % size, i / size), angle, order) == 0)
          .collect();
        Some(Sector {
          order,
          angle,
          inside,
        })
      }
      _ => None,
    };
    Self {
      symmetry,
      size,
      last: size as i32 - 1,
      sector,
    }
  }

  #[inline]
  fn index(&self, p: IVec2) -> usize {
    p.y as usize * self.size + p.x as usize
  }

  #[inline]
  fn in_bounds(&self, p: IVec2) -> bool {
    p.x >= 0 && p.y >= 0 && p.x <= self.last && p.y <= self.last
  }

  /// Canonical region membership.
  fn in_region(&self, x: i32, y: i32) -> bool {
    let s = self.last;
    match self.symmetry {
      Symmetry::None => true,
      Symmetry::X => 2 * x <= s,
      Symmetry::Z => 2 * y <= s,
      Symmetry::Xz => y >= x,
      Symmetry::Zx => x + y <= s,
      Symmetry::Quad => 2 * x <= s && 2 * y <= s,
      Symmetry::Diag => x <= y && x + y <= s,
      Symmetry::Point2 => 2 * y < s || (2 * y == s && 2 * x <= s),
      Symmetry::Point4 => (2 * x <= s && 2 * y < s) || (2 * x == s && 2 * y == s),
      _ => match &self.sector {
        Some(sector) => sector.inside[y as usize * self.size + x as usize],
        None => true,
      },
    }
  }

  /// Exact non-identity images under a perfect symmetry.
  fn images(&self, p: IVec2) -> SmallVec<[IVec2; 3]> {
    let s = self.last;
    let (x, y) = (p.x, p.y);
    let mut out = SmallVec::new();
    match self.symmetry {
      Symmetry::X => out.push(IVec2::new(s - x, y)),
      Symmetry::Z => out.push(IVec2::new(x, s - y)),
      Symmetry::Xz => out.push(IVec2::new(y, x)),
      Symmetry::Zx => out.push(IVec2::new(s - y, s - x)),
      Symmetry::Quad => {
        out.push(IVec2::new(s - x, y));
        out.push(IVec2::new(x, s - y));
        out.push(IVec2::new(s - x, s - y));
      }
      Symmetry::Diag => {
        out.push(IVec2::new(y, x));
        out.push(IVec2::new(s - y, s - x));
        out.push(IVec2::new(s - x, s - y));
      }
      Symmetry::Point2 => out.push(IVec2::new(s - x, s - y)),
      Symmetry::Point4 => {
        out.push(IVec2::new(s - y, x));
        out.push(IVec2::new(s - x, s - y));
        out.push(IVec2::new(y, s - x));
      }
      _ => {}
    }
    out
  }

  /// Canonical cell whose value cell `index` copies.
  fn source_of(&self, index: usize) -> usize {
    let p = IVec2::new((index % self.size) as i32, (index / self.size) as i32);
    match &self.sector {
      None => std::iter::once(p)
        .chain(self.images(p))
        .min_by_key(|q| (!self.in_region(q.x, q.y), self.index(*q)))
        .map(|q| self.index(q))
        .unwrap_or(index),
      Some(sector) => self.rotated_source(index, p, sector),
    }
  }

  fn rotated_source(&self, index: usize, p: IVec2, sector: &Sector) -> usize {
    let offset = offset_of(self.size, p.x as usize, p.y as usize);
    let k = sector_index(offset, sector.angle, sector.order);
    if k == 0 {
      return index;
    }
    let exact = DVec2::from_angle(-(k as f64) * sector.angle).rotate(offset) + self.center();
    let rounded = IVec2::new(exact.x.round() as i32, exact.y.round() as i32);

    let mut best: Option<(f64, usize)> = None;
    for dy in -SOURCE_SEARCH_RADIUS..=SOURCE_SEARCH_RADIUS {
      for dx in -SOURCE_SEARCH_RADIUS..=SOURCE_SEARCH_RADIUS {
        let q = rounded + IVec2::new(dx, dy);
        if !self.in_bounds(q) {
          continue;
        }
        let j = self.index(q);
        if !sector.inside[j] {
          continue;
        }
        let distance = exact.distance_squared(q.as_dvec2());
        let better = match best {
          None => true,
          Some((d, bj)) => distance < d || (distance == d && j < bj),
        };
        if better {
          best = Some((distance, j));
        }
      }
    }
    best.map_or(index, |(_, j)| j)
  }

  /// Pixel coordinates of the grid center.
  fn center(&self) -> DVec2 {
    DVec2::splat(self.size as f64 / 2.0 - 0.5)
  }

  fn column_range(&self, x: usize) -> Range<u32> {
    let mut range: Option<Range<u32>> = None;
    for y in 0..self.size {
      if self.in_region(x as i32, y as i32) {
        let y = y as u32;
        range = Some(match range {
          None => y..y + 1,
          Some(r) => r.start..y + 1,
        });
      }
    }
    range.unwrap_or(0..0)
  }
}

/// Offset of a pixel center from the grid center.
fn offset_of(size: usize, x: usize, y: usize) -> DVec2 {
  let half = size as f64 / 2.0;
  DVec2::new(x as f64 + 0.5 - half, y as f64 + 0.5 - half)
}

fn sector_index(offset: DVec2, angle: f64, order: usize) -> usize {
  let theta = normalize_radians(offset.y.atan2(offset.x));
  (((theta + ANGLE_EPSILON) / angle).floor() as usize).min(order - 1)
}

// =============================================================================
// SymmetryLayout
// =============================================================================

/// Precomputed canonical-source table for one `(symmetry, size)` pair.
///
/// `source[i]` is the canonical cell that cell `i` copies; canonical cells are
/// exactly the fixed points `source[i] == i`. Layouts are immutable and
/// shared between masks through an `Arc`.
pub struct SymmetryLayout {
  symmetry: Symmetry,
  size: usize,
  source: Vec<u32>,
  canonical: Vec<u32>,
  columns: Vec<Range<u32>>,
  rotation: Option<(usize, f64)>,
}

impl SymmetryLayout {
  /// Build the layout, failing fast on unsupported pairings.
  pub fn new(symmetry: Symmetry, size: usize) -> Result<Self, SymmetryError> {
    if size == 0 {
      return Err(SymmetryError::ZeroSize);
    }
    if size > MAX_GRID_SIZE {
      return Err(SymmetryError::GridTooLarge {
        size,
        max: MAX_GRID_SIZE,
      });
    }
    let min = symmetry.min_grid_size();
    if size < min {
      return Err(SymmetryError::GridTooSmall {
        symmetry,
        size,
        min,
      });
    }

    let geometry = Geometry::new(symmetry, size);
    let cells = size * size;
    let source: Vec<u32> = (0..cells).map(|i| geometry.source_of(i) as u32).collect();
    let canonical = source
      .iter()
      .enumerate()
      .filter(|(i, s)| *i == **s as usize)
      .map(|(i, _)| i as u32)
      .collect();
    let columns = (0..size).map(|x| geometry.column_range(x)).collect();
    let rotation = geometry.sector.as_ref().map(|s| (s.order, s.angle));

    Ok(Self {
      symmetry,
      size,
      source,
      canonical,
      columns,
      rotation,
    })
  }

  pub fn symmetry(&self) -> Symmetry {
    self.symmetry
  }

  pub fn size(&self) -> usize {
    self.size
  }

  /// Canonical cell indices in ascending order.
  pub fn canonical_indices(&self) -> &[u32] {
    &self.canonical
  }

  #[inline]
  pub fn source_of(&self, index: usize) -> usize {
    self.source[index] as usize
  }

  #[inline]
  pub fn is_canonical(&self, index: usize) -> bool {
    self.source[index] as usize == index
  }

  /// Exclusive upper bound of canonical-sector columns.
  pub fn max_x_bound(&self) -> usize {
    self
      .columns
      .iter()
      .rposition(|r| !r.is_empty())
      .map_or(0, |x| x + 1)
  }

  /// First canonical-sector column.
  pub fn min_x_bound(&self) -> usize {
    self.columns.iter().position(|r| !r.is_empty()).unwrap_or(0)
  }

  /// First canonical row of column `x`; 0 past the sector boundary.
  pub fn min_y_bound(&self, x: usize) -> usize {
    self.columns.get(x).map_or(0, |r| r.start as usize)
  }

  /// Exclusive last canonical row of column `x`; 0 past the sector boundary.
  pub fn max_y_bound(&self, x: usize) -> usize {
    self.columns.get(x).map_or(0, |r| r.end as usize)
  }

  /// All non-identity coordinates that hold the same value as `point`.
  ///
  /// Out-of-bounds points have no partners.
  pub fn symmetry_points(&self, point: IVec2) -> SymmetryPoints {
    let mut out = SymmetryPoints::new();
    let last = self.size as i32 - 1;
    if point.x < 0 || point.y < 0 || point.x > last || point.y > last {
      return out;
    }
    let index = self.index(point);
    let source = self.source_of(index);
    let canonical = self.point(source);

    let push = |q: IVec2, out: &mut SymmetryPoints| {
      if q != point && !out.contains(&q) {
        out.push(q);
      }
    };

    match self.rotation {
      None => {
        push(canonical, &mut out);
        let geometry = Geometry::new(self.symmetry, self.size);
        for image in geometry.images(canonical) {
          push(image, &mut out);
        }
      }
      Some((order, angle)) => {
        if source != index {
          push(canonical, &mut out);
        }
        let center = DVec2::splat(self.size as f64 / 2.0 - 0.5);
        let offset = canonical.as_dvec2() - center;
        for k in 1..order {
          let exact = DVec2::from_angle(k as f64 * angle).rotate(offset) + center;
          let rounded = IVec2::new(exact.x.round() as i32, exact.y.round() as i32);
          for dy in -PARTNER_SEARCH_RADIUS..=PARTNER_SEARCH_RADIUS {
            for dx in -PARTNER_SEARCH_RADIUS..=PARTNER_SEARCH_RADIUS {
              let q = rounded + IVec2::new(dx, dy);
              if q.x < 0 || q.y < 0 || q.x > last || q.y > last {
                continue;
              }
              if self.source_of(self.index(q)) == source {
                push(q, &mut out);
              }
            }
          }
        }
      }
    }
    out.sort_by_key(|q| (q.y, q.x));
    out
  }

  /// Copy every canonical value to the cells that mirror it.
  pub fn apply<T: Copy>(&self, data: &mut [T]) {
    debug_assert_eq!(data.len(), self.source.len());
    for (i, &s) in self.source.iter().enumerate() {
      let s = s as usize;
      if s != i {
        data[i] = data[s];
      }
    }
  }

  /// True when every cell equals its canonical source.
  pub fn is_symmetric<T: PartialEq>(&self, data: &[T]) -> bool {
    data.len() == self.source.len()
      && self
        .source
        .iter()
        .enumerate()
        .all(|(i, &s)| data[i] == data[s as usize])
  }

  #[inline]
  fn index(&self, p: IVec2) -> usize {
    p.y as usize * self.size + p.x as usize
  }

  #[inline]
  fn point(&self, index: usize) -> IVec2 {
    IVec2::new((index % self.size) as i32, (index / self.size) as i32)
  }
}

impl fmt::Debug for SymmetryLayout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SymmetryLayout")
      .field("symmetry", &self.symmetry)
      .field("size", &self.size)
      .field("canonical", &self.canonical.len())
      .finish()
  }
}

#[cfg(test)]
#[path = "symmetry_test.rs"]
mod symmetry_test;
