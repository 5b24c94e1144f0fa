use super::*;
use crate::symmetry::{Symmetry, SymmetryLayout};

#[test]
fn test_row_major_layout() {
  let raster = Raster::from_fn(4, |x, y| (y * 10 + x) as i32);
  assert_eq!(raster.get(3, 1), 13);
  assert_eq!(raster.as_slice()[raster.index(2, 3)], 32);
  assert_eq!(raster.point(6), IVec2::new(2, 1));
}

#[test]
fn test_from_vec_rejects_wrong_length() {
  assert!(Raster::from_vec(3, vec![0.0f32; 9]).is_some());
  assert!(Raster::from_vec(3, vec![0.0f32; 8]).is_none());
}

#[test]
fn test_get_point_bounds() {
  let mut raster = Raster::filled(3, false);
  raster.set(2, 2, true);
  assert_eq!(raster.get_point(IVec2::new(2, 2)), Some(true));
  assert_eq!(raster.get_point(IVec2::new(3, 0)), None);
  assert_eq!(raster.get_point(IVec2::new(0, -1)), None);
}

#[test]
fn test_bool_set_algebra() {
  assert!(true.combine(false));
  assert!(!true.intersect(false));
  assert!(true.subtract(false));
  assert!(!true.subtract(true));
  assert!(!true.invert());
  assert!(bool::from_f64(0.5));
  assert!(!bool::from_f64(0.49));
}

#[test]
fn test_numeric_cells() {
  assert_eq!(2.0f32.combine(3.0), 3.0);
  assert_eq!(2.0f32.intersect(3.0), 2.0);
  assert_eq!(2.0f32.subtract(3.0), -1.0);
  assert_eq!(Cell::add(2.0f32, 3.0), 5.0);
  assert_eq!(2.5f32.invert(), -2.5);

  assert_eq!(i32::MAX.add(1), i32::MAX);
  assert_eq!(i32::MIN.invert(), i32::MAX);
  assert_eq!(i32::from_f64(2.6), 3);
  assert_eq!(i32::from_f64(-2.6), -3);
}

#[test]
fn test_views_match_kind() {
  let mut data = RasterData::new(MaskKind::Float, 4);
  assert_eq!(data.kind(), MaskKind::Float);
  assert!(f32::view(&data).is_some());
  assert!(bool::view(&data).is_none());
  f32::view_mut(&mut data).unwrap().set(1, 1, 0.75);
  assert_eq!(data.value_f64(5), 0.75);
  assert!(data.is_set(5));
}

#[test]
fn test_class_names() {
  for kind in MaskKind::ALL {
    assert_eq!(MaskKind::from_class_name(kind.class_name()), Some(kind));
  }
  assert_eq!(MaskKind::from_class_name("Mask"), None);
  assert_eq!(serde_json::to_string(&MaskKind::Integer).unwrap(), "\"IntegerMask\"");
}

#[test]
fn test_raster_data_symmetry_check() {
  let layout = SymmetryLayout::new(Symmetry::X, 4).unwrap();
  let mut raster = Raster::filled(4, 0i32);
  raster.set(0, 2, 7);
  let mut data = RasterData::Integer(raster);
  assert!(!data.is_symmetric(&layout));
  if let RasterData::Integer(r) = &mut data {
    layout.apply(r.as_mut_slice());
  }
  assert!(data.is_symmetric(&layout));
  assert_eq!(data.value_f64(2 * 4 + 3), 7.0);
}
