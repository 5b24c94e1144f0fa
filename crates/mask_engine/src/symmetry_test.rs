use super::*;

fn layout(symmetry: Symmetry, size: usize) -> SymmetryLayout {
  SymmetryLayout::new(symmetry, size).unwrap()
}

fn pts(points: &[(i32, i32)]) -> Vec<IVec2> {
  points.iter().map(|&(x, y)| IVec2::new(x, y)).collect()
}

// =============================================================================
// Symmetry enum
// =============================================================================

#[test]
fn test_num_sym_points() {
  assert_eq!(num_sym_points(Symmetry::None), 1);
  assert_eq!(num_sym_points(Symmetry::X), 2);
  assert_eq!(num_sym_points(Symmetry::Zx), 2);
  assert_eq!(num_sym_points(Symmetry::Quad), 4);
  assert_eq!(num_sym_points(Symmetry::Diag), 4);
  assert_eq!(num_sym_points(Symmetry::Point2), 2);
  assert_eq!(num_sym_points(Symmetry::Point7), 7);
  assert_eq!(num_sym_points(Symmetry::Point16), 16);
}

#[test]
fn test_perfect_symmetries() {
  let perfect: Vec<_> = Symmetry::ALL.into_iter().filter(|s| s.is_perfect()).collect();
  assert_eq!(
    perfect,
    vec![
      Symmetry::None,
      Symmetry::X,
      Symmetry::Z,
      Symmetry::Xz,
      Symmetry::Zx,
      Symmetry::Quad,
      Symmetry::Diag,
      Symmetry::Point2,
      Symmetry::Point4,
    ]
  );
  assert_eq!(Symmetry::Point8.sector_degrees(), Some(45.0));
  assert_eq!(Symmetry::Quad.sector_degrees(), None);
}

#[test]
fn test_parse_names() {
  assert_eq!("point4".parse::<Symmetry>(), Ok(Symmetry::Point4));
  assert_eq!("XZ".parse::<Symmetry>(), Ok(Symmetry::Xz));
  assert_eq!(" none ".parse::<Symmetry>(), Ok(Symmetry::None));
  assert_eq!(
    "SPIRAL".parse::<Symmetry>(),
    Err(SymmetryError::Unknown("SPIRAL".to_string()))
  );
  for symmetry in Symmetry::ALL {
    assert_eq!(symmetry.to_string().parse::<Symmetry>(), Ok(symmetry));
  }
}

#[test]
fn test_serde_names_match_display() {
  let json = serde_json::to_string(&Symmetry::Point12).unwrap();
  assert_eq!(json, "\"POINT12\"");
  let parsed: Symmetry = serde_json::from_str("\"ZX\"").unwrap();
  assert_eq!(parsed, Symmetry::Zx);
}

#[test]
fn test_rotated_radians() {
  assert_eq!(rotated_radians(360.0), 0.0);
  assert_eq!(rotated_radians(359.999_999_999_9), 0.0);
  assert!((rotated_radians(90.0) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
  assert!((rotated_radians(-90.0) - 3.0 * std::f64::consts::FRAC_PI_2).abs() < 1e-12);
  assert!((rotated_radians(450.0) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
}

// =============================================================================
// Settings
// =============================================================================

#[test]
fn test_settings_spawn_must_divide_terrain() {
  assert!(SymmetrySettings::new(Symmetry::Quad, Symmetry::Quad, Symmetry::X).is_ok());
  assert!(SymmetrySettings::new(Symmetry::Point6, Symmetry::Point6, Symmetry::Point3).is_ok());

  let err = SymmetrySettings::new(Symmetry::X, Symmetry::X, Symmetry::Quad).unwrap_err();
  assert_eq!(
    err,
    SymmetryError::IncompatibleSpawn {
      terrain: Symmetry::X,
      terrain_points: 2,
      spawn: Symmetry::Quad,
      spawn_points: 4,
    }
  );
  assert!(SymmetrySettings::new(Symmetry::Point6, Symmetry::Point6, Symmetry::Point4).is_err());
}

#[test]
fn test_settings_deserialize_validates() {
  let ok: SymmetrySettings =
    serde_json::from_str(r#"{"terrain":"QUAD","team":"Z","spawn":"POINT2"}"#).unwrap();
  assert_eq!(ok.get(SymmetrySource::Terrain), Symmetry::Quad);
  assert_eq!(ok.get(SymmetrySource::Team), Symmetry::Z);
  assert_eq!(ok.get(SymmetrySource::Spawn), Symmetry::Point2);

  let bad = serde_json::from_str::<SymmetrySettings>(
    r#"{"terrain":"POINT6","team":"POINT6","spawn":"POINT4"}"#,
  );
  assert!(bad.is_err());
}

// =============================================================================
// Layout construction
// =============================================================================

#[test]
fn test_unsupported_sizes_fail_fast() {
  assert_eq!(
    SymmetryLayout::new(Symmetry::X, 0).unwrap_err(),
    SymmetryError::ZeroSize
  );
  assert_eq!(
    SymmetryLayout::new(Symmetry::Point5, 4).unwrap_err(),
    SymmetryError::GridTooSmall {
      symmetry: Symmetry::Point5,
      size: 4,
      min: 5,
    }
  );
  assert_eq!(
    SymmetryLayout::new(Symmetry::X, MAX_GRID_SIZE + 1).unwrap_err(),
    SymmetryError::GridTooLarge {
      size: MAX_GRID_SIZE + 1,
      max: MAX_GRID_SIZE,
    }
  );
  assert!(matches!(
    SymmetryLayout::new(Symmetry::Point2, usize::MAX),
    Err(SymmetryError::GridTooLarge { .. })
  ));
  assert!(SymmetryLayout::new(Symmetry::Point2, 1).is_ok());
  assert!(SymmetryLayout::new(Symmetry::Point4, 1).is_ok());
  assert!(SymmetryLayout::new(Symmetry::Point5, 5).is_ok());
}

#[test]
fn test_canonical_counts_even() {
  assert_eq!(layout(Symmetry::None, 256).canonical_indices().len(), 256 * 256);
  assert_eq!(layout(Symmetry::X, 256).canonical_indices().len(), 128 * 256);
  assert_eq!(layout(Symmetry::Z, 256).canonical_indices().len(), 128 * 256);
  assert_eq!(layout(Symmetry::Quad, 256).canonical_indices().len(), 128 * 128);
  assert_eq!(layout(Symmetry::Point2, 256).canonical_indices().len(), 128 * 256);
  assert_eq!(layout(Symmetry::Point4, 256).canonical_indices().len(), 128 * 128);
  // Diagonal mirrors keep the diagonal itself
  assert_eq!(layout(Symmetry::Xz, 8).canonical_indices().len(), 8 * 9 / 2);
  assert_eq!(layout(Symmetry::Zx, 8).canonical_indices().len(), 8 * 9 / 2);
}

#[test]
fn test_odd_size_counts_center_once() {
  let size = 257;
  assert_eq!(layout(Symmetry::X, size).canonical_indices().len(), 129 * 257);
  assert_eq!(layout(Symmetry::Z, size).canonical_indices().len(), 129 * 257);
  assert_eq!(layout(Symmetry::Quad, size).canonical_indices().len(), 129 * 129);
  assert_eq!(
    layout(Symmetry::Point2, size).canonical_indices().len(),
    (257 * 257 + 1) / 2
  );
  // 5x5 under four-fold rotation: six orbits of four plus the center
  assert_eq!(layout(Symmetry::Point4, 5).canonical_indices().len(), 7);
}

#[test]
fn test_center_cell_has_no_partners() {
  let quad = layout(Symmetry::Quad, 257);
  assert!(quad.symmetry_points(IVec2::new(128, 128)).is_empty());
  let point4 = layout(Symmetry::Point4, 5);
  assert!(point4.symmetry_points(IVec2::new(2, 2)).is_empty());
}

// =============================================================================
// Partners
// =============================================================================

#[test]
fn test_point2_reflects_through_center() {
  let points = symmetry_points(IVec2::new(3, 7), Symmetry::Point2, 256).unwrap();
  assert_eq!(points.to_vec(), pts(&[(252, 248)]));
}

#[test]
fn test_axis_partners() {
  let x = layout(Symmetry::X, 5);
  assert_eq!(x.symmetry_points(IVec2::new(1, 2)).to_vec(), pts(&[(3, 2)]));
  assert!(x.symmetry_points(IVec2::new(2, 4)).is_empty());

  let z = layout(Symmetry::Z, 6);
  assert_eq!(z.symmetry_points(IVec2::new(1, 5)).to_vec(), pts(&[(1, 0)]));

  let xz = layout(Symmetry::Xz, 6);
  assert_eq!(xz.symmetry_points(IVec2::new(1, 4)).to_vec(), pts(&[(4, 1)]));
  assert!(xz.symmetry_points(IVec2::new(3, 3)).is_empty());

  let zx = layout(Symmetry::Zx, 6);
  assert_eq!(zx.symmetry_points(IVec2::new(0, 0)).to_vec(), pts(&[(5, 5)]));
}

#[test]
fn test_four_way_partners() {
  let quad = layout(Symmetry::Quad, 5);
  assert_eq!(
    quad.symmetry_points(IVec2::new(0, 0)).to_vec(),
    pts(&[(4, 0), (0, 4), (4, 4)])
  );
  assert_eq!(quad.symmetry_points(IVec2::new(0, 2)).to_vec(), pts(&[(4, 2)]));

  let point4 = layout(Symmetry::Point4, 4);
  assert_eq!(
    point4.symmetry_points(IVec2::new(1, 1)).to_vec(),
    pts(&[(2, 1), (1, 2), (2, 2)])
  );

  let diag = layout(Symmetry::Diag, 6);
  assert_eq!(
    diag.symmetry_points(IVec2::new(1, 0)).to_vec(),
    pts(&[(0, 1), (5, 4), (4, 5)])
  );
}

#[test]
fn test_partners_are_symmetric_relation() {
  for symmetry in [
    Symmetry::X,
    Symmetry::Quad,
    Symmetry::Diag,
    Symmetry::Point2,
    Symmetry::Point4,
  ] {
    let layout = layout(symmetry, 9);
    for y in 0..9 {
      for x in 0..9 {
        let p = IVec2::new(x, y);
        for q in layout.symmetry_points(p) {
          assert!(
            layout.symmetry_points(q).contains(&p),
            "{symmetry}: {q} does not list {p}"
          );
        }
      }
    }
  }
}

#[test]
fn test_out_of_bounds_has_no_partners() {
  let layout = layout(Symmetry::Quad, 8);
  assert!(layout.symmetry_points(IVec2::new(-1, 0)).is_empty());
  assert!(layout.symmetry_points(IVec2::new(0, 8)).is_empty());
}

// =============================================================================
// Bounds
// =============================================================================

#[test]
fn test_column_bounds_axes() {
  let x = layout(Symmetry::X, 257);
  assert_eq!(x.max_x_bound(), 129);
  assert_eq!(x.min_y_bound(0), 0);
  assert_eq!(x.max_y_bound(0), 257);
  assert_eq!(x.max_y_bound(200), 0);

  let z = layout(Symmetry::Z, 256);
  assert_eq!(z.max_x_bound(), 256);
  assert_eq!(z.max_y_bound(17), 128);
}

#[test]
fn test_column_bounds_diagonal() {
  let xz = layout(Symmetry::Xz, 8);
  assert_eq!(xz.min_y_bound(3), 3);
  assert_eq!(xz.max_y_bound(3), 8);

  // Diag sector is a triangle; columns past the tip return the 0..0 sentinel
  let diag = layout(Symmetry::Diag, 8);
  assert_eq!(diag.max_x_bound(), 4);
  assert_eq!(diag.min_y_bound(3), 3);
  assert_eq!(diag.max_y_bound(3), 5);
  assert_eq!(diag.min_y_bound(4), 0);
  assert_eq!(diag.max_y_bound(4), 0);
}

// =============================================================================
// Propagation
// =============================================================================

#[test]
fn test_apply_makes_every_symmetry_consistent() {
  for symmetry in Symmetry::ALL {
    let size = 24;
    let layout = layout(symmetry, size);
    let mut data: Vec<u32> = (0..(size * size) as u32).collect();
    layout.apply(&mut data);
    assert!(layout.is_symmetric(&data), "{symmetry} not symmetric after apply");
    for &c in layout.canonical_indices() {
      assert_eq!(data[c as usize], c, "{symmetry} overwrote canonical cell {c}");
    }
  }
}

#[test]
fn test_apply_matches_partner_values() {
  let layout = layout(Symmetry::Point2, 256);
  let mut data: Vec<u32> = (0..256 * 256).map(|i| (i * 7919) % 1000).collect();
  layout.apply(&mut data);
  for y in 0..256usize {
    for x in 0..256usize {
      assert_eq!(data[y * 256 + x], data[(255 - y) * 256 + (255 - x)]);
    }
  }
}

#[test]
fn test_rotational_sector_share() {
  for symmetry in [Symmetry::Point3, Symmetry::Point6, Symmetry::Point8] {
    let size = 64;
    let layout = layout(symmetry, size);
    let canonical = layout.canonical_indices().len();
    let order = symmetry.num_sym_points();
    // Wedge plus the off-grid corners that keep their own values
    assert!(canonical * order * 10 >= size * size * 9, "{symmetry}: sector too small");
    assert!(canonical * 10 < size * size * 6, "{symmetry}: sector too large");
  }
}

#[test]
fn test_rotational_partners_share_source() {
  let size = 64;
  let layout = layout(Symmetry::Point3, size);
  let center = IVec2::splat(size as i32 / 2);

  let mut with_partners = 0;
  let mut checked = 0;
  for &c in layout.canonical_indices() {
    let p = IVec2::new(c as i32 % size as i32, c as i32 / size as i32);
    let radius = (p - center).as_vec2().length();
    if !(5.0..25.0).contains(&radius) {
      continue;
    }
    checked += 1;
    let partners = layout.symmetry_points(p);
    if !partners.is_empty() {
      with_partners += 1;
    }
    for q in partners {
      let qi = q.y as usize * size + q.x as usize;
      assert_eq!(layout.source_of(qi), c as usize);
    }
  }
  assert!(checked > 0);
  assert!(with_partners * 2 > checked);
}
