use chrono::TimeZone;
use ndarray::Array2;
use scene_lst::core::utm::geographic_to_utm;
use scene_lst::core::{quality, ElevationBands, PixelInterpolator, PointParameterTable, ReanalysisCoordinates, ReanalysisGrid};
use scene_lst::{
    AtmosphericParameters, GeoPoint, GridConfig, LstError, Satellite, SceneMetadata, ThermalCalibration,
};

const ZONE: i32 = 12;

/// Skewed grid resembling a Lambert conformal reanalysis grid:
/// rows run roughly north, columns roughly east, both with a tilt
fn skewed_coordinates() -> ReanalysisCoordinates {
    let latitude = Array2::from_shape_fn((24, 24), |(r, c)| 36.0 + 0.3 * r as f64 - 0.02 * c as f64);
    let longitude = Array2::from_shape_fn((24, 24), |(r, c)| -116.0 + 0.35 * c as f64 + 0.03 * r as f64);
    ReanalysisCoordinates::new(latitude, longitude).unwrap()
}

fn scene(ul: GeoPoint, lr: GeoPoint, pixel_size: f64) -> SceneMetadata {
    scene_in_zone(ul, lr, pixel_size, ZONE)
}

fn scene_in_zone(ul: GeoPoint, lr: GeoPoint, pixel_size: f64, zone: i32) -> SceneMetadata {
    let ul_map = geographic_to_utm(ul, zone);
    let lr_map = geographic_to_utm(lr, zone);
    SceneMetadata {
        scene_id: "coverage".to_string(),
        satellite: Satellite::Landsat8,
        instrument: "OLI_TIRS".to_string(),
        acquisition_time: chrono::Utc.with_ymd_and_hms(2015, 8, 1, 18, 0, 0).unwrap(),
        sun_zenith: 30.0,
        sun_azimuth: 140.0,
        ul_geo_corner: ul,
        lr_geo_corner: lr,
        ul_map_corner: ul_map,
        pixel_size,
        utm_zone: zone,
        lines: ((ul_map.y - lr_map.y) / pixel_size) as usize,
        samples: ((lr_map.x - ul_map.x) / pixel_size) as usize,
        thermal: ThermalCalibration { gain: 0.0003342, bias: 0.1, fill_value: 0, saturate_value: None },
    }
}

#[test]
fn test_every_pixel_is_bracketed_by_used_points() {
    let _ = env_logger::builder().is_test(true).try_init();

    let coordinates = skewed_coordinates();
    let metadata = scene(GeoPoint::new(41.6, -112.6), GeoPoint::new(39.8, -110.4), 2000.0);
    let grid = ReanalysisGrid::build(&coordinates, &metadata, &GridConfig::default()).unwrap();
    println!(
        "Grid rows {}..={}, cols {}..={}, {} points, scene {} x {}",
        grid.min_row, grid.max_row, grid.min_col, grid.max_col, grid.num_points(), metadata.lines, metadata.samples
    );

    // Row-major enumeration of the selected block
    for (i, point) in grid.points().iter().enumerate() {
        assert_eq!(point.index, i);
        assert_eq!(point.row, grid.min_row + i / grid.num_cols);
        assert_eq!(point.col, grid.min_col + i % grid.num_cols);
    }

    let bands = ElevationBands::for_scene(2.3, 0.1);
    let mut table = PointParameterTable::new(grid.num_points(), bands.len());
    for point in grid.used_points() {
        for band in 0..bands.len() {
            table.insert(point.index, band, AtmosphericParameters::new(0.8, 2.0, 3.0)).unwrap();
        }
    }
    let interpolator = PixelInterpolator::new(&grid, &bands, &table, 10.9).unwrap();

    let mut outside = 0;
    for line in 0..metadata.lines {
        let mut hint = interpolator.locator().center_cell();
        for sample in 0..metadata.samples {
            let map = metadata.pixel_map_coordinates(line, sample);
            let pixel = interpolator.interpolate_parameters(map, 1.7, &mut hint);
            if pixel.quality & quality::OUTSIDE_GRID != 0 {
                outside += 1;
            }
            assert!((pixel.params.transmission - 0.8).abs() < 1e-9);
        }
    }
    assert_eq!(outside, 0, "pixels outside the used grid cells");
}

#[test]
fn test_grid_points_carry_utm_coordinates() {
    let coordinates = skewed_coordinates();
    let metadata = scene(GeoPoint::new(41.6, -112.6), GeoPoint::new(39.8, -110.4), 2000.0);
    let grid = ReanalysisGrid::build(&coordinates, &metadata, &GridConfig::default()).unwrap();

    let point = &grid.points()[0];
    let expected = geographic_to_utm(point.location, ZONE);
    assert_eq!(point.map, expected);

    // Columns run east: easting increases along a row
    let next = grid.point_at(0, 1);
    assert!(next.map.x > point.map.x);
}

#[test]
fn test_degenerate_extent_is_configuration_error() {
    let coordinates = skewed_coordinates();
    let mut metadata = scene(GeoPoint::new(41.6, -112.6), GeoPoint::new(39.8, -110.4), 2000.0);
    metadata.lr_geo_corner = GeoPoint::new(41.6, -110.4);

    let err = ReanalysisGrid::build(&coordinates, &metadata, &GridConfig::default()).unwrap_err();
    assert!(err.is_configuration(), "{}", err);
}

#[test]
fn test_scene_outside_reanalysis_domain_is_configuration_error() {
    let coordinates = skewed_coordinates();
    let mut metadata = scene(GeoPoint::new(41.6, -112.6), GeoPoint::new(39.8, -110.4), 2000.0);
    metadata.ul_geo_corner = GeoPoint::new(-30.0, 20.0);
    metadata.lr_geo_corner = GeoPoint::new(-31.0, 21.0);

    match ReanalysisGrid::build(&coordinates, &metadata, &GridConfig::default()) {
        Err(LstError::Config(message)) => assert!(message.contains("No reanalysis grid points")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("grid built for a scene outside the reanalysis domain"),
    }
}

/// Count pixels of the scene that fall outside every cell with four used corners
fn pixels_outside_grid(grid: &ReanalysisGrid, metadata: &SceneMetadata) -> usize {
    let bands = ElevationBands::for_scene(0.5, 0.1);
    let mut table = PointParameterTable::new(grid.num_points(), bands.len());
    for point in grid.used_points() {
        for band in 0..bands.len() {
            table.insert(point.index, band, AtmosphericParameters::new(0.8, 2.0, 3.0)).unwrap();
        }
    }
    let interpolator = PixelInterpolator::new(grid, &bands, &table, 10.9).unwrap();

    let mut outside = 0;
    for line in 0..metadata.lines {
        let mut hint = interpolator.locator().center_cell();
        for sample in 0..metadata.samples {
            let map = metadata.pixel_map_coordinates(line, sample);
            let pixel = interpolator.interpolate_parameters(map, 0.2, &mut hint);
            if pixel.quality & quality::OUTSIDE_GRID != 0 {
                outside += 1;
            }
        }
    }
    outside
}

#[test]
fn test_coarse_high_latitude_grid_brackets_scene() {
    let _ = env_logger::builder().is_test(true).try_init();

    // One degree of longitude between columns, wider than the point tolerance
    let latitude = Array2::from_shape_fn((5, 4), |(r, _)| 69.45 + 0.3 * r as f64);
    let longitude = Array2::from_shape_fn((5, 4), |(_, c)| -151.05 + 1.0 * c as f64);
    let coordinates = ReanalysisCoordinates::new(latitude, longitude).unwrap();
    let metadata = scene_in_zone(GeoPoint::new(70.1, -150.1), GeoPoint::new(69.9, -149.9), 250.0, 6);
    assert!(metadata.lines > 0 && metadata.samples > 0);

    let grid = ReanalysisGrid::build(&coordinates, &metadata, &GridConfig::default()).unwrap();
    assert_eq!((grid.min_row, grid.max_row, grid.min_col, grid.max_col), (0, 3, 0, 2));

    // Both neighbouring columns bracket the scene, so every node is needed
    assert_eq!(grid.used_points().count(), grid.num_points());
    assert_eq!(pixels_outside_grid(&grid, &metadata), 0);
}

#[test]
fn test_unused_points_are_flagged() {
    // Grid rotated by 45 degrees: the selected nodes lie on a diagonal, so the
    // far corners of the expanded block touch no cell near the scene
    let latitude = Array2::from_shape_fn((8, 8), |(r, c)| 40.0 + 0.3 * (r + c) as f64);
    let longitude = Array2::from_shape_fn((8, 8), |(r, c)| -112.0 + 0.3 * (c as f64 - r as f64));
    let coordinates = ReanalysisCoordinates::new(latitude, longitude).unwrap();
    let metadata = scene(GeoPoint::new(41.85, -112.55), GeoPoint::new(41.75, -111.45), 2000.0);
    let config = GridConfig {
        point_tolerance_degrees: 0.0,
        ..GridConfig::default()
    };
    let grid = ReanalysisGrid::build(&coordinates, &metadata, &config).unwrap();
    assert_eq!((grid.min_row, grid.max_row, grid.min_col, grid.max_col), (1, 5, 1, 5));

    assert!(!grid.point_at(0, 0).use_point);
    assert!(!grid.point_at(4, 4).use_point);
    for (row, col) in [(4, 2), (3, 3), (2, 4)] {
        let point = grid.point_at(row - grid.min_row, col - grid.min_col);
        assert!(grid.region.contains(&point.location));
        assert!(point.use_point);
    }
    assert!(grid.used_points().count() < grid.num_points());

    assert_eq!(pixels_outside_grid(&grid, &metadata), 0);
}
