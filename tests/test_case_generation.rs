use chrono::TimeZone;
use ndarray::Array2;
use scene_lst::core::{CaseGenerator, ElevationBands, GridPoint, ReanalysisCoordinates, ReanalysisGrid, SurfaceVariant};
use scene_lst::io::{AtmosphericProfile, ProfileLayer, ProfileSource};
use scene_lst::{GeoPoint, GridConfig, LstError, LstResult, MapPoint, Satellite, SceneMetadata, ThermalCalibration};
use std::path::Path;

struct StaticProfiles;

impl ProfileSource for StaticProfiles {
    fn profile(&self, point: &GridPoint) -> LstResult<AtmosphericProfile> {
        // Slightly warmer to the east so that cases differ between points
        let offset = point.col as f64 * 0.5;
        AtmosphericProfile::new(vec![
            ProfileLayer { height_km: 0.1, pressure_hpa: 1000.0, temperature_k: 292.0 + offset, relative_humidity: 45.0 },
            ProfileLayer { height_km: 1.5, pressure_hpa: 850.0, temperature_k: 283.0 + offset, relative_humidity: 40.0 },
            ProfileLayer { height_km: 5.6, pressure_hpa: 500.0, temperature_k: 257.0 + offset, relative_humidity: 25.0 },
            ProfileLayer { height_km: 11.8, pressure_hpa: 200.0, temperature_k: 218.0, relative_humidity: 5.0 },
        ])
    }
}

struct MissingProfiles;

impl ProfileSource for MissingProfiles {
    fn profile(&self, point: &GridPoint) -> LstResult<AtmosphericProfile> {
        Err(LstError::ProfileUnavailable {
            row: point.row,
            col: point.col,
            reason: "no reanalysis file".to_string(),
        })
    }
}

fn metadata() -> SceneMetadata {
    SceneMetadata {
        scene_id: "LE07_TEST".to_string(),
        satellite: Satellite::Landsat7,
        instrument: "ETM".to_string(),
        acquisition_time: chrono::Utc.with_ymd_and_hms(2002, 7, 14, 17, 49, 0).unwrap(),
        sun_zenith: 27.5,
        sun_azimuth: 128.3,
        ul_geo_corner: GeoPoint::new(40.9, -111.4),
        lr_geo_corner: GeoPoint::new(40.6, -111.1),
        ul_map_corner: MapPoint { x: 420_000.0, y: 4_520_000.0 },
        pixel_size: 30.0,
        utm_zone: 12,
        lines: 1,
        samples: 1,
        thermal: ThermalCalibration { gain: 0.067, bias: -0.067, fill_value: 0, saturate_value: Some(255) },
    }
}

/// 4 x 4 nodes every 0.5 degrees from (40, -112)
fn regular_coordinates() -> ReanalysisCoordinates {
    let latitude = Array2::from_shape_fn((4, 4), |(r, _)| 40.0 + 0.5 * r as f64);
    let longitude = Array2::from_shape_fn((4, 4), |(_, c)| -112.0 + 0.5 * c as f64);
    ReanalysisCoordinates::new(latitude, longitude).unwrap()
}

fn grid() -> ReanalysisGrid {
    ReanalysisGrid::build(&regular_coordinates(), &metadata(), &GridConfig::default()).unwrap()
}

fn read_tree(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let relative = path.strip_prefix(dir).unwrap().display().to_string();
                files.push((relative, std::fs::read(&path).unwrap()));
            }
        }
    }
    files.sort();
    files
}

#[test]
fn test_generates_three_runs_per_case() {
    let _ = env_logger::builder().is_test(true).try_init();

    let work = tempfile::tempdir().unwrap();
    let grid = grid();
    let bands = ElevationBands::new(vec![0.0, 0.6, 1.1]).unwrap();

    let cases = CaseGenerator::new(work.path(), "mod5")
        .generate(&grid, &bands, &StaticProfiles)
        .unwrap();

    println!("{} points, {} cases", grid.num_points(), cases.cases.len());
    assert_eq!(grid.num_points(), 16);
    assert_eq!(cases.cases.len(), 16 * 3);
    assert_eq!(cases.num_modtran_runs, 16 * 3);
    assert!(cases.num_modtran_runs <= cases.num_points * cases.num_bands);
    assert_eq!(cases.commands().len(), cases.num_modtran_runs * 3);

    let first = &cases.cases[0];
    assert_eq!(first.id, "40.000_-112.000/0.000");
    assert_eq!((first.point_index, first.band_index), (0, 0));
    for variant in SurfaceVariant::ALL {
        let run = first.run(variant).unwrap();
        assert!(run.directory.join("tape5").is_file(), "{}", run.directory.display());
        assert_eq!(run.command.working_dir, run.directory);
        assert!(run.extract.is_none());
    }

    // Cases follow the row-major point order, bands innermost
    let order: Vec<(usize, usize)> = cases.cases.iter().map(|c| (c.point_index, c.band_index)).collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
}

#[test]
fn test_regeneration_is_byte_identical() {
    let work = tempfile::tempdir().unwrap();
    let grid = grid();
    let bands = ElevationBands::for_scene(1.2, 0.1);
    let generator = CaseGenerator::new(work.path(), "mod5").with_extract_command("lst_extract_tape6_results.py");

    let first = generator.generate(&grid, &bands, &StaticProfiles).unwrap();
    first.write_lists(work.path()).unwrap();
    let first_tree = read_tree(work.path());

    let second = generator.generate(&grid, &bands, &StaticProfiles).unwrap();
    second.write_lists(work.path()).unwrap();
    let second_tree = read_tree(work.path());

    assert_eq!(first_tree, second_tree);
    assert_eq!(first.commands(), second.commands());

    let command_list = std::fs::read_to_string(work.path().join("commandList")).unwrap();
    assert_eq!(command_list.lines().count(), first.num_modtran_runs * 3);
    let case_list = std::fs::read_to_string(work.path().join("caseList")).unwrap();
    assert_eq!(case_list.lines().count(), first.num_modtran_runs);
}

#[test]
fn test_duplicate_locations_are_generated_once() {
    // Two node rows share the same coordinates
    let latitude = Array2::from_shape_fn((2, 2), |_| 40.0);
    let longitude = Array2::from_shape_fn((2, 2), |(_, c)| -112.0 + 0.5 * c as f64);
    let coordinates = ReanalysisCoordinates::new(latitude, longitude).unwrap();

    let mut scene = metadata();
    scene.ul_geo_corner = GeoPoint::new(40.1, -112.1);
    scene.lr_geo_corner = GeoPoint::new(39.9, -111.9);
    let grid = ReanalysisGrid::build(&coordinates, &scene, &GridConfig::default()).unwrap();
    let bands = ElevationBands::new(vec![0.0, 0.6]).unwrap();

    let work = tempfile::tempdir().unwrap();
    let cases = CaseGenerator::new(work.path(), "mod5")
        .generate(&grid, &bands, &StaticProfiles)
        .unwrap();

    assert_eq!(cases.cases.len(), 8);
    assert_eq!(cases.num_modtran_runs, 4);

    let skipped: Vec<_> = cases.cases.iter().filter(|c| !c.run_modtran).collect();
    assert_eq!(skipped.len(), 4);
    for case in skipped {
        let original = &cases.cases[case.duplicate_of.unwrap()];
        assert_eq!(original.id, case.id);
        assert!(original.run_modtran);
        assert_ne!(original.point_index, case.point_index);
    }
}

#[test]
fn test_missing_profile_is_fatal() {
    let work = tempfile::tempdir().unwrap();
    let err = CaseGenerator::new(work.path(), "mod5")
        .generate(&grid(), &ElevationBands::standard(), &MissingProfiles)
        .unwrap_err();

    match err {
        LstError::ProfileUnavailable { row, col, .. } => assert_eq!((row, col), (0, 0)),
        other => panic!("unexpected error: {}", other),
    }
}
