//! Per-pixel interpolation of atmospheric parameters and temperature inversion
//!
//! Grid nodes are located in the scene's UTM plane. A pixel is placed in the
//! enclosing quadrilateral cell by inverting the bilinear map of the cell's
//! four corners, then blended vertically between the two bracketing
//! elevation bands.

use crate::core::grid::{ElevationBands, ReanalysisGrid};
use crate::core::parameters::PointParameterTable;
use crate::core::planck::brightness_temperature;
use crate::types::{
    AtmosphericParameters, LstError, LstImage, LstResult, MapPoint, QualityImage, SceneMetadata,
    SceneRasters, LST_FILL_VALUE,
};
use ndarray::Array2;
use std::collections::BTreeSet;

/// Output quality bits
pub mod quality {
    pub const VALID: u8 = 0;
    /// Input pixel masked
    pub const FILL: u8 = 1;
    /// Horizontal position clamped to the nearest grid cell
    pub const OUTSIDE_GRID: u8 = 2;
    /// Elevation outside the band range
    pub const ELEVATION_CLAMPED: u8 = 4;
    /// Radiative transfer inversion failed
    pub const NUMERICAL_FAILURE: u8 = 8;
}

/// Smallest transmission accepted by the inversion
pub const MIN_TRANSMISSION: f64 = 1e-3;

/// Tolerance on cell coordinates when testing enclosure
const CELL_TOLERANCE: f64 = 1e-9;
const MAX_NEWTON_ITERATIONS: usize = 30;

/// Recoverable per-pixel failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFailure {
    LowTransmission,
    NonPositiveEmissivity,
    /// Surface radiance (the Planck inversion argument) is not positive
    NonPositiveRadiance,
}

impl PixelFailure {
    pub fn quality_flag(&self) -> u8 {
        quality::NUMERICAL_FAILURE
    }
}

/// Position of a point inside a grid cell.
///
/// Cell (row, col) spans block nodes (row..=row+1, col..=col+1); `u` runs
/// along columns and `v` along rows, both in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellPosition {
    pub row: usize,
    pub col: usize,
    pub u: f64,
    pub v: f64,
    /// False when the position was clamped onto the cell
    pub inside: bool,
}

fn snap_unit(value: f64) -> f64 {
    let clamped = value.clamp(0.0, 1.0);
    if clamped < CELL_TOLERANCE {
        0.0
    } else if clamped > 1.0 - CELL_TOLERANCE {
        1.0
    } else {
        clamped
    }
}

fn in_unit(value: f64) -> bool {
    value >= -CELL_TOLERANCE && value <= 1.0 + CELL_TOLERANCE
}

/// Solve P(u, v) = target for the bilinear map of corners
/// `[p00, p01, p10, p11]` by Newton iteration
fn inverse_bilinear(corners: &[MapPoint; 4], target: MapPoint) -> Option<(f64, f64)> {
    let [p00, p01, p10, p11] = *corners;
    let (mut u, mut v) = (0.5, 0.5);

    for _ in 0..MAX_NEWTON_ITERATIONS {
        let x = (1.0 - u) * (1.0 - v) * p00.x + u * (1.0 - v) * p01.x + (1.0 - u) * v * p10.x + u * v * p11.x;
        let y = (1.0 - u) * (1.0 - v) * p00.y + u * (1.0 - v) * p01.y + (1.0 - u) * v * p10.y + u * v * p11.y;
        let (fx, fy) = (x - target.x, y - target.y);

        let dxdu = (1.0 - v) * (p01.x - p00.x) + v * (p11.x - p10.x);
        let dydu = (1.0 - v) * (p01.y - p00.y) + v * (p11.y - p10.y);
        let dxdv = (1.0 - u) * (p10.x - p00.x) + u * (p11.x - p01.x);
        let dydv = (1.0 - u) * (p10.y - p00.y) + u * (p11.y - p01.y);

        let det = dxdu * dydv - dxdv * dydu;
        if det == 0.0 || !det.is_finite() {
            return None;
        }

        let du = (fx * dydv - dxdv * fy) / det;
        let dv = (dxdu * fy - dydu * fx) / det;
        u -= du;
        v -= dv;

        if du.abs() + dv.abs() < 1e-13 {
            break;
        }
    }

    (u.is_finite() && v.is_finite()).then_some((u, v))
}

/// Finds the grid cell enclosing a map position
#[derive(Debug)]
pub struct GridLocator<'a> {
    grid: &'a ReanalysisGrid,
    cell_rows: usize,
    cell_cols: usize,
    /// Cells whose four corners are all used points
    valid: Array2<bool>,
}

impl<'a> GridLocator<'a> {
    pub fn new(grid: &'a ReanalysisGrid) -> LstResult<Self> {
        if grid.num_rows < 2 || grid.num_cols < 2 {
            return Err(LstError::Processing(format!(
                "Grid of {} x {} points has no interpolation cell",
                grid.num_rows, grid.num_cols
            )));
        }

        let (cell_rows, cell_cols) = (grid.num_rows - 1, grid.num_cols - 1);
        let valid = Array2::from_shape_fn((cell_rows, cell_cols), |(r, c)| {
            grid.point_at(r, c).use_point
                && grid.point_at(r, c + 1).use_point
                && grid.point_at(r + 1, c).use_point
                && grid.point_at(r + 1, c + 1).use_point
        });

        if !valid.iter().any(|&v| v) {
            return Err(LstError::Processing(
                "No grid cell has four used corner points".to_string(),
            ));
        }

        Ok(Self {
            grid,
            cell_rows,
            cell_cols,
            valid,
        })
    }

    /// Cell at the middle of the block, a starting hint for a new row
    pub fn center_cell(&self) -> (usize, usize) {
        (self.cell_rows / 2, self.cell_cols / 2)
    }

    /// Point indices of the corners of every valid cell
    pub fn referenced_points(&self) -> BTreeSet<usize> {
        let mut points = BTreeSet::new();
        for ((r, c), &valid) in self.valid.indexed_iter() {
            if valid {
                points.extend(self.corner_indices(r, c));
            }
        }
        points
    }

    /// `[p00, p01, p10, p11]` point indices of a cell
    pub fn corner_indices(&self, row: usize, col: usize) -> [usize; 4] {
        [
            self.grid.index_of(row, col),
            self.grid.index_of(row, col + 1),
            self.grid.index_of(row + 1, col),
            self.grid.index_of(row + 1, col + 1),
        ]
    }

    fn corners(&self, row: usize, col: usize) -> [MapPoint; 4] {
        self.corner_indices(row, col).map(|i| self.grid.points()[i].map)
    }

    /// Walk from the `hint` cell towards the cell enclosing `target`
    pub fn locate(&self, target: MapPoint, hint: (usize, usize)) -> CellPosition {
        let mut row = hint.0.min(self.cell_rows - 1);
        let mut col = hint.1.min(self.cell_cols - 1);

        for _ in 0..(self.cell_rows + self.cell_cols + 2) {
            let (u, v) = match inverse_bilinear(&self.corners(row, col), target) {
                Some(uv) => uv,
                None => break,
            };

            let mut moved = false;
            if u < -CELL_TOLERANCE && col > 0 {
                col -= 1;
                moved = true;
            } else if u > 1.0 + CELL_TOLERANCE && col + 1 < self.cell_cols {
                col += 1;
                moved = true;
            }
            if v < -CELL_TOLERANCE && row > 0 {
                row -= 1;
                moved = true;
            } else if v > 1.0 + CELL_TOLERANCE && row + 1 < self.cell_rows {
                row += 1;
                moved = true;
            }

            if !moved {
                if !self.valid[[row, col]] {
                    break;
                }
                return CellPosition {
                    row,
                    col,
                    u: snap_unit(u),
                    v: snap_unit(v),
                    inside: in_unit(u) && in_unit(v),
                };
            }
        }

        self.nearest_valid(target)
    }

    /// Clamp onto the valid cell whose centre is closest to `target`
    fn nearest_valid(&self, target: MapPoint) -> CellPosition {
        let mut best = (0, 0);
        let mut best_distance = f64::INFINITY;

        for ((r, c), &valid) in self.valid.indexed_iter() {
            if !valid {
                continue;
            }
            let corners = self.corners(r, c);
            let cx = corners.iter().map(|p| p.x).sum::<f64>() / 4.0;
            let cy = corners.iter().map(|p| p.y).sum::<f64>() / 4.0;
            let distance = (cx - target.x).hypot(cy - target.y);
            if distance < best_distance {
                best_distance = distance;
                best = (r, c);
            }
        }

        let (u, v) = inverse_bilinear(&self.corners(best.0, best.1), target).unwrap_or((0.5, 0.5));
        CellPosition {
            row: best.0,
            col: best.1,
            u: snap_unit(u),
            v: snap_unit(v),
            inside: in_unit(u) && in_unit(v),
        }
    }
}

/// Interpolated parameters of one pixel and the quality bits they carry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelParameters {
    pub params: AtmosphericParameters,
    pub quality: u8,
}

/// Temperature raster with its quality mask
#[derive(Debug, Clone)]
pub struct LstProduct {
    pub temperature: LstImage,
    pub quality: QualityImage,
}

impl LstProduct {
    /// Pixels with `flag` set
    pub fn count_flag(&self, flag: u8) -> usize {
        self.quality.iter().filter(|&&q| q & flag != 0).count()
    }

    pub fn valid_pixels(&self) -> usize {
        self.quality.iter().filter(|&&q| q == quality::VALID).count()
    }
}

/// Converts observed radiance to surface temperature pixel by pixel
pub struct PixelInterpolator<'a> {
    grid: &'a ReanalysisGrid,
    bands: &'a ElevationBands,
    locator: GridLocator<'a>,
    /// Parameters by (point, band); cells no valid grid cell references hold zeros
    values: Array2<AtmosphericParameters>,
    /// Effective band centre wavelength (um)
    wavelength: f64,
}

impl<'a> PixelInterpolator<'a> {
    /// Every cell a pixel can reference must be populated; a hole is fatal.
    pub fn new(
        grid: &'a ReanalysisGrid,
        bands: &'a ElevationBands,
        table: &PointParameterTable,
        wavelength: f64,
    ) -> LstResult<Self> {
        if table.num_points() != grid.num_points() || table.num_bands() != bands.len() {
            return Err(LstError::Processing(format!(
                "Parameter table is {} x {}, grid needs {} points x {} bands",
                table.num_points(),
                table.num_bands(),
                grid.num_points(),
                bands.len()
            )));
        }
        if !(wavelength > 0.0) {
            return Err(LstError::Processing(format!("Invalid effective wavelength {}", wavelength)));
        }

        let locator = GridLocator::new(grid)?;
        table.check_points(locator.referenced_points())?;
        let values = Array2::from_shape_fn((grid.num_points(), bands.len()), |(point, band)| {
            table.get(point, band).unwrap_or(AtmosphericParameters::ZERO)
        });

        Ok(Self {
            grid,
            bands,
            locator,
            values,
            wavelength,
        })
    }

    pub fn locator(&self) -> &GridLocator<'a> {
        &self.locator
    }

    fn horizontal(&self, position: &CellPosition, band: usize) -> AtmosphericParameters {
        let [i00, i01, i10, i11] = self.locator.corner_indices(position.row, position.col);
        let (u, v) = (position.u, position.v);

        AtmosphericParameters::ZERO
            .add_weighted(&self.values[[i00, band]], (1.0 - u) * (1.0 - v))
            .add_weighted(&self.values[[i01, band]], u * (1.0 - v))
            .add_weighted(&self.values[[i10, band]], (1.0 - u) * v)
            .add_weighted(&self.values[[i11, band]], u * v)
    }

    /// Parameters at a map position and elevation (km).
    ///
    /// `hint` carries the cell of the previous pixel and is updated.
    pub fn interpolate_parameters(
        &self,
        map: MapPoint,
        elevation_km: f64,
        hint: &mut (usize, usize),
    ) -> PixelParameters {
        let position = self.locator.locate(map, *hint);
        *hint = (position.row, position.col);

        let bracket = self.bands.bracket(elevation_km);
        let lower = self.horizontal(&position, bracket.lower);
        let params = if bracket.upper == bracket.lower {
            lower
        } else {
            lower.lerp(&self.horizontal(&position, bracket.upper), bracket.weight)
        };

        let mut flags = quality::VALID;
        if !position.inside {
            flags |= quality::OUTSIDE_GRID;
        }
        if bracket.clamped {
            flags |= quality::ELEVATION_CLAMPED;
        }

        PixelParameters { params, quality: flags }
    }

    /// Invert the single-channel radiative transfer equation:
    ///
    /// `L = tau * (e * B(Ts) + (1 - e) * Ld) + Lu`
    pub fn pixel_temperature(
        &self,
        radiance: f64,
        emissivity: f64,
        params: &AtmosphericParameters,
    ) -> Result<f64, PixelFailure> {
        if !(params.transmission >= MIN_TRANSMISSION) {
            return Err(PixelFailure::LowTransmission);
        }
        if !(emissivity > 0.0) {
            return Err(PixelFailure::NonPositiveEmissivity);
        }

        let surface = ((radiance - params.upwelled_radiance) / params.transmission
            - (1.0 - emissivity) * params.downwelled_radiance)
            / emissivity;
        if !(surface > 0.0) {
            return Err(PixelFailure::NonPositiveRadiance);
        }

        brightness_temperature(self.wavelength, surface).ok_or(PixelFailure::NonPositiveRadiance)
    }

    fn process_row(&self, metadata: &SceneMetadata, rasters: &SceneRasters, line: usize) -> (Vec<f32>, Vec<u8>) {
        let samples = rasters.radiance.ncols();
        let mut temperature = Vec::with_capacity(samples);
        let mut flags = Vec::with_capacity(samples);
        let mut hint = self.locator.center_cell();

        for sample in 0..samples {
            if !rasters.valid[[line, sample]] {
                temperature.push(LST_FILL_VALUE);
                flags.push(quality::FILL);
                continue;
            }

            let map = metadata.pixel_map_coordinates(line, sample);
            let elevation_km = rasters.elevation[[line, sample]] as f64 / 1000.0;
            let pixel = self.interpolate_parameters(map, elevation_km, &mut hint);

            match self.pixel_temperature(
                rasters.radiance[[line, sample]] as f64,
                rasters.emissivity[[line, sample]] as f64,
                &pixel.params,
            ) {
                Ok(t) => {
                    temperature.push(t as f32);
                    flags.push(pixel.quality);
                }
                Err(failure) => {
                    temperature.push(LST_FILL_VALUE);
                    flags.push(pixel.quality | failure.quality_flag());
                }
            }
        }

        (temperature, flags)
    }

    #[cfg(feature = "parallel")]
    fn process_rows(&self, metadata: &SceneMetadata, rasters: &SceneRasters) -> Vec<(Vec<f32>, Vec<u8>)> {
        use rayon::prelude::*;
        (0..rasters.radiance.nrows())
            .into_par_iter()
            .map(|line| self.process_row(metadata, rasters, line))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn process_rows(&self, metadata: &SceneMetadata, rasters: &SceneRasters) -> Vec<(Vec<f32>, Vec<u8>)> {
        (0..rasters.radiance.nrows())
            .map(|line| self.process_row(metadata, rasters, line))
            .collect()
    }

    /// Surface temperature (K) for every pixel of the scene
    pub fn generate_lst(&self, metadata: &SceneMetadata, rasters: &SceneRasters) -> LstResult<LstProduct> {
        rasters.check_dimensions()?;
        let (lines, samples) = rasters.dim();
        if (lines, samples) != (metadata.lines, metadata.samples) {
            return Err(LstError::Processing(format!(
                "Rasters are {} x {}, metadata describes {} x {}",
                lines, samples, metadata.lines, metadata.samples
            )));
        }

        log::info!(
            "Interpolating atmospheric parameters for {} x {} pixels over {} grid points",
            lines,
            samples,
            self.grid.num_points()
        );

        let rows = self.process_rows(metadata, rasters);

        let mut temperature = Array2::from_elem((lines, samples), LST_FILL_VALUE);
        let mut quality_mask = Array2::zeros((lines, samples));
        for (line, (values, flags)) in rows.into_iter().enumerate() {
            for (sample, (t, q)) in values.into_iter().zip(flags).enumerate() {
                temperature[[line, sample]] = t;
                quality_mask[[line, sample]] = q;
            }
        }

        let product = LstProduct {
            temperature,
            quality: quality_mask,
        };

        log::info!(
            "✅ LST generated: {} valid, {} fill, {} outside grid, {} elevation clamped, {} numerical failures",
            product.valid_pixels(),
            product.count_flag(quality::FILL),
            product.count_flag(quality::OUTSIDE_GRID),
            product.count_flag(quality::ELEVATION_CLAMPED),
            product.count_flag(quality::NUMERICAL_FAILURE)
        );

        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::core::grid::ReanalysisCoordinates;
    use crate::core::planck::blackbody_radiance;
    use crate::core::utm::geographic_to_utm;
    use crate::types::{GeoPoint, Satellite, ThermalCalibration};
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use ndarray::array;

    const ZONE: i32 = 12;
    const WAVELENGTH: f64 = 11.0;

    fn scene(ul_map: MapPoint, lines: usize, samples: usize) -> SceneMetadata {
        SceneMetadata {
            scene_id: "test".to_string(),
            satellite: Satellite::Landsat7,
            instrument: "ETM".to_string(),
            acquisition_time: chrono::Utc.with_ymd_and_hms(2002, 7, 14, 17, 49, 0).unwrap(),
            sun_zenith: 30.0,
            sun_azimuth: 130.0,
            ul_geo_corner: GeoPoint::new(40.1, -112.1),
            lr_geo_corner: GeoPoint::new(39.9, -111.9),
            ul_map_corner: ul_map,
            pixel_size: 30.0,
            utm_zone: ZONE,
            lines,
            samples,
            thermal: ThermalCalibration {
                gain: 1.0,
                bias: 0.0,
                fill_value: 0,
                saturate_value: None,
            },
        }
    }

    /// 2 x 2 block: (40, -112), (40, -111.5), (40.5, -112), (40.5, -111.5)
    fn grid() -> ReanalysisGrid {
        let coords = ReanalysisCoordinates::new(
            array![[40.0, 40.0], [40.5, 40.5]],
            array![[-112.0, -111.5], [-112.0, -111.5]],
        )
        .unwrap();
        let metadata = scene(MapPoint { x: 0.0, y: 0.0 }, 1, 1);
        ReanalysisGrid::build(&coords, &metadata, &GridConfig::default()).unwrap()
    }

    fn bands() -> ElevationBands {
        ElevationBands::new(vec![0.0, 0.6]).unwrap()
    }

    fn table_from(f: impl Fn(usize, usize) -> AtmosphericParameters) -> PointParameterTable {
        let mut table = PointParameterTable::new(4, 2);
        for point in 0..4 {
            for band in 0..2 {
                table.insert(point, band, f(point, band)).unwrap();
            }
        }
        table
    }

    fn map_of(latitude: f64, longitude: f64) -> MapPoint {
        geographic_to_utm(GeoPoint::new(latitude, longitude), ZONE)
    }

    #[test]
    fn test_grid_is_two_by_two() {
        let grid = grid();
        assert_eq!((grid.num_rows, grid.num_cols), (2, 2));
        assert!(grid.points().iter().all(|p| p.use_point));
    }

    #[test]
    fn test_node_parameters_are_reproduced() {
        let grid = grid();
        let bands = bands();
        let table = table_from(|p, b| AtmosphericParameters::new(0.5 + 0.1 * p as f64, 1.0 + p as f64, 2.0 + b as f64));
        let interpolator = PixelInterpolator::new(&grid, &bands, &table, WAVELENGTH).unwrap();

        for point in grid.points() {
            let mut hint = (0, 0);
            let pixel = interpolator.interpolate_parameters(point.map, 0.6, &mut hint);
            let expected = table.get(point.index, 1).unwrap();
            assert_relative_eq!(pixel.params.transmission, expected.transmission, epsilon = 1e-9);
            assert_relative_eq!(pixel.params.upwelled_radiance, expected.upwelled_radiance, epsilon = 1e-9);
            assert_relative_eq!(pixel.params.downwelled_radiance, expected.downwelled_radiance, epsilon = 1e-9);
            assert_eq!(pixel.quality, quality::VALID);
        }
    }

    #[test]
    fn test_band_boundary_returns_band_unchanged() {
        let grid = grid();
        let bands = bands();
        let table = table_from(|_, b| {
            if b == 0 {
                AtmosphericParameters::new(0.7, 1.5, 2.5)
            } else {
                AtmosphericParameters::new(0.9, 0.5, 1.0)
            }
        });
        let interpolator = PixelInterpolator::new(&grid, &bands, &table, WAVELENGTH).unwrap();

        let mut hint = (0, 0);
        let pixel = interpolator.interpolate_parameters(map_of(40.2, -111.8), 0.6, &mut hint);
        assert_relative_eq!(pixel.params.transmission, 0.9, epsilon = 1e-12);
        assert_relative_eq!(pixel.params.upwelled_radiance, 0.5, epsilon = 1e-12);

        let halfway = interpolator.interpolate_parameters(map_of(40.2, -111.8), 0.3, &mut hint);
        assert_relative_eq!(halfway.params.transmission, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_parameters_are_position_independent() {
        let grid = grid();
        let bands = bands();
        let uniform = AtmosphericParameters::new(0.8, 2.0, 3.0);
        let table = table_from(|_, _| uniform);
        let interpolator = PixelInterpolator::new(&grid, &bands, &table, WAVELENGTH).unwrap();

        for &(lat, lon, elevation) in &[(40.01, -111.99, 0.0), (40.25, -111.75, 0.3), (40.49, -111.51, 0.55)] {
            let mut hint = (0, 0);
            let pixel = interpolator.interpolate_parameters(map_of(lat, lon), elevation, &mut hint);
            assert_relative_eq!(pixel.params.transmission, 0.8, epsilon = 1e-12);
            assert_relative_eq!(pixel.params.upwelled_radiance, 2.0, epsilon = 1e-12);
            assert_relative_eq!(pixel.params.downwelled_radiance, 3.0, epsilon = 1e-12);
            assert_eq!(pixel.quality, quality::VALID);
        }
    }

    #[test]
    fn test_outside_pixels_are_clamped_and_flagged() {
        let grid = grid();
        let bands = bands();
        let table = table_from(|_, _| AtmosphericParameters::new(0.8, 2.0, 3.0));
        let interpolator = PixelInterpolator::new(&grid, &bands, &table, WAVELENGTH).unwrap();

        let mut hint = (0, 0);
        let pixel = interpolator.interpolate_parameters(map_of(41.5, -110.0), 2.0, &mut hint);
        assert_eq!(pixel.quality, quality::OUTSIDE_GRID | quality::ELEVATION_CLAMPED);
        assert_relative_eq!(pixel.params.transmission, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_no_atmosphere_inverts_to_brightness_temperature() {
        let grid = grid();
        let bands = bands();
        let table = table_from(|_, _| AtmosphericParameters::new(1.0, 0.0, 0.0));
        let interpolator = PixelInterpolator::new(&grid, &bands, &table, WAVELENGTH).unwrap();

        let radiance = blackbody_radiance(WAVELENGTH, 295.0);
        let params = AtmosphericParameters::new(1.0, 0.0, 4.0);
        let t = interpolator.pixel_temperature(radiance, 1.0, &params).unwrap();
        assert_relative_eq!(t, brightness_temperature(WAVELENGTH, radiance).unwrap(), epsilon = 1e-9);
        assert_relative_eq!(t, 295.0, epsilon = 1e-6);
    }

    #[test]
    fn test_inversion_failures() {
        let grid = grid();
        let bands = bands();
        let table = table_from(|_, _| AtmosphericParameters::new(0.8, 2.0, 3.0));
        let interpolator = PixelInterpolator::new(&grid, &bands, &table, WAVELENGTH).unwrap();
        let params = AtmosphericParameters::new(0.8, 2.0, 3.0);

        assert_eq!(
            interpolator.pixel_temperature(1.0, 0.98, &params),
            Err(PixelFailure::NonPositiveRadiance)
        );
        assert_eq!(
            interpolator.pixel_temperature(8.0, 0.0, &params),
            Err(PixelFailure::NonPositiveEmissivity)
        );
        assert_eq!(
            interpolator.pixel_temperature(8.0, 0.98, &AtmosphericParameters::new(1e-4, 2.0, 3.0)),
            Err(PixelFailure::LowTransmission)
        );
    }

    #[test]
    fn test_failed_pixel_does_not_abort_raster() {
        let grid = grid();
        let bands = bands();
        let table = table_from(|_, _| AtmosphericParameters::new(0.8, 2.0, 3.0));
        let interpolator = PixelInterpolator::new(&grid, &bands, &table, WAVELENGTH).unwrap();

        let metadata = scene(map_of(40.3, -111.8), 2, 2);
        let rasters = SceneRasters {
            radiance: array![[8.0f32, 0.5], [8.0, 8.0]],
            elevation: array![[100.0f32, 100.0], [100.0, 100.0]],
            emissivity: array![[0.98f32, 0.98], [0.98, 0.98]],
            valid: array![[true, true], [false, true]],
        };

        let product = interpolator.generate_lst(&metadata, &rasters).unwrap();
        assert_eq!(product.quality[[0, 1]], quality::NUMERICAL_FAILURE);
        assert_eq!(product.temperature[[0, 1]], LST_FILL_VALUE);
        assert_eq!(product.quality[[1, 0]], quality::FILL);
        assert_eq!(product.quality[[0, 0]], quality::VALID);
        assert!(product.temperature[[0, 0]] > 250.0 && product.temperature[[0, 0]] < 350.0);
        assert_eq!(product.valid_pixels(), 2);
    }

    #[test]
    fn test_missing_referenced_cell_is_fatal() {
        let grid = grid();
        let bands = bands();
        let mut table = PointParameterTable::new(4, 2);
        for point in 0..4 {
            table.insert(point, 0, AtmosphericParameters::new(0.8, 2.0, 3.0)).unwrap();
        }

        match PixelInterpolator::new(&grid, &bands, &table, WAVELENGTH) {
            Err(LstError::MissingParameters { band, .. }) => assert_eq!(band, 1),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("interpolator accepted an incomplete table"),
        }
    }
}
