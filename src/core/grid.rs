//! Reanalysis sample points and elevation bands covering a scene

use crate::config::GridConfig;
use crate::core::utm::geographic_to_utm;
use crate::types::{BoundingBox, GeoPoint, LstError, LstResult, MapPoint, SceneMetadata};
use ndarray::Array2;

/// Reference heights (km) at which profiles are simulated
pub const STANDARD_ELEVATIONS_KM: [f64; 9] = [0.0, 0.6, 1.1, 1.6, 2.1, 2.6, 3.1, 3.6, 4.05];

/// Node coordinates of the full reanalysis grid
#[derive(Debug, Clone)]
pub struct ReanalysisCoordinates {
    latitude: Array2<f64>,
    longitude: Array2<f64>,
}

impl ReanalysisCoordinates {
    pub fn new(latitude: Array2<f64>, longitude: Array2<f64>) -> LstResult<Self> {
        if latitude.dim() != longitude.dim() {
            return Err(LstError::Config(format!(
                "Latitude grid {:?} and longitude grid {:?} differ in shape",
                latitude.dim(),
                longitude.dim()
            )));
        }
        Ok(Self { latitude, longitude })
    }

    /// (rows, cols)
    pub fn dim(&self) -> (usize, usize) {
        self.latitude.dim()
    }

    pub fn location(&self, row: usize, col: usize) -> GeoPoint {
        GeoPoint::new(self.latitude[[row, col]], self.longitude[[row, col]])
    }
}

/// One reanalysis node selected for a scene
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    /// Position in the row-major point sequence
    pub index: usize,
    /// Row in the full reanalysis grid
    pub row: usize,
    /// Column in the full reanalysis grid
    pub col: usize,
    pub location: GeoPoint,
    /// UTM coordinates in the scene's zone
    pub map: MapPoint,
    /// False when the node is too far from the scene to be simulated
    pub use_point: bool,
}

/// Rectangular block of reanalysis nodes bracketing a scene
#[derive(Debug, Clone)]
pub struct ReanalysisGrid {
    points: Vec<GridPoint>,
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
    pub num_rows: usize,
    pub num_cols: usize,
    /// Buffered scene extent used for node selection
    pub region: BoundingBox,
}

impl ReanalysisGrid {
    /// Select the reanalysis nodes for a scene.
    ///
    /// Nodes inside the buffered scene extent define a row/col box, which is
    /// expanded by one node on each side so that edge pixels are bracketed.
    /// A node is used when it is a corner of a cell overlapping the buffered
    /// extent, or lies within `point_tolerance_degrees` of it.
    pub fn build(
        coordinates: &ReanalysisCoordinates,
        metadata: &SceneMetadata,
        params: &GridConfig,
    ) -> LstResult<Self> {
        let extent = metadata.geographic_extent();
        if extent.is_degenerate() {
            return Err(LstError::Config(format!(
                "Degenerate scene extent: {:.4} x {:.4} degrees",
                extent.width(),
                extent.height()
            )));
        }

        let region = extent.buffered(params.buffer_degrees);
        let (grid_rows, grid_cols) = coordinates.dim();

        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for row in 0..grid_rows {
            for col in 0..grid_cols {
                if region.contains(&coordinates.location(row, col)) {
                    bounds = Some(match bounds {
                        None => (row, row, col, col),
                        Some((r0, r1, c0, c1)) => (r0.min(row), r1.max(row), c0.min(col), c1.max(col)),
                    });
                }
            }
        }

        let (min_row, max_row, min_col, max_col) = bounds.ok_or_else(|| {
            LstError::Config(format!("No reanalysis grid points fall inside the scene extent {:?}", region))
        })?;

        let min_row = min_row.saturating_sub(1);
        let max_row = (max_row + 1).min(grid_rows - 1);
        let min_col = min_col.saturating_sub(1);
        let max_col = (max_col + 1).min(grid_cols - 1);
        let num_rows = max_row - min_row + 1;
        let num_cols = max_col - min_col + 1;

        let usable = region.buffered(params.point_tolerance_degrees);
        let locations: Vec<GeoPoint> = (min_row..=max_row)
            .flat_map(|row| (min_col..=max_col).map(move |col| (row, col)))
            .map(|(row, col)| coordinates.location(row, col))
            .collect();
        let corners = cell_corner_usage(&locations, num_rows, num_cols, &region);

        let mut points = Vec::with_capacity(num_rows * num_cols);
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                let index = points.len();
                let location = locations[index];
                points.push(GridPoint {
                    index,
                    row,
                    col,
                    location,
                    map: geographic_to_utm(location, metadata.utm_zone),
                    use_point: corners[index] || usable.contains(&location),
                });
            }
        }

        let grid = Self {
            points,
            min_row,
            max_row,
            min_col,
            max_col,
            num_rows,
            num_cols,
            region,
        };

        log::info!(
            "Reanalysis grid: rows {}..={}, cols {}..={} ({} x {} = {} points, {} used)",
            min_row,
            max_row,
            min_col,
            max_col,
            num_rows,
            num_cols,
            grid.num_points(),
            grid.used_points().count()
        );

        Ok(grid)
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn used_points(&self) -> impl Iterator<Item = &GridPoint> {
        self.points.iter().filter(|p| p.use_point)
    }

    /// Point index from offsets within the selected block
    pub fn index_of(&self, row_offset: usize, col_offset: usize) -> usize {
        row_offset * self.num_cols + col_offset
    }

    pub fn point_at(&self, row_offset: usize, col_offset: usize) -> &GridPoint {
        &self.points[self.index_of(row_offset, col_offset)]
    }
}

/// Flags the corners of every cell of the block whose lat/lon bounds touch
/// `region`. `locations` is the row-major block of node coordinates.
fn cell_corner_usage(locations: &[GeoPoint], num_rows: usize, num_cols: usize, region: &BoundingBox) -> Vec<bool> {
    let mut used = vec![false; locations.len()];
    for row in 0..num_rows.saturating_sub(1) {
        for col in 0..num_cols.saturating_sub(1) {
            let corners = [
                row * num_cols + col,
                row * num_cols + col + 1,
                (row + 1) * num_cols + col,
                (row + 1) * num_cols + col + 1,
            ];
            let touches = BoundingBox::enclosing(corners.iter().map(|&i| &locations[i]))
                .map_or(false, |cell| cell.intersects(region));
            if touches {
                for i in corners {
                    used[i] = true;
                }
            }
        }
    }
    used
}

/// Bracketing bands for one elevation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandBracket {
    pub lower: usize,
    pub upper: usize,
    /// Weight of the upper band, 0 selects `lower` unchanged
    pub weight: f64,
    /// The elevation was outside the band range
    pub clamped: bool,
}

/// Reference heights shared by all grid points
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationBands {
    heights_km: Vec<f64>,
}

impl ElevationBands {
    pub fn new(heights_km: Vec<f64>) -> LstResult<Self> {
        if heights_km.is_empty() {
            return Err(LstError::Config("At least one elevation band is required".to_string()));
        }
        if heights_km.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(LstError::Config(format!(
                "Elevation bands must be strictly increasing: {:?}",
                heights_km
            )));
        }
        Ok(Self { heights_km })
    }

    pub fn standard() -> Self {
        Self {
            heights_km: STANDARD_ELEVATIONS_KM.to_vec(),
        }
    }

    /// Standard bands from sea level up to the first one reaching
    /// `max_elevation_km + margin_km` (at least two bands)
    pub fn for_scene(max_elevation_km: f64, margin_km: f64) -> Self {
        let target = max_elevation_km + margin_km;
        let count = STANDARD_ELEVATIONS_KM
            .iter()
            .position(|&h| h >= target)
            .map_or(STANDARD_ELEVATIONS_KM.len(), |i| i + 1)
            .max(2);

        if target > STANDARD_ELEVATIONS_KM[STANDARD_ELEVATIONS_KM.len() - 1] {
            log::warn!(
                "Scene elevation {:.3} km exceeds the highest band {:.3} km",
                max_elevation_km,
                STANDARD_ELEVATIONS_KM[STANDARD_ELEVATIONS_KM.len() - 1]
            );
        }

        Self {
            heights_km: STANDARD_ELEVATIONS_KM[..count].to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.heights_km.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights_km.is_empty()
    }

    pub fn height(&self, band: usize) -> f64 {
        self.heights_km[band]
    }

    pub fn heights(&self) -> &[f64] {
        &self.heights_km
    }

    /// Bands immediately below and above `elevation_km`
    pub fn bracket(&self, elevation_km: f64) -> BandBracket {
        let last = self.heights_km.len() - 1;

        if !(elevation_km > self.heights_km[0]) {
            return BandBracket {
                lower: 0,
                upper: 0,
                weight: 0.0,
                clamped: elevation_km != self.heights_km[0],
            };
        }
        if elevation_km >= self.heights_km[last] {
            return BandBracket {
                lower: last,
                upper: last,
                weight: 0.0,
                clamped: elevation_km > self.heights_km[last],
            };
        }

        let upper = self.heights_km.partition_point(|&h| h <= elevation_km);
        let lower = upper - 1;
        if self.heights_km[lower] == elevation_km {
            return BandBracket {
                lower,
                upper: lower,
                weight: 0.0,
                clamped: false,
            };
        }

        let weight = (elevation_km - self.heights_km[lower]) / (self.heights_km[upper] - self.heights_km[lower]);
        BandBracket {
            lower,
            upper,
            weight,
            clamped: false,
        }
    }
}
