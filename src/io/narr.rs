//! NARR reanalysis inputs: the grid coordinate file and per-point profiles

use crate::core::grid::{GridPoint, ReanalysisCoordinates};
use crate::types::{LstError, LstResult};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Rows of the NARR grid
pub const NARR_ROWS: usize = 277;
/// Columns of the NARR grid
pub const NARR_COLS: usize = 349;

/// Mean earth radius used for geopotential conversion (km)
const EARTH_RADIUS_KM: f64 = 6356.766;

/// Read `narr_coordinates.txt`.
///
/// Each line holds `grid_i grid_j latitude longitude`, row-major over the
/// grid. Longitudes are stored in degrees west on [0, 360).
pub fn read_narr_coordinates<P: AsRef<Path>>(
    path: P,
    rows: usize,
    cols: usize,
) -> LstResult<ReanalysisCoordinates> {
    let path = path.as_ref();
    log::info!("Reading NARR coordinates: {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|e| {
        LstError::Config(format!("Can't open NARR coordinates file {}: {}", path.display(), e))
    })?;
    parse_narr_coordinates(&content, rows, cols)
}

pub fn parse_narr_coordinates(content: &str, rows: usize, cols: usize) -> LstResult<ReanalysisCoordinates> {
    let mut latitude = Array2::zeros((rows, cols));
    let mut longitude = Array2::zeros((rows, cols));

    let mut records = content.lines().filter(|l| !l.trim().is_empty());
    for row in 0..rows {
        for col in 0..cols {
            let line = records.next().ok_or_else(|| {
                LstError::Config(format!(
                    "End of NARR coordinates reached before {} x {} points",
                    rows, cols
                ))
            })?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(LstError::Config(format!("Malformed NARR coordinate line: '{}'", line)));
            }
            let lat = fields[2]
                .parse::<f64>()
                .map_err(|e| LstError::Config(format!("Invalid NARR latitude '{}': {}", fields[2], e)))?;
            let lon = fields[3]
                .parse::<f64>()
                .map_err(|e| LstError::Config(format!("Invalid NARR longitude '{}': {}", fields[3], e)))?;

            latitude[[row, col]] = lat;
            longitude[[row, col]] = if lon > 180.0 { 360.0 - lon } else { -lon };
        }
    }

    ReanalysisCoordinates::new(latitude, longitude)
}

/// One reanalysis pressure level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NarrLevel {
    pub pressure_hpa: f64,
    pub geopotential_height_m: f64,
    pub temperature_k: f64,
    /// Specific humidity (kg/kg)
    pub specific_humidity: f64,
}

impl NarrLevel {
    /// Geometric height (km) from geopotential height
    pub fn geometric_height_km(&self) -> f64 {
        let h = self.geopotential_height_m / 1000.0;
        EARTH_RADIUS_KM * h / (EARTH_RADIUS_KM - h)
    }

    /// Relative humidity (%) from specific humidity, pressure and temperature
    pub fn relative_humidity(&self) -> f64 {
        let q = self.specific_humidity.max(0.0);
        let vapor_pressure = q * self.pressure_hpa / (0.622 + 0.378 * q);
        let t_c = self.temperature_k - 273.15;
        let saturation = 6.112 * (17.67 * t_c / (t_c + 243.5)).exp();
        (100.0 * vapor_pressure / saturation).clamp(0.0, 100.0)
    }
}

/// Atmospheric layer in simulator units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileLayer {
    pub height_km: f64,
    pub pressure_hpa: f64,
    pub temperature_k: f64,
    /// Relative humidity (%)
    pub relative_humidity: f64,
}

/// US Standard Atmosphere 1976 above the top reanalysis level
const STANDARD_UPPER_ATMOSPHERE: [ProfileLayer; 10] = [
    ProfileLayer { height_km: 20.0, pressure_hpa: 55.29, temperature_k: 216.65, relative_humidity: 0.0 },
    ProfileLayer { height_km: 25.0, pressure_hpa: 25.49, temperature_k: 221.55, relative_humidity: 0.0 },
    ProfileLayer { height_km: 30.0, pressure_hpa: 11.97, temperature_k: 226.51, relative_humidity: 0.0 },
    ProfileLayer { height_km: 35.0, pressure_hpa: 5.746, temperature_k: 236.51, relative_humidity: 0.0 },
    ProfileLayer { height_km: 40.0, pressure_hpa: 2.871, temperature_k: 250.35, relative_humidity: 0.0 },
    ProfileLayer { height_km: 50.0, pressure_hpa: 0.7978, temperature_k: 270.65, relative_humidity: 0.0 },
    ProfileLayer { height_km: 60.0, pressure_hpa: 0.2196, temperature_k: 247.02, relative_humidity: 0.0 },
    ProfileLayer { height_km: 70.0, pressure_hpa: 0.05221, temperature_k: 219.59, relative_humidity: 0.0 },
    ProfileLayer { height_km: 80.0, pressure_hpa: 0.01052, temperature_k: 198.64, relative_humidity: 0.0 },
    ProfileLayer { height_km: 100.0, pressure_hpa: 0.00032, temperature_k: 195.08, relative_humidity: 0.0 },
];

/// Vertical atmospheric profile at one grid point, ascending in height
#[derive(Debug, Clone, PartialEq)]
pub struct AtmosphericProfile {
    layers: Vec<ProfileLayer>,
}

impl AtmosphericProfile {
    pub fn new(mut layers: Vec<ProfileLayer>) -> LstResult<Self> {
        if layers.len() < 2 {
            return Err(LstError::InvalidProfile(format!(
                "{} layer(s), at least 2 required",
                layers.len()
            )));
        }
        if layers
            .iter()
            .any(|l| !(l.height_km.is_finite() && l.pressure_hpa > 0.0 && l.temperature_k > 0.0))
        {
            return Err(LstError::InvalidProfile("non-finite height or non-positive pressure/temperature".to_string()));
        }
        layers.sort_by(|a, b| a.height_km.total_cmp(&b.height_km));
        layers.dedup_by(|a, b| a.height_km == b.height_km);
        if layers.len() < 2 {
            return Err(LstError::InvalidProfile("fewer than 2 distinct heights".to_string()));
        }
        Ok(Self { layers })
    }

    pub fn from_narr_levels(levels: &[NarrLevel]) -> LstResult<Self> {
        let layers = levels
            .iter()
            .map(|level| ProfileLayer {
                height_km: level.geometric_height_km(),
                pressure_hpa: level.pressure_hpa,
                temperature_k: level.temperature_k,
                relative_humidity: level.relative_humidity(),
            })
            .collect();
        Self::new(layers)
    }

    pub fn layers(&self) -> &[ProfileLayer] {
        &self.layers
    }

    pub fn top_height_km(&self) -> f64 {
        self.layers[self.layers.len() - 1].height_km
    }

    /// Layer at `height_km`, interpolating (or extrapolating from the two
    /// nearest layers) linearly in temperature/humidity and log-linearly in pressure
    pub fn layer_at(&self, height_km: f64) -> ProfileLayer {
        let n = self.layers.len();
        let upper = self.layers.partition_point(|l| l.height_km <= height_km).clamp(1, n - 1);
        let (l0, l1) = (&self.layers[upper - 1], &self.layers[upper]);

        let weight = (height_km - l0.height_km) / (l1.height_km - l0.height_km);
        let lerp = |a: f64, b: f64| a + weight * (b - a);

        ProfileLayer {
            height_km,
            pressure_hpa: lerp(l0.pressure_hpa.ln(), l1.pressure_hpa.ln()).exp(),
            temperature_k: lerp(l0.temperature_k, l1.temperature_k),
            relative_humidity: lerp(l0.relative_humidity, l1.relative_humidity).clamp(0.0, 100.0),
        }
    }

    /// Profile starting at the ground altitude `ground_km`.
    ///
    /// `None` when the ground lies above the top layer.
    pub fn above_ground(&self, ground_km: f64) -> Option<AtmosphericProfile> {
        if ground_km >= self.top_height_km() {
            return None;
        }
        let mut layers = vec![self.layer_at(ground_km)];
        layers.extend(self.layers.iter().copied().filter(|l| l.height_km > ground_km + 1e-6));
        Some(Self { layers })
    }

    /// Append the standard upper atmosphere above the top layer
    pub fn with_upper_atmosphere(&self) -> AtmosphericProfile {
        let top = self.top_height_km();
        let mut layers = self.layers.clone();
        layers.extend(STANDARD_UPPER_ATMOSPHERE.iter().copied().filter(|l| l.height_km > top));
        Self { layers }
    }
}

/// Source of atmospheric profiles for grid points
pub trait ProfileSource: Send + Sync {
    fn profile(&self, point: &GridPoint) -> LstResult<AtmosphericProfile>;
}

/// Profiles extracted from NARR into one text file per grid node.
///
/// `<dir>/<row>_<col>.txt` with lines of
/// `pressure_hpa geopotential_height_m temperature_k specific_humidity`.
#[derive(Debug, Clone)]
pub struct NarrProfileSource {
    dir: PathBuf,
}

impl NarrProfileSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn profile_path(&self, row: usize, col: usize) -> PathBuf {
        self.dir.join(format!("{:03}_{:03}.txt", row, col))
    }

    pub fn parse_levels(content: &str) -> LstResult<Vec<NarrLevel>> {
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|line| {
                let values: Vec<f64> = line
                    .split_whitespace()
                    .map(|s| {
                        s.parse::<f64>()
                            .map_err(|e| LstError::InvalidProfile(format!("'{}': {}", line, e)))
                    })
                    .collect::<LstResult<_>>()?;
                if values.len() < 4 {
                    return Err(LstError::InvalidProfile(format!("expected 4 columns in '{}'", line)));
                }
                Ok(NarrLevel {
                    pressure_hpa: values[0],
                    geopotential_height_m: values[1],
                    temperature_k: values[2],
                    specific_humidity: values[3],
                })
            })
            .collect()
    }
}

impl ProfileSource for NarrProfileSource {
    fn profile(&self, point: &GridPoint) -> LstResult<AtmosphericProfile> {
        let unavailable = |reason: String| LstError::ProfileUnavailable {
            row: point.row,
            col: point.col,
            reason,
        };

        let path = self.profile_path(point.row, point.col);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| unavailable(format!("{}: {}", path.display(), e)))?;
        let levels = Self::parse_levels(&content).map_err(|e| unavailable(e.to_string()))?;
        AtmosphericProfile::from_narr_levels(&levels).map_err(|e| unavailable(e.to_string()))
    }
}
