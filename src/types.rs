use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Real-valued raster band (lines x samples)
pub type LstImage = Array2<f32>;

/// Per-pixel quality flags (lines x samples)
pub type QualityImage = Array2<u8>;

/// Fill value written into the temperature raster for invalid pixels
pub const LST_FILL_VALUE: f32 = -9999.0;

/// Geographic location in decimal degrees (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Landsat missions with a supported thermal band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Satellite {
    Landsat5,
    Landsat7,
    Landsat8,
}

impl Satellite {
    /// Parse the satellite name used in ESPA metadata ("LANDSAT_7")
    pub fn from_espa_name(name: &str) -> LstResult<Self> {
        match name.trim().to_uppercase().as_str() {
            "LANDSAT_5" => Ok(Satellite::Landsat5),
            "LANDSAT_7" => Ok(Satellite::Landsat7),
            "LANDSAT_8" => Ok(Satellite::Landsat8),
            other => Err(LstError::Metadata(format!("Unsupported satellite: {}", other))),
        }
    }

    /// Relative spectral response table shipped in the LST data directory
    pub fn spectral_response_file(&self) -> &'static str {
        match self {
            Satellite::Landsat5 => "L5_Spectral_Response.txt",
            Satellite::Landsat7 => "L7_Spectral_Response.txt",
            Satellite::Landsat8 => "L8_Spectral_Response.txt",
        }
    }

    /// Band names of the thermal band in ESPA products
    pub fn thermal_band_names(&self) -> &'static [&'static str] {
        match self {
            Satellite::Landsat5 => &["b6"],
            Satellite::Landsat7 => &["b61", "b6"],
            Satellite::Landsat8 => &["b10"],
        }
    }
}

impl std::fmt::Display for Satellite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Satellite::Landsat5 => write!(f, "LANDSAT_5"),
            Satellite::Landsat7 => write!(f, "LANDSAT_7"),
            Satellite::Landsat8 => write!(f, "LANDSAT_8"),
        }
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Box spanned by the upper-left and lower-right scene corners
    pub fn from_corners(ul: GeoPoint, lr: GeoPoint) -> Self {
        Self {
            min_lon: ul.longitude.min(lr.longitude),
            max_lon: ul.longitude.max(lr.longitude),
            min_lat: ul.latitude.min(lr.latitude),
            max_lat: ul.latitude.max(lr.latitude),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Zero (or negative) width or height
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > f64::EPSILON && self.height() > f64::EPSILON)
    }

    /// Grow the box by `degrees` on every side
    pub fn buffered(&self, degrees: f64) -> Self {
        Self {
            min_lon: self.min_lon - degrees,
            max_lon: self.max_lon + degrees,
            min_lat: self.min_lat - degrees,
            max_lat: self.max_lat + degrees,
        }
    }

    /// Strict containment, matching the node selection of the scene extent
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.latitude > self.min_lat
            && point.latitude < self.max_lat
            && point.longitude > self.min_lon
            && point.longitude < self.max_lon
    }

    /// Smallest box holding every point, `None` when there are none
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a GeoPoint>) -> Option<Self> {
        points.into_iter().fold(None, |bounds, p| {
            Some(match bounds {
                None => Self {
                    min_lon: p.longitude,
                    max_lon: p.longitude,
                    min_lat: p.latitude,
                    max_lat: p.latitude,
                },
                Some(b) => Self {
                    min_lon: b.min_lon.min(p.longitude),
                    max_lon: b.max_lon.max(p.longitude),
                    min_lat: b.min_lat.min(p.latitude),
                    max_lat: b.max_lat.max(p.latitude),
                },
            })
        })
    }

    /// Shared area or touching edges
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
            && self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
    }
}

/// Projected (UTM) map coordinate in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub x: f64,
    pub y: f64,
}

/// Radiometric calibration of the thermal band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalCalibration {
    /// Radiance gain (W m^-2 sr^-1 um^-1 per DN)
    pub gain: f64,
    /// Radiance bias (W m^-2 sr^-1 um^-1)
    pub bias: f64,
    /// DN marking fill pixels
    pub fill_value: i32,
    /// DN at which the detector saturates
    pub saturate_value: Option<i32>,
}

impl ThermalCalibration {
    /// Convert thermal DN to at-sensor radiance.
    ///
    /// Returns the radiance band and a validity mask; fill and saturated
    /// pixels are masked out.
    pub fn to_radiance(&self, dn: &Array2<f32>) -> (LstImage, Array2<bool>) {
        let fill = self.fill_value as f32;
        let saturate = self.saturate_value.map(|v| v as f32);

        let valid = dn.mapv(|value| {
            value.is_finite() && value != fill && saturate.map_or(true, |s| value < s)
        });
        let gain = self.gain as f32;
        let bias = self.bias as f32;
        let radiance = dn.mapv(|value| gain * value + bias);

        (radiance, valid)
    }
}

/// Scene metadata consumed by the LST core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneMetadata {
    // Product identification
    pub scene_id: String,
    pub satellite: Satellite,
    pub instrument: String,

    // Acquisition
    pub acquisition_time: DateTime<Utc>,
    pub sun_zenith: f64,
    pub sun_azimuth: f64,

    // Geometry
    pub ul_geo_corner: GeoPoint,
    pub lr_geo_corner: GeoPoint,
    pub ul_map_corner: MapPoint,
    pub pixel_size: f64,
    /// UTM zone, negative for the southern hemisphere
    pub utm_zone: i32,

    // Thermal band
    pub lines: usize,
    pub samples: usize,
    pub thermal: ThermalCalibration,
}

impl SceneMetadata {
    /// Geographic bounding box of the scene corners
    pub fn geographic_extent(&self) -> BoundingBox {
        BoundingBox::from_corners(self.ul_geo_corner, self.lr_geo_corner)
    }

    /// Map coordinates of a pixel center
    pub fn pixel_map_coordinates(&self, line: usize, sample: usize) -> MapPoint {
        MapPoint {
            x: self.ul_map_corner.x + sample as f64 * self.pixel_size,
            y: self.ul_map_corner.y - line as f64 * self.pixel_size,
        }
    }
}

/// Co-registered per-pixel inputs of a scene
#[derive(Debug, Clone)]
pub struct SceneRasters {
    /// At-sensor thermal radiance (W m^-2 sr^-1 um^-1)
    pub radiance: LstImage,
    /// Surface elevation in meters
    pub elevation: LstImage,
    /// Surface emissivity in [0, 1]
    pub emissivity: LstImage,
    /// False for fill or masked pixels
    pub valid: Array2<bool>,
}

impl SceneRasters {
    pub fn dim(&self) -> (usize, usize) {
        self.radiance.dim()
    }

    /// All bands must share the thermal band's pixel grid
    pub fn check_dimensions(&self) -> LstResult<()> {
        let dim = self.radiance.dim();
        if self.elevation.dim() != dim || self.emissivity.dim() != dim || self.valid.dim() != dim {
            return Err(LstError::Processing(format!(
                "Raster dimensions differ: radiance {:?}, elevation {:?}, emissivity {:?}, mask {:?}",
                dim,
                self.elevation.dim(),
                self.emissivity.dim(),
                self.valid.dim()
            )));
        }
        Ok(())
    }

    /// Highest valid elevation in meters
    pub fn max_elevation(&self) -> Option<f32> {
        self.elevation
            .iter()
            .zip(self.valid.iter())
            .filter(|&(e, &v)| v && e.is_finite())
            .map(|(&e, _)| e)
            .fold(None, |acc: Option<f32>, e| Some(acc.map_or(e, |a| a.max(e))))
    }
}

/// Atmospheric correction parameters of the thermal band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericParameters {
    /// Atmospheric transmission [0, 1]
    pub transmission: f64,
    /// Upwelled path radiance (W m^-2 sr^-1 um^-1)
    pub upwelled_radiance: f64,
    /// Downwelled sky radiance (W m^-2 sr^-1 um^-1)
    pub downwelled_radiance: f64,
}

impl AtmosphericParameters {
    pub const ZERO: AtmosphericParameters = AtmosphericParameters {
        transmission: 0.0,
        upwelled_radiance: 0.0,
        downwelled_radiance: 0.0,
    };

    pub fn new(transmission: f64, upwelled_radiance: f64, downwelled_radiance: f64) -> Self {
        Self {
            transmission,
            upwelled_radiance,
            downwelled_radiance,
        }
    }

    /// `self + weight * other`, the accumulation step of weighted interpolation
    pub fn add_weighted(&self, other: &AtmosphericParameters, weight: f64) -> Self {
        Self {
            transmission: self.transmission + weight * other.transmission,
            upwelled_radiance: self.upwelled_radiance + weight * other.upwelled_radiance,
            downwelled_radiance: self.downwelled_radiance + weight * other.downwelled_radiance,
        }
    }

    /// Linear blend: `weight == 0` returns `self` unchanged
    pub fn lerp(&self, other: &AtmosphericParameters, weight: f64) -> Self {
        if weight == 0.0 {
            return *self;
        }
        AtmosphericParameters::ZERO
            .add_weighted(self, 1.0 - weight)
            .add_weighted(other, weight)
    }
}

/// Error types for LST processing
#[derive(Debug, thiserror::Error)]
pub enum LstError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Atmospheric profile unavailable for grid point (row {row}, col {col}): {reason}")]
    ProfileUnavailable {
        row: usize,
        col: usize,
        reason: String,
    },

    #[error("Invalid atmospheric profile: {0}")]
    InvalidProfile(String),

    #[error("Simulation case {case} failed after {attempts} attempt(s): {reason}")]
    SimulationFailed {
        case: String,
        attempts: u32,
        reason: String,
    },

    #[error("Reduction of case {case} failed: {reason}")]
    Reduction { case: String, reason: String },

    #[error("Atmospheric parameters missing for grid point {point}, elevation band {band}")]
    MissingParameters { point: usize, band: usize },

    #[error("Processing error: {0}")]
    Processing(String),
}

impl LstError {
    /// Errors that abort a scene before any simulation work starts
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LstError::Config(_) | LstError::Metadata(_) | LstError::XmlParsing(_)
        )
    }
}

/// Result type for LST operations
pub type LstResult<T> = Result<T, LstError>;
