//! Processing configuration
//!
//! Loaded from a YAML file (by default `$HOME/.usgs/espa/lst_processing.yaml`)
//! with environment variable overrides for the data locations.

use crate::types::{LstError, LstResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Grid selection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Buffer added around the scene corners before selecting NARR nodes (degrees)
    pub buffer_degrees: f64,
    /// Distance outside the buffered extent within which a node is used even when
    /// it is not a corner of a cell overlapping the extent (degrees)
    pub point_tolerance_degrees: f64,
    /// Extra height above the scene's highest DEM pixel covered by elevation bands (km)
    pub elevation_margin_km: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            buffer_degrees: 0.2,
            point_tolerance_degrees: 0.6,
            elevation_margin_km: 0.1,
        }
    }
}

/// Complete processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Directory holding narr_coordinates.txt and the spectral response tables
    pub lst_data_path: PathBuf,
    /// Directory holding the per-point NARR profile files
    pub lst_aux_path: PathBuf,
    /// Scene work directories are created below this path
    pub work_dir: PathBuf,
    /// Radiative transfer simulator executable
    pub modtran_executable: PathBuf,
    /// Simulator `DATA` directory, linked into every run directory
    pub modtran_data_path: Option<PathBuf>,
    /// Companion tool converting tape6 into the parsed two-column table
    pub extract_command: Option<PathBuf>,
    /// Concurrent simulator processes
    pub process_count: usize,
    /// Per-attempt simulator timeout
    pub simulator_timeout_secs: u64,
    /// Re-invocations after a failed simulator attempt
    pub simulator_retries: u32,
    /// Keep case directories and write the parameter table
    pub keep_intermediate: bool,
    pub grid: GridConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            lst_data_path: PathBuf::from("/usr/local/espa-land-surface-temperature/static_data"),
            lst_aux_path: PathBuf::from("/usr/local/auxiliaries/LST/NARR"),
            work_dir: PathBuf::from("."),
            modtran_executable: PathBuf::from("mod5"),
            modtran_data_path: None,
            extract_command: Some(PathBuf::from("lst_extract_tape6_results.py")),
            process_count: 1,
            simulator_timeout_secs: 3600,
            simulator_retries: 1,
            keep_intermediate: false,
            grid: GridConfig::default(),
        }
    }
}

impl ProcessingConfig {
    pub const FILE_NAME: &'static str = "lst_processing.yaml";

    /// `$HOME/.usgs/espa/lst_processing.yaml`
    pub fn default_path() -> LstResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| LstError::Config("Unable to determine the home directory".to_string()))?;
        Ok(home.join(".usgs").join("espa").join(Self::FILE_NAME))
    }

    pub fn from_yaml_str(content: &str) -> LstResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| LstError::Config(format!("Invalid processing configuration: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> LstResult<Self> {
        let path = path.as_ref();
        log::info!("Reading processing configuration: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            LstError::Config(format!("Missing configuration file [{}]: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load the explicit file, or the default file when it exists, then apply
    /// environment overrides
    pub fn load(path: Option<&Path>) -> LstResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_path()?;
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    log::debug!("No configuration at {}, using defaults", default_path.display());
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// LST_DATA_DIR, LST_AUX_DIR, MODTRAN_PATH and MODTRAN_DATA_DIR take precedence
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("LST_DATA_DIR") {
            self.lst_data_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("LST_AUX_DIR") {
            self.lst_aux_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("MODTRAN_PATH") {
            self.modtran_executable = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("MODTRAN_DATA_DIR") {
            self.modtran_data_path = Some(PathBuf::from(value));
        }
    }

    pub fn validate(&self) -> LstResult<()> {
        if !self.lst_data_path.is_dir() {
            return Err(LstError::Config(format!(
                "LST data directory does not exist: {}",
                self.lst_data_path.display()
            )));
        }
        if !self.lst_aux_path.is_dir() {
            return Err(LstError::Config(format!(
                "LST auxiliary directory does not exist: {}",
                self.lst_aux_path.display()
            )));
        }
        if let Some(data) = &self.modtran_data_path {
            if !data.is_dir() {
                return Err(LstError::Config(format!(
                    "MODTRAN data directory does not exist: {}",
                    data.display()
                )));
            }
        }
        if self.process_count == 0 {
            return Err(LstError::Config("process_count must be at least 1".to_string()));
        }
        if self.grid.buffer_degrees < 0.0 || self.grid.point_tolerance_degrees < 0.0 {
            return Err(LstError::Config("Grid buffer and tolerance must not be negative".to_string()));
        }
        Ok(())
    }

    pub fn simulator_timeout(&self) -> Duration {
        Duration::from_secs(self.simulator_timeout_secs)
    }

    pub fn narr_coordinates_path(&self) -> PathBuf {
        self.lst_data_path.join("narr_coordinates.txt")
    }
}
