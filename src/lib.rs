//! scene-lst: scene-based Land Surface Temperature for Landsat thermal bands
//!
//! Atmospheric profiles from the NARR reanalysis are simulated with an
//! external radiative transfer program at a grid of points and elevations
//! around the scene, reduced to band transmission and path radiances, and
//! interpolated to every pixel to invert surface temperature.

pub mod config;
pub mod core;
pub mod io;
pub mod pipeline;
pub mod types;

// Re-export main types and functions for easier access
pub use config::{GridConfig, ProcessingConfig};
pub use pipeline::{Ancillary, LstPipeline, SceneFiles, SceneOutputs};
pub use types::{
    AtmosphericParameters, GeoPoint, LstError, LstImage, LstResult, MapPoint, QualityImage, Satellite,
    SceneMetadata, SceneRasters, ThermalCalibration, LST_FILL_VALUE,
};
