//! Scene driver: grid, cases, simulation, reduction and interpolation

use crate::config::ProcessingConfig;
use crate::core::grid::{ElevationBands, ReanalysisCoordinates, ReanalysisGrid};
use crate::core::interpolate::{LstProduct, PixelInterpolator};
use crate::core::modtran_input::{CaseGenerator, CaseSet};
use crate::core::reduce::SpectralReducer;
use crate::core::simulator::{ProcessLauncher, RetryPolicy, SimulationRunner, SystemLauncher};
use crate::io::metadata::read_espa_metadata;
use crate::io::narr::{read_narr_coordinates, NarrProfileSource, ProfileSource, NARR_COLS, NARR_ROWS};
use crate::io::raster::{read_raw_band, write_raw_band_f32, write_raw_band_u8, RasterDataType};
use crate::io::spectral::SpectralResponse;
use crate::types::{LstResult, Satellite, SceneMetadata, SceneRasters};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Static inputs shared by every scene of a satellite
pub struct Ancillary {
    pub coordinates: ReanalysisCoordinates,
    pub profiles: Box<dyn ProfileSource>,
    pub response: SpectralResponse,
}

impl Ancillary {
    pub fn load(config: &ProcessingConfig, satellite: Satellite) -> LstResult<Self> {
        let coordinates = read_narr_coordinates(config.narr_coordinates_path(), NARR_ROWS, NARR_COLS)?;
        let response = SpectralResponse::from_file(config.lst_data_path.join(satellite.spectral_response_file()))?;
        Ok(Self {
            coordinates,
            profiles: Box::new(NarrProfileSource::new(&config.lst_aux_path)),
            response,
        })
    }
}

/// Input files of a scene
#[derive(Debug, Clone)]
pub struct SceneFiles {
    pub xml: PathBuf,
    pub dem: PathBuf,
    pub dem_type: RasterDataType,
    pub emissivity: PathBuf,
    pub emissivity_type: RasterDataType,
    /// Defaults to the XML directory
    pub output_dir: Option<PathBuf>,
}

/// Written products
#[derive(Debug, Clone)]
pub struct SceneOutputs {
    pub temperature: PathBuf,
    pub quality: PathBuf,
}

pub struct LstPipeline {
    config: ProcessingConfig,
    launcher: Arc<dyn ProcessLauncher>,
}

impl LstPipeline {
    pub fn new(config: ProcessingConfig) -> Self {
        Self::with_launcher(config, Arc::new(SystemLauncher::new()))
    }

    pub fn with_launcher(config: ProcessingConfig, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self { config, launcher }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Work directory of a scene
    pub fn work_dir(&self, metadata: &SceneMetadata) -> PathBuf {
        self.config.work_dir.join(&metadata.scene_id)
    }

    /// Process a scene with ancillary data from the configured directories
    pub fn run(&self, metadata: &SceneMetadata, rasters: &SceneRasters) -> LstResult<LstProduct> {
        self.config.validate()?;
        let ancillary = Ancillary::load(&self.config, metadata.satellite)?;
        self.process(&ancillary, metadata, rasters)
    }

    pub fn process(
        &self,
        ancillary: &Ancillary,
        metadata: &SceneMetadata,
        rasters: &SceneRasters,
    ) -> LstResult<LstProduct> {
        rasters.check_dimensions()?;

        log::info!("Processing LST for scene {}", metadata.scene_id);
        let grid = ReanalysisGrid::build(&ancillary.coordinates, metadata, &self.config.grid)?;

        let max_elevation_km = rasters.max_elevation().map_or(0.0, |e| e as f64 / 1000.0).max(0.0);
        let bands = ElevationBands::for_scene(max_elevation_km, self.config.grid.elevation_margin_km);
        log::info!(
            "Maximum elevation {:.3} km, {} elevation bands up to {:.3} km",
            max_elevation_km,
            bands.len(),
            bands.height(bands.len() - 1)
        );

        let work_dir = self.work_dir(metadata);
        std::fs::create_dir_all(&work_dir)?;

        let cases = CaseGenerator::from_config(&self.config, &work_dir).generate(
            &grid,
            &bands,
            ancillary.profiles.as_ref(),
        )?;
        cases.write_lists(&work_dir)?;

        let runner = SimulationRunner::new(
            Arc::clone(&self.launcher),
            self.config.process_count,
            RetryPolicy::new(self.config.simulator_retries, self.config.simulator_timeout()),
        );
        runner.run_all(&cases)?;

        let reducer = SpectralReducer::new(ancillary.response.clone());
        let table = reducer.reduce_all(&cases)?;

        if self.config.keep_intermediate {
            table.write_text(work_dir.join("atmospheric_parameters.txt"), &grid, &bands)?;
        } else {
            remove_case_directories(&cases);
        }

        let interpolator =
            PixelInterpolator::new(&grid, &bands, &table, reducer.response().effective_wavelength())?;
        interpolator.generate_lst(metadata, rasters)
    }

    /// Read a scene from disk, process it and write the products
    pub fn run_files(&self, files: &SceneFiles) -> LstResult<SceneOutputs> {
        let scene = read_espa_metadata(&files.xml)?;
        let metadata = &scene.metadata;
        let (lines, samples) = (metadata.lines, metadata.samples);

        let dn = read_raw_band(&scene.thermal_file, lines, samples, scene.thermal_data_type)?;
        let (radiance, valid) = metadata.thermal.to_radiance(&dn);
        let rasters = SceneRasters {
            radiance,
            elevation: read_raw_band(&files.dem, lines, samples, files.dem_type)?,
            emissivity: read_raw_band(&files.emissivity, lines, samples, files.emissivity_type)?,
            valid,
        };

        let product = self.run(metadata, &rasters)?;

        let output_dir = match &files.output_dir {
            Some(dir) => dir.clone(),
            None => files.xml.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
        };
        std::fs::create_dir_all(&output_dir)?;

        let outputs = SceneOutputs {
            temperature: output_dir.join(format!("{}_lst.img", metadata.scene_id)),
            quality: output_dir.join(format!("{}_lst_qa.img", metadata.scene_id)),
        };
        write_raw_band_f32(&outputs.temperature, &product.temperature)?;
        write_raw_band_u8(&outputs.quality, &product.quality)?;
        log::info!("✅ Wrote {}", outputs.temperature.display());

        Ok(outputs)
    }
}

/// Remove the per-point case directories once reduction is complete
fn remove_case_directories(cases: &CaseSet) {
    let point_dirs: BTreeSet<&Path> = cases
        .cases
        .iter()
        .filter_map(|case| case.directory.parent())
        .collect();

    for dir in point_dirs {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {}", dir.display(), e);
            }
        }
    }
    log::debug!("Removed intermediate case directories");
}
