//! Simulation case generation
//!
//! One case per (used grid point, elevation band). Every case owns three
//! simulator runs that differ only in the surface description, from which the
//! reducer solves for transmission and path radiances.

use crate::config::ProcessingConfig;
use crate::core::grid::{ElevationBands, GridPoint, ReanalysisGrid};
use crate::core::simulator::SimulatorCommand;
use crate::io::narr::{AtmosphericProfile, ProfileSource};
use crate::types::{GeoPoint, LstError, LstResult};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Surface albedo of the reflective run
pub const SURFACE_ALBEDO: f64 = 0.1;

/// Name of the simulator input deck in every run directory
pub const TAPE5_FILE: &str = "tape5";

/// Spectral window of every run (um)
const SPECTRAL_WINDOW_UM: (f64, f64) = (9.5, 13.5);
/// Top of the slant path (km)
const SENSOR_ALTITUDE_KM: f64 = 100.0;

/// Surface description of one simulator run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceVariant {
    /// 273 K black body
    Kelvin273,
    /// 310 K black body
    Kelvin310,
    /// 0 K surface with albedo 0.1
    Reflective,
}

impl SurfaceVariant {
    pub const ALL: [SurfaceVariant; 3] = [
        SurfaceVariant::Kelvin273,
        SurfaceVariant::Kelvin310,
        SurfaceVariant::Reflective,
    ];

    pub fn temperature(&self) -> f64 {
        match self {
            SurfaceVariant::Kelvin273 => 273.0,
            SurfaceVariant::Kelvin310 => 310.0,
            SurfaceVariant::Reflective => 0.0,
        }
    }

    pub fn albedo(&self) -> f64 {
        match self {
            SurfaceVariant::Reflective => SURFACE_ALBEDO,
            _ => 0.0,
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            SurfaceVariant::Kelvin273 => "273",
            SurfaceVariant::Kelvin310 => "310",
            SurfaceVariant::Reflective => "000",
        }
    }
}

/// One simulator invocation of a case
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRun {
    pub variant: SurfaceVariant,
    pub directory: PathBuf,
    pub command: SimulatorCommand,
    /// Converts the simulator output into `parsed`
    pub extract: Option<SimulatorCommand>,
}

impl SimulationRun {
    pub fn parsed_path(&self) -> PathBuf {
        self.directory.join("parsed")
    }
}

/// Simulation inputs of one (grid point, elevation band) pair
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationCase {
    /// `<lat>_<lon>/<height>`, unique within a scene
    pub id: String,
    pub point_index: usize,
    pub band_index: usize,
    pub location: GeoPoint,
    pub height_km: f64,
    pub directory: PathBuf,
    pub runs: Vec<SimulationRun>,
    /// False when another case already produces the same results
    pub run_modtran: bool,
    /// Index of the case that produces the results of a skipped duplicate
    pub duplicate_of: Option<usize>,
}

impl SimulationCase {
    pub fn run(&self, variant: SurfaceVariant) -> Option<&SimulationRun> {
        self.runs.iter().find(|r| r.variant == variant)
    }
}

/// Generated cases of a scene
#[derive(Debug, Clone)]
pub struct CaseSet {
    pub cases: Vec<SimulationCase>,
    pub num_points: usize,
    pub num_bands: usize,
    /// Cases that need the simulator
    pub num_modtran_runs: usize,
}

impl CaseSet {
    pub fn commands(&self) -> Vec<&SimulatorCommand> {
        self.cases
            .iter()
            .filter(|c| c.run_modtran)
            .flat_map(|c| c.runs.iter().map(|r| &r.command))
            .collect()
    }

    /// Write `caseList` and `commandList` into `dir`
    pub fn write_lists<P: AsRef<Path>>(&self, dir: P) -> LstResult<()> {
        let dir = dir.as_ref();
        let mut case_list = String::new();
        let mut command_list = String::new();

        for case in self.cases.iter().filter(|c| c.run_modtran) {
            let _ = writeln!(case_list, "{}", case.directory.display());
            for run in &case.runs {
                let _ = writeln!(command_list, "{}", run.command);
            }
        }

        std::fs::write(dir.join("caseList"), case_list)?;
        std::fs::write(dir.join("commandList"), command_list)?;
        Ok(())
    }
}

/// Writes simulator inputs for every case of a scene
#[derive(Debug, Clone)]
pub struct CaseGenerator {
    work_dir: PathBuf,
    executable: PathBuf,
    data_path: Option<PathBuf>,
    extract_command: Option<PathBuf>,
}

impl CaseGenerator {
    pub fn new<P: AsRef<Path>, E: AsRef<Path>>(work_dir: P, executable: E) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
            executable: executable.as_ref().to_path_buf(),
            data_path: None,
            extract_command: None,
        }
    }

    pub fn from_config<P: AsRef<Path>>(config: &ProcessingConfig, work_dir: P) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
            executable: config.modtran_executable.clone(),
            data_path: config.modtran_data_path.clone(),
            extract_command: config.extract_command.clone(),
        }
    }

    pub fn with_data_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_extract_command<P: AsRef<Path>>(mut self, command: P) -> Self {
        self.extract_command = Some(command.as_ref().to_path_buf());
        self
    }

    pub fn case_id(location: &GeoPoint, height_km: f64) -> String {
        format!("{:.3}_{:.3}/{:.3}", location.latitude, location.longitude, height_km)
    }

    /// Create the run directories and simulator inputs of every case
    pub fn generate(
        &self,
        grid: &ReanalysisGrid,
        bands: &ElevationBands,
        profiles: &dyn ProfileSource,
    ) -> LstResult<CaseSet> {
        log::info!(
            "Generating simulation cases in {} ({} bands)",
            self.work_dir.display(),
            bands.len()
        );

        let mut cases: Vec<SimulationCase> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for point in grid.used_points() {
            let profile = profiles.profile(point)?;

            for (band_index, &height_km) in bands.heights().iter().enumerate() {
                let id = Self::case_id(&point.location, height_km);
                let directory = self.work_dir.join(&id);
                let runs = self.plan_runs(&directory);

                if let Some(&original) = seen.get(&id) {
                    log::debug!("Case {} duplicates case {}", id, original);
                    cases.push(SimulationCase {
                        id,
                        point_index: point.index,
                        band_index,
                        location: point.location,
                        height_km,
                        directory,
                        runs,
                        run_modtran: false,
                        duplicate_of: Some(original),
                    });
                    continue;
                }

                let column = Self::column_above(point, &profile, height_km)?;
                for run in &runs {
                    self.write_run(run, &column, height_km)?;
                }

                seen.insert(id.clone(), cases.len());
                cases.push(SimulationCase {
                    id,
                    point_index: point.index,
                    band_index,
                    location: point.location,
                    height_km,
                    directory,
                    runs,
                    run_modtran: true,
                    duplicate_of: None,
                });
            }
        }

        let num_modtran_runs = cases.iter().filter(|c| c.run_modtran).count();
        log::info!(
            "Generated {} cases, {} need the simulator ({} invocations)",
            cases.len(),
            num_modtran_runs,
            num_modtran_runs * SurfaceVariant::ALL.len()
        );

        Ok(CaseSet {
            cases,
            num_points: grid.num_points(),
            num_bands: bands.len(),
            num_modtran_runs,
        })
    }

    fn plan_runs(&self, case_dir: &Path) -> Vec<SimulationRun> {
        SurfaceVariant::ALL
            .iter()
            .map(|&variant| {
                let directory = case_dir.join(variant.dir_name());
                let command = SimulatorCommand::new(&self.executable, &directory);
                let extract = self.extract_command.as_ref().map(|program| {
                    SimulatorCommand::new(program, &directory)
                        .arg("--tape6")
                        .arg(directory.join("tape6").display().to_string())
                        .arg("--parsed")
                        .arg(directory.join("parsed").display().to_string())
                });
                SimulationRun {
                    variant,
                    directory,
                    command,
                    extract,
                }
            })
            .collect()
    }

    fn column_above(point: &GridPoint, profile: &AtmosphericProfile, height_km: f64) -> LstResult<AtmosphericProfile> {
        profile
            .above_ground(height_km)
            .map(|column| column.with_upper_atmosphere())
            .ok_or_else(|| LstError::ProfileUnavailable {
                row: point.row,
                col: point.col,
                reason: format!(
                    "ground altitude {:.3} km is above the top profile level {:.3} km",
                    height_km,
                    profile.top_height_km()
                ),
            })
    }

    fn write_run(&self, run: &SimulationRun, column: &AtmosphericProfile, height_km: f64) -> LstResult<()> {
        std::fs::create_dir_all(&run.directory)?;
        std::fs::write(run.directory.join(TAPE5_FILE), build_tape5(column, height_km, run.variant))?;

        #[cfg(unix)]
        if let Some(data) = &self.data_path {
            let link = run.directory.join("DATA");
            if link.symlink_metadata().is_err() {
                std::os::unix::fs::symlink(data, &link)?;
            }
        }

        Ok(())
    }
}

/// Thermal radiance input deck for a user-defined profile.
///
/// Slant path from the sensor altitude straight down to the ground layer.
pub fn build_tape5(column: &AtmosphericProfile, ground_km: f64, variant: SurfaceVariant) -> String {
    let layers = column.layers();
    let mut deck = String::new();

    // Card 1: user profile, slant path to ground, thermal radiance
    let _ = writeln!(
        deck,
        "TMF 7    2    1    0    0    0    0    0    0    0    0    1    0{:8.3}{:7.2}",
        variant.temperature(),
        variant.albedo()
    );
    // Card 2: rural aerosol, ground altitude
    let _ = writeln!(
        deck,
        "    1    0    0    0    0    0{:10.5}{:10.5}{:10.5}{:10.5}{:10.5}",
        0.0, 0.0, 0.0, 0.0, ground_km
    );
    // Card 2C: layer count
    let _ = writeln!(deck, "{:5}{:5}{:5}{:>20}", layers.len(), 0, 0, "NARR profile");
    // Card 2C1: height, pressure, temperature, relative humidity
    for layer in layers {
        let _ = writeln!(
            deck,
            "{:10.3}{:10.3e}{:10.3e}{:10.3e}{:10.3e}{:10.3e}{:>16}",
            layer.height_km,
            layer.pressure_hpa,
            layer.temperature_k,
            layer.relative_humidity,
            0.0,
            0.0,
            "AAH"
        );
    }
    // Card 3: observer altitude, ground altitude, nadir view
    let _ = writeln!(deck, "{:10.3}{:10.3}{:10.3}", SENSOR_ALTITUDE_KM, ground_km, 180.0);
    // Card 4: spectral window in microns
    let _ = writeln!(
        deck,
        "{:10.3}{:10.3}{:10.3}{:10.3}RM        M  A",
        SPECTRAL_WINDOW_UM.0, SPECTRAL_WINDOW_UM.1, 0.01, 0.02
    );
    // Card 5: end of runs
    let _ = writeln!(deck, "    0");

    deck
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::narr::ProfileLayer;

    fn column() -> AtmosphericProfile {
        AtmosphericProfile::new(vec![
            ProfileLayer {
                height_km: 0.6,
                pressure_hpa: 940.0,
                temperature_k: 288.0,
                relative_humidity: 55.0,
            },
            ProfileLayer {
                height_km: 5.5,
                pressure_hpa: 500.0,
                temperature_k: 255.0,
                relative_humidity: 20.0,
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_variants() {
        let dirs: Vec<&str> = SurfaceVariant::ALL.iter().map(|v| v.dir_name()).collect();
        assert_eq!(dirs, vec!["273", "310", "000"]);
        assert_eq!(SurfaceVariant::Reflective.albedo(), SURFACE_ALBEDO);
        assert_eq!(SurfaceVariant::Kelvin310.albedo(), 0.0);
    }

    #[test]
    fn test_case_id_format() {
        let id = CaseGenerator::case_id(&GeoPoint::new(43.12345, -111.5), 1.1);
        assert_eq!(id, "43.123_-111.500/1.100");
    }

    #[test]
    fn test_tape5_contains_surface_and_layers() {
        let deck = build_tape5(&column(), 0.6, SurfaceVariant::Reflective);
        let lines: Vec<&str> = deck.lines().collect();

        assert!(lines[0].ends_with("   0.000   0.10"));
        assert!(lines[2].starts_with("    2"));
        assert!(lines[3].starts_with("     0.600"));
        assert!(lines[3].ends_with("AAH"));
        assert_eq!(lines.last(), Some(&"    0"));
        assert_eq!(deck, build_tape5(&column(), 0.6, SurfaceVariant::Reflective));
    }

    #[test]
    fn test_extract_command_arguments() {
        let generator = CaseGenerator::new("/work", "mod5").with_extract_command("extract_tape6");
        let runs = generator.plan_runs(Path::new("/work/40.000_-110.000/0.000"));

        assert_eq!(runs.len(), 3);
        let extract = runs[0].extract.as_ref().unwrap();
        assert_eq!(extract.working_dir, PathBuf::from("/work/40.000_-110.000/0.000/273"));
        assert_eq!(
            extract.args,
            vec![
                "--tape6".to_string(),
                "/work/40.000_-110.000/0.000/273/tape6".to_string(),
                "--parsed".to_string(),
                "/work/40.000_-110.000/0.000/273/parsed".to_string(),
            ]
        );
        assert_eq!(runs[2].parsed_path(), PathBuf::from("/work/40.000_-110.000/0.000/000/parsed"));
    }
}
