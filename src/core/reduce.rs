//! Reduction of simulated spectra to band atmospheric parameters
//!
//! With band averaged top-of-atmosphere radiances L273, L310 (black bodies at
//! 273 K and 310 K) and L000 (0 K surface, albedo 0.1), and band averaged
//! black-body radiances B273, B310 on the same spectral samples:
//!
//! ```text
//! transmission = (L310 - L273) / (B310 - B273)
//! upwelled     = L310 - transmission * B310
//! downwelled   = (L000 - upwelled) / (transmission * 0.1)
//! ```

use crate::core::modtran_input::{CaseSet, SimulationCase, SurfaceVariant, SURFACE_ALBEDO};
use crate::core::parameters::PointParameterTable;
use crate::core::planck::blackbody_radiance;
use crate::io::spectral::{SpectralResponse, SpectralTable};
use crate::types::{AtmosphericParameters, LstError, LstResult};

/// Spectra of the three runs of one case
#[derive(Debug, Clone)]
pub struct CaseSpectra {
    pub kelvin_273: SpectralTable,
    pub kelvin_310: SpectralTable,
    pub reflective: SpectralTable,
}

fn reduction_error(case: &str, reason: String) -> LstError {
    LstError::Reduction {
        case: case.to_string(),
        reason,
    }
}

pub struct SpectralReducer {
    response: SpectralResponse,
}

impl SpectralReducer {
    pub fn new(response: SpectralResponse) -> Self {
        Self { response }
    }

    pub fn response(&self) -> &SpectralResponse {
        &self.response
    }

    fn band_radiance(&self, case: &str, spectrum: &SpectralTable, variant: SurfaceVariant) -> LstResult<f64> {
        if !self.response.is_covered_by(spectrum) {
            return Err(reduction_error(case, format!(
                "{} K spectrum ({:.3}-{:.3} um) does not cover the band",
                variant.dir_name(),
                spectrum.min_wavelength(),
                spectrum.max_wavelength()
            )));
        }
        self.response
            .band_average(&spectrum.wavelengths, &spectrum.values)
            .ok_or_else(|| reduction_error(case, format!("{} K spectrum has no in-band samples", variant.dir_name())))
    }

    /// Band averaged black-body radiance on the spectrum's own samples
    fn band_blackbody(&self, case: &str, spectrum: &SpectralTable, temperature: f64) -> LstResult<f64> {
        let planck: Vec<f64> = spectrum
            .wavelengths
            .iter()
            .map(|&w| blackbody_radiance(w, temperature))
            .collect();
        self.response
            .band_average(&spectrum.wavelengths, &planck)
            .ok_or_else(|| reduction_error(case, "no in-band samples for the black-body reference".to_string()))
    }

    /// Solve for transmission, upwelled and downwelled radiance of `case`
    pub fn solve(&self, case: &str, spectra: &CaseSpectra) -> LstResult<AtmosphericParameters> {
        let l273 = self.band_radiance(case, &spectra.kelvin_273, SurfaceVariant::Kelvin273)?;
        let l310 = self.band_radiance(case, &spectra.kelvin_310, SurfaceVariant::Kelvin310)?;
        let l000 = self.band_radiance(case, &spectra.reflective, SurfaceVariant::Reflective)?;

        let b273 = self.band_blackbody(case, &spectra.kelvin_273, SurfaceVariant::Kelvin273.temperature())?;
        let b310 = self.band_blackbody(case, &spectra.kelvin_310, SurfaceVariant::Kelvin310.temperature())?;

        if [l273, l310, l000].iter().any(|&l| l < 0.0) {
            return Err(reduction_error(
                case,
                format!("negative simulated radiance (L273 {:.6}, L310 {:.6}, L000 {:.6})", l273, l310, l000),
            ));
        }

        let transmission = (l310 - l273) / (b310 - b273);
        if !transmission.is_finite() || !(0.0..=1.0).contains(&transmission) {
            return Err(reduction_error(case, format!("transmission {:.6} outside [0, 1]", transmission)));
        }
        if transmission < f64::EPSILON {
            return Err(reduction_error(case, "transmission is zero".to_string()));
        }

        let upwelled = l310 - transmission * b310;
        let downwelled = (l000 - upwelled) / (transmission * SURFACE_ALBEDO);
        if upwelled < 0.0 || downwelled < 0.0 {
            return Err(reduction_error(
                case,
                format!("negative path radiance (upwelled {:.6}, downwelled {:.6})", upwelled, downwelled),
            ));
        }

        Ok(AtmosphericParameters::new(transmission, upwelled, downwelled))
    }

    /// Read the parsed spectra of a case and solve for its parameters
    pub fn reduce_case(&self, case: &SimulationCase) -> LstResult<AtmosphericParameters> {
        let failure = |reason: String| reduction_error(&case.id, reason);

        let read = |variant: SurfaceVariant| -> LstResult<SpectralTable> {
            let run = case
                .run(variant)
                .ok_or_else(|| failure(format!("no {} run", variant.dir_name())))?;
            let path = run.parsed_path();
            SpectralTable::read_parsed(&path).map_err(|e| failure(format!("{}: {}", path.display(), e)))
        };

        let spectra = CaseSpectra {
            kelvin_273: read(SurfaceVariant::Kelvin273)?,
            kelvin_310: read(SurfaceVariant::Kelvin310)?,
            reflective: read(SurfaceVariant::Reflective)?,
        };

        let params = self.solve(&case.id, &spectra)?;
        log::debug!(
            "Case {}: transmission {:.4}, upwelled {:.4}, downwelled {:.4}",
            case.id,
            params.transmission,
            params.upwelled_radiance,
            params.downwelled_radiance
        );
        Ok(params)
    }

    /// Reduce every simulated case into the parameter table
    pub fn reduce_all(&self, cases: &CaseSet) -> LstResult<PointParameterTable> {
        let simulated: Vec<&SimulationCase> = cases.cases.iter().filter(|c| c.run_modtran).collect();
        log::info!("Reducing {} simulated cases", simulated.len());

        let results = self.reduce_cases(&simulated);

        let mut table = PointParameterTable::new(cases.num_points, cases.num_bands);
        for (case, result) in simulated.iter().zip(results) {
            table.insert(case.point_index, case.band_index, result?)?;
        }

        for case in cases.cases.iter().filter(|c| !c.run_modtran) {
            let original = case
                .duplicate_of
                .and_then(|i| cases.cases.get(i))
                .ok_or_else(|| LstError::Reduction {
                    case: case.id.clone(),
                    reason: "skipped case has no producing case".to_string(),
                })?;
            let params = table.require(original.point_index, original.band_index)?;
            table.insert(case.point_index, case.band_index, params)?;
        }

        let transmissions = simulated
            .iter()
            .filter_map(|c| table.get(c.point_index, c.band_index))
            .map(|p| p.transmission);
        let (min_t, max_t) = transmissions.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
            (lo.min(t), hi.max(t))
        });
        log::info!(
            "✅ Reduced {} cells, transmission range {:.4}..{:.4}",
            table.populated(),
            min_t,
            max_t
        );

        Ok(table)
    }

    #[cfg(feature = "parallel")]
    fn reduce_cases(&self, cases: &[&SimulationCase]) -> Vec<LstResult<AtmosphericParameters>> {
        use rayon::prelude::*;
        cases.par_iter().map(|case| self.reduce_case(case)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn reduce_cases(&self, cases: &[&SimulationCase]) -> Vec<LstResult<AtmosphericParameters>> {
        cases.iter().map(|case| self.reduce_case(case)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reducer() -> SpectralReducer {
        let table = SpectralTable::new(
            vec![10.0, 10.4, 10.5, 11.5, 11.6, 12.0],
            vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0],
        )
        .unwrap();
        SpectralReducer::new(SpectralResponse::new(table).unwrap())
    }

    fn synthetic(transmission: f64, upwelled: f64, downwelled: f64) -> CaseSpectra {
        let wavelengths: Vec<f64> = (0..=60).map(|i| 9.5 + i as f64 * 0.05).collect();
        let spectrum = |f: &dyn Fn(f64) -> f64| {
            SpectralTable::new(wavelengths.clone(), wavelengths.iter().map(|&w| f(w)).collect()).unwrap()
        };
        CaseSpectra {
            kelvin_273: spectrum(&|w| transmission * blackbody_radiance(w, 273.0) + upwelled),
            kelvin_310: spectrum(&|w| transmission * blackbody_radiance(w, 310.0) + upwelled),
            reflective: spectrum(&|_| transmission * SURFACE_ALBEDO * downwelled + upwelled),
        }
    }

    #[test]
    fn test_solve_recovers_parameters() {
        let params = reducer().solve("40.000_-112.000/0.000", &synthetic(0.8, 2.0, 3.0)).unwrap();
        assert_relative_eq!(params.transmission, 0.8, epsilon = 1e-9);
        assert_relative_eq!(params.upwelled_radiance, 2.0, epsilon = 1e-9);
        assert_relative_eq!(params.downwelled_radiance, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_solve_rejects_transmission_above_one() {
        match reducer().solve("40.000_-112.000/0.000", &synthetic(1.2, 0.5, 1.0)) {
            Err(LstError::Reduction { case, reason }) => {
                assert_eq!(case, "40.000_-112.000/0.000");
                assert!(reason.contains("outside [0, 1]"), "{}", reason);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_solve_rejects_negative_radiance() {
        let err = reducer().solve("case", &synthetic(0.9, -0.5, 1.0)).unwrap_err();
        assert!(err.to_string().contains("negative"), "{}", err);
    }

    #[test]
    fn test_solve_rejects_spectrum_missing_band() {
        let mut spectra = synthetic(0.8, 2.0, 3.0);
        spectra.reflective = SpectralTable::new(vec![9.5, 10.8], vec![1.0, 1.0]).unwrap();
        assert!(matches!(reducer().solve("case", &spectra), Err(LstError::Reduction { .. })));
    }
}
