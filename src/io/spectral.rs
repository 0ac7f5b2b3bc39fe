use crate::types::{LstError, LstResult};
use std::path::Path;

/// Converts parsed simulator radiance (W cm^-2 sr^-1 um^-1) to W m^-2 sr^-1 um^-1
pub const PARSED_RADIANCE_SCALE: f64 = 10_000.0;

/// Two-column spectral table (wavelength in um, value)
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralTable {
    pub wavelengths: Vec<f64>,
    pub values: Vec<f64>,
}

impl SpectralTable {
    pub fn new(wavelengths: Vec<f64>, values: Vec<f64>) -> LstResult<Self> {
        if wavelengths.len() != values.len() {
            return Err(LstError::Processing(
                "Spectral table columns have mismatched lengths".to_string(),
            ));
        }
        if wavelengths.len() < 2 {
            return Err(LstError::Processing(format!(
                "Spectral table has {} sample(s), at least 2 required",
                wavelengths.len()
            )));
        }

        let mut pairs: Vec<(f64, f64)> = wavelengths.into_iter().zip(values).collect();
        if pairs.iter().any(|(w, v)| !w.is_finite() || !v.is_finite()) {
            return Err(LstError::Processing("Spectral table contains non-finite values".to_string()));
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(LstError::Processing("Spectral table repeats a wavelength".to_string()));
        }

        let (wavelengths, values) = pairs.into_iter().unzip();
        Ok(Self { wavelengths, values })
    }

    /// Parse whitespace separated columns, multiplying the value column by `scale`
    pub fn parse(content: &str, scale: f64) -> LstResult<Self> {
        let mut wavelengths = Vec::new();
        let mut values = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let parsed = match (fields.next(), fields.next()) {
                (Some(w), Some(v)) => w.parse::<f64>().ok().zip(v.parse::<f64>().ok()),
                _ => None,
            };
            let (wavelength, value) = parsed.ok_or_else(|| {
                LstError::Processing(format!("Malformed spectral line {}: '{}'", line_no + 1, line))
            })?;
            wavelengths.push(wavelength);
            values.push(value * scale);
        }

        Self::new(wavelengths, values)
    }

    pub fn from_file<P: AsRef<Path>>(path: P, scale: f64) -> LstResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content, scale)
    }

    /// Read the `parsed` output of the spectral extraction step
    pub fn read_parsed<P: AsRef<Path>>(path: P) -> LstResult<Self> {
        Self::from_file(path, PARSED_RADIANCE_SCALE)
    }

    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    pub fn min_wavelength(&self) -> f64 {
        self.wavelengths[0]
    }

    pub fn max_wavelength(&self) -> f64 {
        self.wavelengths[self.wavelengths.len() - 1]
    }

    /// Linear interpolation, zero outside the tabulated range
    pub fn value_at(&self, wavelength: f64) -> f64 {
        if wavelength < self.min_wavelength() || wavelength > self.max_wavelength() {
            return 0.0;
        }
        let idx = self.wavelengths.partition_point(|&w| w <= wavelength);
        if idx == 0 {
            return self.values[0];
        }
        if idx >= self.wavelengths.len() {
            return self.values[self.values.len() - 1];
        }
        let (w0, w1) = (self.wavelengths[idx - 1], self.wavelengths[idx]);
        let weight = (wavelength - w0) / (w1 - w0);
        self.values[idx - 1] * (1.0 - weight) + self.values[idx] * weight
    }
}

/// Relative spectral response of the sensor's thermal band
#[derive(Debug, Clone)]
pub struct SpectralResponse {
    table: SpectralTable,
}

impl SpectralResponse {
    pub fn new(table: SpectralTable) -> LstResult<Self> {
        if table.values.iter().any(|&r| r < 0.0) {
            return Err(LstError::Processing("Spectral response has negative values".to_string()));
        }
        if !table.values.iter().any(|&r| r > 0.0) {
            return Err(LstError::Processing("Spectral response is zero everywhere".to_string()));
        }
        Ok(Self { table })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> LstResult<Self> {
        log::debug!("Reading spectral response: {}", path.as_ref().display());
        Self::new(SpectralTable::from_file(path, 1.0)?)
    }

    pub fn at(&self, wavelength: f64) -> f64 {
        self.table.value_at(wavelength)
    }

    /// Wavelength range with non-zero response
    pub fn support(&self) -> (f64, f64) {
        let t = &self.table;
        let first = t.values.iter().position(|&r| r > 0.0).unwrap_or(0);
        let last = t.values.iter().rposition(|&r| r > 0.0).unwrap_or(t.len() - 1);
        (
            t.wavelengths[first.saturating_sub(1)],
            t.wavelengths[(last + 1).min(t.len() - 1)],
        )
    }

    /// True when `spectrum` spans the whole response support
    pub fn is_covered_by(&self, spectrum: &SpectralTable) -> bool {
        let (low, high) = self.support();
        spectrum.min_wavelength() <= low && spectrum.max_wavelength() >= high
    }

    /// Response-weighted mean of `values` sampled at `wavelengths`
    /// (trapezoidal integration). `None` when the samples miss the band.
    pub fn band_average(&self, wavelengths: &[f64], values: &[f64]) -> Option<f64> {
        let mut numerator = 0.0;
        let mut denominator = 0.0;

        for i in 1..wavelengths.len().min(values.len()) {
            let dw = wavelengths[i] - wavelengths[i - 1];
            let r0 = self.at(wavelengths[i - 1]);
            let r1 = self.at(wavelengths[i]);
            numerator += 0.5 * (r0 * values[i - 1] + r1 * values[i]) * dw;
            denominator += 0.5 * (r0 + r1) * dw;
        }

        (denominator > 0.0).then(|| numerator / denominator)
    }

    /// Response-weighted mean wavelength of the band
    pub fn effective_wavelength(&self) -> f64 {
        let t = &self.table;
        self.band_average(&t.wavelengths, &t.wavelengths)
            .unwrap_or_else(|| 0.5 * (t.min_wavelength() + t.max_wavelength()))
    }
}
