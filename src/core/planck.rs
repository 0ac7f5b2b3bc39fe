//! Planck black-body radiance and its inversion

/// First radiation constant for spectral radiance, 2hc^2 (W um^4 m^-2 sr^-1)
pub const C1: f64 = 1.191_042_97e8;
/// Second radiation constant, hc/k (um K)
pub const C2: f64 = 1.438_776_9e4;

/// Spectral radiance (W m^-2 sr^-1 um^-1) of a black body at `wavelength` (um)
pub fn blackbody_radiance(wavelength: f64, temperature: f64) -> f64 {
    if temperature <= 0.0 || wavelength <= 0.0 {
        return 0.0;
    }
    C1 / (wavelength.powi(5) * ((C2 / (wavelength * temperature)).exp() - 1.0))
}

/// Temperature (K) of a black body emitting `radiance` at `wavelength`.
///
/// `None` when the inversion argument is not positive.
pub fn brightness_temperature(wavelength: f64, radiance: f64) -> Option<f64> {
    if !(radiance > 0.0) || !(wavelength > 0.0) {
        return None;
    }
    let argument = C1 / (wavelength.powi(5) * radiance) + 1.0;
    let temperature = C2 / (wavelength * argument.ln());
    temperature.is_finite().then_some(temperature)
}
