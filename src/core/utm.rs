//! Geographic to UTM conversion on the WGS84 ellipsoid

use crate::types::{GeoPoint, MapPoint};

const EQUATORIAL_RADIUS: f64 = 6_378_137.0;
const POLAR_RADIUS: f64 = 6_356_752.314_2;
const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const SOUTHERN_FALSE_NORTHING: f64 = 10_000_000.0;

/// Project a geographic point into the given UTM zone.
///
/// Southern hemisphere zones are given as negative zone numbers and receive
/// the 10 000 km false northing.
pub fn geographic_to_utm(point: GeoPoint, zone: i32) -> MapPoint {
    let a = EQUATORIAL_RADIUS;
    let b = POLAR_RADIUS;
    let k0 = SCALE_FACTOR;

    let zone_cm = 6.0 * zone.abs() as f64 - 183.0;

    let ecc = (1.0 - (b / a) * (b / a)).sqrt();
    let ecc_prime_sqrd = (ecc * ecc) / (1.0 - ecc * ecc);
    let n = (a - b) / (a + b);

    // Meridional arc coefficients
    let a0 = a * (1.0 - n + (5.0 * n * n / 4.0) * (1.0 - n) + (81.0 * n.powi(4) / 64.0) * (1.0 - n));
    let b0 = (3.0 * a * n / 2.0) * (1.0 - n - (7.0 * n * n / 8.0) * (1.0 - n) + 55.0 * n.powi(4) / 64.0);
    let c0 = (15.0 * a * n * n / 16.0) * (1.0 - n + (3.0 * n * n / 4.0) * (1.0 - n));
    let d0 = (35.0 * a * n.powi(3) / 48.0) * (1.0 - n + 11.0 * n * n / 16.0);
    let e0 = (315.0 * a * n.powi(4) / 512.0) * (1.0 - n);

    let p = (point.longitude - zone_cm).to_radians();
    let lat = point.latitude.to_radians();
    let (sin_lat, cos_lat, tan_lat) = (lat.sin(), lat.cos(), lat.tan());

    let nu = a / (1.0 - (ecc * sin_lat).powi(2)).sqrt();

    let s = a0 * lat - b0 * (2.0 * lat).sin() + c0 * (4.0 * lat).sin() - d0 * (6.0 * lat).sin()
        + e0 * (8.0 * lat).sin();

    let ki = s * k0;
    let kii = nu * sin_lat * cos_lat * k0 / 2.0;
    let kiii = (nu * sin_lat * cos_lat.powi(3) / 24.0)
        * (5.0 - tan_lat * tan_lat
            + 9.0 * ecc_prime_sqrd * cos_lat.powi(2)
            + 4.0 * ecc_prime_sqrd * ecc_prime_sqrd * cos_lat.powi(4))
        * k0;
    let kiv = nu * cos_lat * k0;
    let kv = cos_lat.powi(3) * (nu / 6.0) * (1.0 - tan_lat * tan_lat + ecc_prime_sqrd * cos_lat * cos_lat) * k0;

    let easting = FALSE_EASTING + kiv * p + kv * p.powi(3);
    let mut northing = ki + kii * p * p + kiii * p.powi(4);
    if zone < 0 {
        northing += SOUTHERN_FALSE_NORTHING;
    }

    MapPoint { x: easting, y: northing }
}
