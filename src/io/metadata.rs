//! ESPA scene metadata (XML)

use crate::io::raster::RasterDataType;
use crate::types::{GeoPoint, LstError, LstResult, MapPoint, Satellite, SceneMetadata, ThermalCalibration};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct EspaMetadataDocument {
    pub global_metadata: GlobalMetadata,
    pub bands: BandList,
}

#[derive(Debug, Deserialize)]
pub struct GlobalMetadata {
    pub satellite: String,
    pub instrument: String,
    pub acquisition_date: String,
    pub scene_center_time: String,
    #[serde(default)]
    pub product_id: Option<String>,
    pub solar_angles: SolarAngles,
    #[serde(rename = "corner", default)]
    pub corners: Vec<GeoCorner>,
    pub projection_information: ProjectionInformation,
}

#[derive(Debug, Deserialize)]
pub struct SolarAngles {
    #[serde(rename = "@zenith")]
    pub zenith: f64,
    #[serde(rename = "@azimuth")]
    pub azimuth: f64,
}

#[derive(Debug, Deserialize)]
pub struct GeoCorner {
    #[serde(rename = "@location")]
    pub location: String,
    #[serde(rename = "@latitude")]
    pub latitude: f64,
    #[serde(rename = "@longitude")]
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct ProjectionInformation {
    #[serde(rename = "@projection")]
    pub projection: String,
    #[serde(rename = "corner_point", default)]
    pub corner_points: Vec<MapCorner>,
    #[serde(default)]
    pub grid_origin: Option<String>,
    #[serde(default)]
    pub utm_proj_params: Option<UtmProjectionParams>,
}

#[derive(Debug, Deserialize)]
pub struct MapCorner {
    #[serde(rename = "@location")]
    pub location: String,
    #[serde(rename = "@x")]
    pub x: f64,
    #[serde(rename = "@y")]
    pub y: f64,
}

#[derive(Debug, Deserialize)]
pub struct UtmProjectionParams {
    pub zone_code: i32,
}

#[derive(Debug, Deserialize)]
pub struct BandList {
    #[serde(rename = "band", default)]
    pub bands: Vec<Band>,
}

#[derive(Debug, Deserialize)]
pub struct Band {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@data_type")]
    pub data_type: String,
    #[serde(rename = "@nlines")]
    pub nlines: usize,
    #[serde(rename = "@nsamps")]
    pub nsamps: usize,
    #[serde(rename = "@fill_value", default)]
    pub fill_value: Option<i32>,
    #[serde(rename = "@saturate_value", default)]
    pub saturate_value: Option<i32>,
    pub file_name: String,
    pub pixel_size: PixelSize,
    #[serde(default)]
    pub radiance: Option<RadianceCalibration>,
}

#[derive(Debug, Deserialize)]
pub struct PixelSize {
    #[serde(rename = "@x")]
    pub x: f64,
    #[serde(rename = "@y")]
    pub y: f64,
}

#[derive(Debug, Deserialize)]
pub struct RadianceCalibration {
    #[serde(rename = "@gain")]
    pub gain: f64,
    #[serde(rename = "@bias")]
    pub bias: f64,
}

/// Scene metadata plus the location of the thermal band
#[derive(Debug, Clone)]
pub struct EspaScene {
    pub metadata: SceneMetadata,
    /// Thermal band file, resolved against the XML directory
    pub thermal_file: PathBuf,
    pub thermal_data_type: RasterDataType,
}

fn parse_acquisition_time(date: &str, time: &str) -> LstResult<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| LstError::Metadata(format!("Invalid acquisition date '{}': {}", date, e)))?;
    let time_text = time.trim().trim_end_matches('Z');
    let time = NaiveTime::parse_from_str(time_text, "%H:%M:%S%.f")
        .map_err(|e| LstError::Metadata(format!("Invalid scene center time '{}': {}", time_text, e)))?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

fn find_corner<'a, T>(corners: &'a [T], location: &str, name: impl Fn(&T) -> &str) -> LstResult<&'a T> {
    corners
        .iter()
        .find(|c| name(c).eq_ignore_ascii_case(location))
        .ok_or_else(|| LstError::Metadata(format!("Missing {} corner", location)))
}

/// Parse ESPA metadata XML; `fallback_id` names the scene when the
/// document carries no product id
pub fn parse_espa_metadata(xml_content: &str, fallback_id: &str) -> LstResult<(SceneMetadata, Band)> {
    let mut document = from_str::<EspaMetadataDocument>(xml_content)
        .map_err(|e| LstError::XmlParsing(format!("Failed to parse ESPA metadata: {}", e)))?;
    let global = document.global_metadata;

    let satellite = Satellite::from_espa_name(&global.satellite)?;
    let acquisition_time = parse_acquisition_time(&global.acquisition_date, &global.scene_center_time)?;

    let ul = find_corner(&global.corners, "UL", |c| c.location.as_str())?;
    let lr = find_corner(&global.corners, "LR", |c| c.location.as_str())?;

    let projection = &global.projection_information;
    if !projection.projection.eq_ignore_ascii_case("UTM") {
        return Err(LstError::Metadata(format!(
            "Unsupported projection {}, UTM required",
            projection.projection
        )));
    }
    let utm_zone = projection
        .utm_proj_params
        .as_ref()
        .map(|p| p.zone_code)
        .ok_or_else(|| LstError::Metadata("Missing UTM zone code".to_string()))?;
    let ul_map = find_corner(&projection.corner_points, "UL", |c| c.location.as_str())?;

    let thermal = satellite
        .thermal_band_names()
        .iter()
        .find_map(|name| document.bands.bands.iter().position(|b| b.name == *name))
        .map(|i| document.bands.bands.swap_remove(i));
    let thermal = match thermal {
        Some(band) => band,
        None => {
            return Err(LstError::Metadata(format!(
                "No thermal band ({}) for {}",
                satellite.thermal_band_names().join(", "),
                satellite
            )))
        }
    };

    let calibration = thermal
        .radiance
        .as_ref()
        .ok_or_else(|| LstError::Metadata(format!("Band {} has no radiance gain/bias", thermal.name)))?;

    let pixel_size = thermal.pixel_size.x;
    // Corner coordinates refer to pixel centres unless the grid origin is a corner
    let half_pixel = match projection.grid_origin.as_deref() {
        Some(origin) if origin.eq_ignore_ascii_case("CORNER") => pixel_size / 2.0,
        _ => 0.0,
    };

    let metadata = SceneMetadata {
        scene_id: global.product_id.clone().unwrap_or_else(|| fallback_id.to_string()),
        satellite,
        instrument: global.instrument.trim().to_string(),
        acquisition_time,
        sun_zenith: global.solar_angles.zenith,
        sun_azimuth: global.solar_angles.azimuth,
        ul_geo_corner: GeoPoint::new(ul.latitude, ul.longitude),
        lr_geo_corner: GeoPoint::new(lr.latitude, lr.longitude),
        ul_map_corner: MapPoint {
            x: ul_map.x + half_pixel,
            y: ul_map.y - half_pixel,
        },
        pixel_size,
        utm_zone,
        lines: thermal.nlines,
        samples: thermal.nsamps,
        thermal: ThermalCalibration {
            gain: calibration.gain,
            bias: calibration.bias,
            fill_value: thermal.fill_value.unwrap_or(0),
            saturate_value: thermal.saturate_value,
        },
    };

    Ok((metadata, thermal))
}

pub fn read_espa_metadata<P: AsRef<Path>>(path: P) -> LstResult<EspaScene> {
    let path = path.as_ref();
    log::info!("Reading scene metadata: {}", path.display());

    let content = std::fs::read_to_string(path)
        .map_err(|e| LstError::Metadata(format!("Can't read {}: {}", path.display(), e)))?;
    let fallback_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scene".to_string());

    let (metadata, thermal) = parse_espa_metadata(&content, &fallback_id)?;
    let directory = path.parent().unwrap_or_else(|| Path::new("."));

    log::info!(
        "Scene {}: {} {}, {} x {} thermal pixels, UTM zone {}",
        metadata.scene_id,
        metadata.satellite,
        metadata.instrument,
        metadata.lines,
        metadata.samples,
        metadata.utm_zone
    );

    Ok(EspaScene {
        metadata,
        thermal_file: directory.join(&thermal.file_name),
        thermal_data_type: thermal.data_type.parse()?,
    })
}
