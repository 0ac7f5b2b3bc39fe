//! Raw little-endian raster bands

use crate::types::{LstError, LstResult};
use ndarray::Array2;
use std::path::Path;
use std::str::FromStr;

/// Sample type of a raw band file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterDataType {
    UInt8,
    Int16,
    UInt16,
    Float32,
}

impl RasterDataType {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            RasterDataType::UInt8 => 1,
            RasterDataType::Int16 | RasterDataType::UInt16 => 2,
            RasterDataType::Float32 => 4,
        }
    }
}

/// Accepts ESPA names (`INT16`) and lower-case forms (`int16`)
impl FromStr for RasterDataType {
    type Err = LstError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "uint8" => Ok(RasterDataType::UInt8),
            "int16" => Ok(RasterDataType::Int16),
            "uint16" => Ok(RasterDataType::UInt16),
            "float32" => Ok(RasterDataType::Float32),
            other => Err(LstError::Metadata(format!("Unsupported raster data type: {}", other))),
        }
    }
}

/// Decode a raw band of `lines x samples` into floating point
pub fn decode_raw_band(bytes: &[u8], lines: usize, samples: usize, data_type: RasterDataType) -> LstResult<Array2<f32>> {
    let expected = lines * samples * data_type.bytes_per_sample();
    if bytes.len() != expected {
        return Err(LstError::Processing(format!(
            "Raster holds {} bytes, {} x {} {:?} needs {}",
            bytes.len(),
            lines,
            samples,
            data_type,
            expected
        )));
    }

    let values: Vec<f32> = match data_type {
        RasterDataType::UInt8 => bytes.iter().map(|&b| b as f32).collect(),
        RasterDataType::Int16 => bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32)
            .collect(),
        RasterDataType::UInt16 => bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]) as f32)
            .collect(),
        RasterDataType::Float32 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    };

    Array2::from_shape_vec((lines, samples), values)
        .map_err(|e| LstError::Processing(format!("Failed to shape raster: {}", e)))
}

pub fn read_raw_band<P: AsRef<Path>>(
    path: P,
    lines: usize,
    samples: usize,
    data_type: RasterDataType,
) -> LstResult<Array2<f32>> {
    let path = path.as_ref();
    log::debug!("Reading {:?} band {} ({} x {})", data_type, path.display(), lines, samples);
    let bytes = std::fs::read(path)?;
    decode_raw_band(&bytes, lines, samples, data_type)
        .map_err(|e| LstError::Processing(format!("{}: {}", path.display(), e)))
}

pub fn write_raw_band_f32<P: AsRef<Path>>(path: P, band: &Array2<f32>) -> LstResult<()> {
    let bytes: Vec<u8> = band.iter().flat_map(|v| v.to_le_bytes()).collect();
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn write_raw_band_u8<P: AsRef<Path>>(path: P, band: &Array2<u8>) -> LstResult<()> {
    let bytes: Vec<u8> = band.iter().copied().collect();
    std::fs::write(path, bytes)?;
    Ok(())
}
