//! Adapters for external inputs and outputs

pub mod metadata;
pub mod narr;
pub mod raster;
pub mod spectral;

pub use metadata::{read_espa_metadata, EspaScene};
pub use narr::{read_narr_coordinates, AtmosphericProfile, NarrProfileSource, ProfileLayer, ProfileSource};
pub use raster::{read_raw_band, write_raw_band_f32, write_raw_band_u8, RasterDataType};
pub use spectral::{SpectralResponse, SpectralTable};
