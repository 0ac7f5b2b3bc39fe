//! Core LST processing modules

pub mod grid;
pub mod interpolate;
pub mod modtran_input;
pub mod parameters;
pub mod planck;
pub mod reduce;
pub mod simulator;
pub mod utm;

// Re-export main types
pub use grid::{BandBracket, ElevationBands, GridPoint, ReanalysisCoordinates, ReanalysisGrid};
pub use interpolate::{quality, CellPosition, GridLocator, LstProduct, PixelFailure, PixelInterpolator, PixelParameters};
pub use modtran_input::{CaseGenerator, CaseSet, SimulationCase, SimulationRun, SurfaceVariant};
pub use parameters::PointParameterTable;
pub use reduce::{CaseSpectra, SpectralReducer};
pub use simulator::{ProcessLauncher, ProcessOutcome, RetryPolicy, SimulationRunner, SimulatorCommand, SystemLauncher};
