use crate::core::grid::{ElevationBands, ReanalysisGrid};
use crate::types::{AtmosphericParameters, LstError, LstResult};
use ndarray::Array2;
use std::fmt::Write as _;
use std::path::Path;

/// Reduced atmospheric parameters indexed by (grid point, elevation band).
///
/// Cells are written once during reduction and read-only afterwards.
#[derive(Debug, Clone)]
pub struct PointParameterTable {
    cells: Array2<Option<AtmosphericParameters>>,
}

impl PointParameterTable {
    pub fn new(num_points: usize, num_bands: usize) -> Self {
        Self {
            cells: Array2::from_elem((num_points, num_bands), None),
        }
    }

    pub fn num_points(&self) -> usize {
        self.cells.nrows()
    }

    pub fn num_bands(&self) -> usize {
        self.cells.ncols()
    }

    pub fn insert(&mut self, point: usize, band: usize, params: AtmosphericParameters) -> LstResult<()> {
        let (num_points, num_bands) = self.cells.dim();
        let cell = self.cells.get_mut((point, band)).ok_or_else(|| {
            LstError::Processing(format!(
                "Parameter cell ({}, {}) outside table of {} points x {} bands",
                point, band, num_points, num_bands
            ))
        })?;

        if cell.is_some() {
            return Err(LstError::Processing(format!(
                "Parameters for point {}, band {} written twice",
                point, band
            )));
        }
        *cell = Some(params);
        Ok(())
    }

    pub fn get(&self, point: usize, band: usize) -> Option<AtmosphericParameters> {
        self.cells.get((point, band)).copied().flatten()
    }

    /// Populated cell, or `MissingParameters`
    pub fn require(&self, point: usize, band: usize) -> LstResult<AtmosphericParameters> {
        self.get(point, band)
            .ok_or(LstError::MissingParameters { point, band })
    }

    /// Every band of every listed point must be populated
    pub fn check_points<I: IntoIterator<Item = usize>>(&self, points: I) -> LstResult<()> {
        for point in points {
            for band in 0..self.num_bands() {
                self.require(point, band)?;
            }
        }
        Ok(())
    }

    pub fn populated(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// `atmospheric_parameters.txt`: latitude, longitude, height (km),
    /// transmission, upwelled and downwelled radiance per populated cell
    pub fn write_text<P: AsRef<Path>>(&self, path: P, grid: &ReanalysisGrid, bands: &ElevationBands) -> LstResult<()> {
        let mut content = String::new();

        for point in grid.points() {
            for band in 0..bands.len() {
                if let Some(p) = self.get(point.index, band) {
                    let _ = writeln!(
                        content,
                        "{:.3} {:.3} {:.3} {:.6} {:.6} {:.6}",
                        point.location.latitude,
                        point.location.longitude,
                        bands.height(band),
                        p.transmission,
                        p.upwelled_radiance,
                        p.downwelled_radiance
                    );
                }
            }
        }

        log::debug!("Writing parameter table: {}", path.as_ref().display());
        std::fs::write(path, content)?;
        Ok(())
    }
}
