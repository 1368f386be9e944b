//! Regular longitude/colatitude mesh used for output snapshots.

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::geometry::linspace;
use crate::interpolation::{EvalError, EvalMode, FittedField};

/// A row-major 2D array, one row per colatitude.
///
/// Serialises as nested rows. Non-finite values are written as `null` and
/// read back as NaN, so diverged runs survive a JSON round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "NestedRows", try_from = "NestedRows")]
pub struct GridField {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl GridField {
    /// Wraps `values` laid out row by row.
    ///
    /// Returns `None` if `values.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, values: Vec<f64>) -> Option<Self> {
        (values.len() == rows * cols).then_some(Self { rows, cols, values })
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Flat row-major values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at `(row, col)`, if in range.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.values[row * self.cols + col])
    }

    /// One row of the grid, if in range.
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        (row < self.rows).then(|| &self.values[row * self.cols..(row + 1) * self.cols])
    }

    /// Copies the grid into nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows)
            .map(|r| self.values[r * self.cols..(r + 1) * self.cols].to_vec())
            .collect()
    }

    /// `(min, max)` over all values, ignoring NaN. `None` for an empty grid.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Wire form of a [`GridField`]: one array per row, `null` for non-finite values.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct NestedRows(Vec<Vec<Option<f64>>>);

impl From<GridField> for NestedRows {
    fn from(grid: GridField) -> Self {
        let rows = (0..grid.rows)
            .map(|r| {
                grid.values[r * grid.cols..(r + 1) * grid.cols]
                    .iter()
                    .map(|v| v.is_finite().then_some(*v))
                    .collect()
            })
            .collect();
        NestedRows(rows)
    }
}

impl TryFrom<NestedRows> for GridField {
    type Error = String;

    fn try_from(nested: NestedRows) -> Result<Self, Self::Error> {
        let rows = nested.0.len();
        let cols = nested.0.first().map_or(0, Vec::len);
        if let Some(r) = nested.0.iter().position(|row| row.len() != cols) {
            return Err(format!(
                "ragged grid: row {r} has {} values, expected {cols}",
                nested.0[r].len()
            ));
        }
        let values = nested
            .0
            .into_iter()
            .flatten()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        GridField::from_vec(rows, cols, values).ok_or_else(|| format!("grid is not {rows} x {cols}"))
    }
}

/// Temperature and wind components evaluated on a [`RegularGrid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridProjection {
    pub temperature: GridField,
    pub zonal_velocity: GridField,
    pub meridional_velocity: GridField,
}

/// Fixed mesh of `resolution` colatitudes in `[0, π]` by `2 · resolution`
/// longitudes in `[0, 2π]`, both ends included.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularGrid {
    lats: Vec<f64>,
    lons: Vec<f64>,
}

impl RegularGrid {
    /// Builds the mesh for the given resolution.
    pub fn new(resolution: usize) -> Result<Self, ConfigError> {
        if resolution == 0 {
            return Err(ConfigError::GridResolution(resolution));
        }
        Ok(Self {
            lats: linspace(0.0, PI, resolution),
            lons: linspace(0.0, TAU, 2 * resolution),
        })
    }

    /// Colatitude of each row.
    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    /// Longitude of each column.
    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    /// `(lat_count, lon_count)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.lats.len(), self.lons.len())
    }

    /// Colatitude at every mesh node.
    pub fn lat_mesh(&self) -> GridField {
        let cols = self.lons.len();
        let values = self
            .lats
            .iter()
            .flat_map(|&t| std::iter::repeat(t).take(cols))
            .collect();
        GridField {
            rows: self.lats.len(),
            cols,
            values,
        }
    }

    /// Longitude at every mesh node.
    pub fn lon_mesh(&self) -> GridField {
        let values = self
            .lats
            .iter()
            .flat_map(|_| self.lons.iter().copied())
            .collect();
        GridField {
            rows: self.lats.len(),
            cols: self.lons.len(),
            values,
        }
    }

    /// Evaluates `field` at every mesh node.
    pub fn project(&self, field: &FittedField) -> Result<GridField, EvalError> {
        let values = field.evaluate(&self.lats, &self.lons, EvalMode::Grid)?;
        Ok(GridField {
            rows: self.lats.len(),
            cols: self.lons.len(),
            values,
        })
    }
}
