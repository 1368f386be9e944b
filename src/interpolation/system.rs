//! Factorised smoothing-spline system for a fixed set of sample locations.

use std::sync::Arc;

use glam::DVec3;
use nalgebra::{DMatrix, DVector, Dyn, Matrix3, linalg::LU};
use rayon::prelude::*;
use thiserror::Error;

use super::field::FittedField;
use super::kernel::{AFFINE_TERMS, affine_basis, kernel};
use crate::geometry::unit_vector;

/// Smoothing used when the caller does not choose one.
pub const DEFAULT_SMOOTHING: f64 = 4.0;

/// Minimum number of unique locations; one per affine term.
pub const MIN_SAMPLES: usize = AFFINE_TERMS;

/// Chord distance below which two samples count as the same location.
const COINCIDENT_TOLERANCE: f64 = 1e-9;

/// Relative spread below which the samples are considered to share one plane.
const COPLANAR_TOLERANCE: f64 = 1e-10;

/// Errors raised while building a spline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Insufficient samples: {found} unique locations, at least {required} required")]
    InsufficientSamples { found: usize, required: usize },
    #[error("Samples {first} and {second} share the same location")]
    CoincidentSamples { first: usize, second: usize },
    #[error("All sample locations lie on a single circle of the sphere")]
    CoplanarSamples,
    #[error("Length mismatch: {lats} colatitudes, {lons} longitudes, {values} values")]
    LengthMismatch { lats: usize, lons: usize, values: usize },
    #[error("Invalid smoothing factor: {0} (must be finite and non-negative)")]
    InvalidSmoothing(f64),
    #[error("Spline system is singular")]
    SingularSystem,
}

/// The LU-factorised smoothing system for one set of sample locations.
///
/// The left-hand side
///
/// ```text
/// | K + λI   P |
/// | Pᵀ       0 |
/// ```
///
/// only depends on the positions and on `λ = smoothing / n`, so it is built and
/// factorised once. Fitting a new set of values is then a single
/// back-substitution, and gives exactly the spline a fresh build would.
#[derive(Debug, Clone)]
pub struct SplineSystem {
    centers: Arc<[DVec3]>,
    smoothing: f64,
    lu: LU<f64, Dyn, Dyn>,
}

impl SplineSystem {
    /// Builds and factorises the system for the given sample locations.
    ///
    /// # Arguments
    /// * `lats` - Sample colatitudes in radians
    /// * `lons` - Sample longitudes in radians, index-aligned with `lats`
    /// * `smoothing` - Non-negative smoothing factor; `0` interpolates exactly
    ///
    /// # Errors
    /// Returns a [`FitError`] when the geometry cannot support a unique spline:
    /// fewer than [`MIN_SAMPLES`] distinct locations, repeated locations, or all
    /// locations on one circle.
    pub fn new(lats: &[f64], lons: &[f64], smoothing: f64) -> Result<Self, FitError> {
        if lats.len() != lons.len() {
            return Err(FitError::LengthMismatch {
                lats: lats.len(),
                lons: lons.len(),
                values: lats.len(),
            });
        }
        if !smoothing.is_finite() || smoothing < 0.0 {
            return Err(FitError::InvalidSmoothing(smoothing));
        }

        let centers: Vec<DVec3> = lats
            .iter()
            .zip(lons)
            .map(|(&theta, &phi)| unit_vector(theta, phi))
            .collect();

        check_unique(&centers)?;
        check_not_coplanar(&centers)?;

        let n = centers.len();
        let lambda = smoothing / n as f64;
        let size = n + AFFINE_TERMS;

        // Kernel columns are independent; the matrix is symmetric.
        let columns: Vec<Vec<f64>> = centers
            .par_iter()
            .map(|cj| centers.iter().map(|ci| kernel(ci.distance(*cj))).collect())
            .collect();

        let mut a = DMatrix::<f64>::zeros(size, size);
        for (j, column) in columns.iter().enumerate() {
            for (i, &k) in column.iter().enumerate() {
                a[(i, j)] = k;
            }
            a[(j, j)] += lambda;
        }
        for (i, c) in centers.iter().enumerate() {
            for (t, p) in affine_basis(*c).into_iter().enumerate() {
                a[(i, n + t)] = p;
                a[(n + t, i)] = p;
            }
        }

        let lu = a.lu();
        if !lu.is_invertible() {
            return Err(FitError::SingularSystem);
        }

        Ok(Self {
            centers: centers.into(),
            smoothing,
            lu,
        })
    }

    /// Number of sample locations.
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    /// Returns true if the system has no samples (never true for a built system).
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// The smoothing factor this system was built with.
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Fits one field to `values` sampled at this system's locations.
    pub fn fit(&self, values: &[f64]) -> Result<FittedField, FitError> {
        let n = self.len();
        if values.len() != n {
            return Err(FitError::LengthMismatch {
                lats: n,
                lons: n,
                values: values.len(),
            });
        }

        let mut rhs = Vec::with_capacity(n + AFFINE_TERMS);
        rhs.extend_from_slice(values);
        rhs.extend_from_slice(&[0.0; AFFINE_TERMS]);
        let rhs = DVector::from_vec(rhs);

        let solution = self.lu.solve(&rhs).ok_or(FitError::SingularSystem)?;
        let weights: Vec<f64> = solution.iter().take(n).copied().collect();
        let mut affine = [0.0; AFFINE_TERMS];
        for (t, a) in affine.iter_mut().enumerate() {
            *a = solution[n + t];
        }

        Ok(FittedField::new(
            Arc::clone(&self.centers),
            weights,
            affine,
            self.smoothing,
        ))
    }
}

/// Fits a smoothing spline to scattered samples in one call.
///
/// Equivalent to `SplineSystem::new(lats, lons, smoothing)?.fit(values)`.
pub fn fit(lats: &[f64], lons: &[f64], values: &[f64], smoothing: f64) -> Result<FittedField, FitError> {
    if values.len() != lats.len() || lats.len() != lons.len() {
        return Err(FitError::LengthMismatch {
            lats: lats.len(),
            lons: lons.len(),
            values: values.len(),
        });
    }
    SplineSystem::new(lats, lons, smoothing)?.fit(values)
}

/// Rejects point sets with too few distinct locations or with repeats.
fn check_unique(centers: &[DVec3]) -> Result<(), FitError> {
    let tol_sq = COINCIDENT_TOLERANCE * COINCIDENT_TOLERANCE;
    let mut unique = 0;
    let mut first_repeat = None;

    for (i, ci) in centers.iter().enumerate() {
        match centers[..i].iter().position(|cj| ci.distance_squared(*cj) < tol_sq) {
            Some(j) => {
                first_repeat.get_or_insert((j, i));
            }
            None => unique += 1,
        }
    }

    if unique < MIN_SAMPLES {
        return Err(FitError::InsufficientSamples {
            found: unique,
            required: MIN_SAMPLES,
        });
    }
    if let Some((first, second)) = first_repeat {
        return Err(FitError::CoincidentSamples { first, second });
    }
    Ok(())
}

/// Rejects point sets lying on one plane, i.e. on one circle of the sphere.
///
/// Such sets cannot pin down the affine part of the spline.
fn check_not_coplanar(centers: &[DVec3]) -> Result<(), FitError> {
    let n = centers.len() as f64;
    let centroid = centers.iter().copied().sum::<DVec3>() / n;

    let mut cov = Matrix3::<f64>::zeros();
    for c in centers {
        let d = *c - centroid;
        let d = [d.x, d.y, d.z];
        for r in 0..3 {
            for s in 0..3 {
                cov[(r, s)] += d[r] * d[s];
            }
        }
    }

    let eig = cov.symmetric_eigenvalues();
    let max = eig.max();
    let min = eig.min();
    if max <= 0.0 || min <= COPLANAR_TOLERANCE * max {
        return Err(FitError::CoplanarSamples);
    }
    Ok(())
}
