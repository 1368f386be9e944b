//! Evaluation of a fitted spherical spline.

use std::sync::Arc;

use glam::DVec3;
use rayon::prelude::*;
use thiserror::Error;

use super::kernel::{AFFINE_TERMS, kernel, kernel_gradient};
use crate::geometry::{d_dphi, d_dtheta, unit_vector};

/// How evaluation coordinates are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// `lats[i]` is paired with `lons[i]`; both slices must be the same length.
    Scattered,
    /// Every `lats[i]` is combined with every `lons[j]`.
    ///
    /// Output is row-major with one row per colatitude: index `i * lons.len() + j`.
    Grid,
}

/// Errors raised while evaluating a fitted field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("Scattered evaluation needs paired coordinates: {lats} colatitudes, {lons} longitudes")]
    LengthMismatch { lats: usize, lons: usize },
}

/// A smooth field fitted to one snapshot of scattered samples.
///
/// The field is `g(x) = Σ wⱼ |x − xⱼ|³ + a₀ + a₁x + a₂y + a₃z` for unit
/// vectors `x`. Angular derivatives are the ambient gradient projected on the
/// coordinate tangents, so they are exact for the fitted function.
#[derive(Debug, Clone)]
pub struct FittedField {
    centers: Arc<[DVec3]>,
    weights: Vec<f64>,
    affine: [f64; AFFINE_TERMS],
    smoothing: f64,
}

impl FittedField {
    pub(super) fn new(
        centers: Arc<[DVec3]>,
        weights: Vec<f64>,
        affine: [f64; AFFINE_TERMS],
        smoothing: f64,
    ) -> Self {
        Self {
            centers,
            weights,
            affine,
            smoothing,
        }
    }

    /// Number of samples the field was fitted to.
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    /// Returns true if the field carries no samples.
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Smoothing factor used for the fit.
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Field value at colatitude `theta`, longitude `phi`.
    pub fn value_at(&self, theta: f64, phi: f64) -> f64 {
        let x = unit_vector(theta, phi);
        let [a0, a1, a2, a3] = self.affine;
        let radial: f64 = self
            .centers
            .iter()
            .zip(&self.weights)
            .map(|(c, w)| w * kernel(x.distance(*c)))
            .sum();
        radial + a0 + a1 * x.x + a2 * x.y + a3 * x.z
    }

    /// Gradient of the field's ambient extension at the unit vector `x`.
    fn ambient_gradient(&self, x: DVec3) -> DVec3 {
        let [_, a1, a2, a3] = self.affine;
        let radial: DVec3 = self
            .centers
            .iter()
            .zip(&self.weights)
            .map(|(c, w)| *w * kernel_gradient(x, *c))
            .sum();
        radial + DVec3::new(a1, a2, a3)
    }

    /// `∂g/∂θ` at colatitude `theta`, longitude `phi`.
    pub fn dtheta_at(&self, theta: f64, phi: f64) -> f64 {
        self.ambient_gradient(unit_vector(theta, phi))
            .dot(d_dtheta(theta, phi))
    }

    /// `∂g/∂φ` at colatitude `theta`, longitude `phi`.
    pub fn dphi_at(&self, theta: f64, phi: f64) -> f64 {
        self.ambient_gradient(unit_vector(theta, phi))
            .dot(d_dphi(theta, phi))
    }

    /// Both angular partials `(∂g/∂θ, ∂g/∂φ)` from one gradient evaluation.
    pub fn angular_gradient_at(&self, theta: f64, phi: f64) -> (f64, f64) {
        let g = self.ambient_gradient(unit_vector(theta, phi));
        (g.dot(d_dtheta(theta, phi)), g.dot(d_dphi(theta, phi)))
    }

    /// Evaluates the field.
    ///
    /// # Arguments
    /// * `lats` - Colatitudes in radians
    /// * `lons` - Longitudes in radians
    /// * `mode` - Pairing of the two coordinate slices, see [`EvalMode`]
    pub fn evaluate(&self, lats: &[f64], lons: &[f64], mode: EvalMode) -> Result<Vec<f64>, EvalError> {
        sample(lats, lons, mode, |t, p| self.value_at(t, p))
    }

    /// Evaluates `∂g/∂θ` with the same coordinate semantics as [`Self::evaluate`].
    pub fn evaluate_dtheta(&self, lats: &[f64], lons: &[f64], mode: EvalMode) -> Result<Vec<f64>, EvalError> {
        sample(lats, lons, mode, |t, p| self.dtheta_at(t, p))
    }

    /// Evaluates `∂g/∂φ` with the same coordinate semantics as [`Self::evaluate`].
    pub fn evaluate_dphi(&self, lats: &[f64], lons: &[f64], mode: EvalMode) -> Result<Vec<f64>, EvalError> {
        sample(lats, lons, mode, |t, p| self.dphi_at(t, p))
    }
}

fn sample<F>(lats: &[f64], lons: &[f64], mode: EvalMode, f: F) -> Result<Vec<f64>, EvalError>
where
    F: Fn(f64, f64) -> f64 + Sync,
{
    match mode {
        EvalMode::Scattered => {
            if lats.len() != lons.len() {
                return Err(EvalError::LengthMismatch {
                    lats: lats.len(),
                    lons: lons.len(),
                });
            }
            Ok(lats
                .par_iter()
                .zip(lons.par_iter())
                .map(|(&t, &p)| f(t, p))
                .collect())
        }
        EvalMode::Grid => {
            let cols = lons.len();
            Ok((0..lats.len() * cols)
                .into_par_iter()
                .map(|k| f(lats[k / cols], lons[k % cols]))
                .collect())
        }
    }
}
