//! Per-point atmosphere state and its fitted fields.

use rayon::prelude::*;
use thiserror::Error;

use super::config::{ConfigError, InitialConditions, PlanetConstants, SimulationConfig};
use super::grid::{GridProjection, RegularGrid};
use crate::geometry::{SpherePoint, fibonacci_sphere};
use crate::interpolation::{EvalError, FitError, FittedField, SplineSystem};

/// Scale of the Coriolis parameter, `f = CORIOLIS_SCALE · cos θ`.
pub const CORIOLIS_SCALE: f64 = 1e-5;

/// Errors raised by [`AtmosphereState`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Interpolation failed: {0}")]
    Fit(#[from] FitError),
    #[error("Evaluation failed: {0}")]
    Eval(#[from] EvalError),
    #[error("Fields have not been fitted yet")]
    NotFitted,
}

/// Index-aligned per-point arrays.
///
/// Positions and the Coriolis parameter are fixed at construction; only
/// temperature and velocity change during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    pub(crate) lons: Vec<f64>,
    pub(crate) lats: Vec<f64>,
    pub(crate) temps: Vec<f64>,
    pub(crate) us: Vec<f64>,
    pub(crate) vs: Vec<f64>,
    pub(crate) coriolis: Vec<f64>,
}

impl SampleSet {
    /// Places an atmosphere at rest on `points`.
    pub fn from_points(points: &[SpherePoint], initial: &InitialConditions) -> Self {
        let lons: Vec<f64> = points.iter().map(|p| p.lon).collect();
        let lats: Vec<f64> = points.iter().map(|p| p.colat).collect();
        let temps = lats.iter().map(|&t| initial.temperature_at(t)).collect();
        let coriolis = lats.iter().map(|t| CORIOLIS_SCALE * t.cos()).collect();
        let n = lats.len();
        Self {
            lons,
            lats,
            temps,
            us: vec![0.0; n],
            vs: vec![0.0; n],
            coriolis,
        }
    }

    /// Number of sample points.
    pub fn len(&self) -> usize {
        self.lats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lats.is_empty()
    }

    /// Longitudes (rad).
    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    /// Colatitudes (rad).
    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    /// Temperatures (K).
    pub fn temps(&self) -> &[f64] {
        &self.temps
    }

    /// Zonal velocity.
    pub fn us(&self) -> &[f64] {
        &self.us
    }

    /// Meridional velocity.
    pub fn vs(&self) -> &[f64] {
        &self.vs
    }

    /// Coriolis parameter.
    pub fn coriolis(&self) -> &[f64] {
        &self.coriolis
    }

    /// Mean temperature (K); NaN for an empty set.
    pub fn mean_temperature(&self) -> f64 {
        self.temps.iter().sum::<f64>() / self.temps.len() as f64
    }

    /// Returns true if every temperature and velocity is finite.
    pub fn is_finite(&self) -> bool {
        self.temps
            .iter()
            .chain(&self.us)
            .chain(&self.vs)
            .all(|x| x.is_finite())
    }
}

/// The three fields fitted at the start of a step.
#[derive(Debug, Clone)]
pub struct FieldSet {
    pub temperature: FittedField,
    pub zonal: FittedField,
    pub meridional: FittedField,
}

/// Sample arrays plus the interpolants fitted to them.
#[derive(Debug, Clone)]
pub struct AtmosphereState {
    samples: SampleSet,
    constants: PlanetConstants,
    smoothing: f64,
    system: Option<SplineSystem>,
    fields: Option<FieldSet>,
    /// False once the samples have been handed out for mutation after a fit.
    fields_current: bool,
}

impl AtmosphereState {
    /// Samples the sphere, sets the initial conditions and fits the fields.
    pub fn new(constants: PlanetConstants, config: &SimulationConfig) -> Result<Self, StateError> {
        config.validate()?;

        let points = fibonacci_sphere(config.point_count);
        let dropped = config.point_count - points.len();
        if dropped > 0 {
            tracing::debug!(
                requested = config.point_count,
                kept = points.len(),
                "dropped {dropped} sample points inside the polar caps"
            );
        }

        let samples = SampleSet::from_points(&points, &config.initial);
        let mut state = Self::from_samples(samples, constants, config.smoothing)?;
        state.refit_fields()?;
        Ok(state)
    }

    /// Wraps an existing sample set without fitting it.
    ///
    /// Fields become available after the first [`Self::refit_fields`].
    pub fn from_samples(samples: SampleSet, constants: PlanetConstants, smoothing: f64) -> Result<Self, StateError> {
        constants.validate()?;
        if !(smoothing.is_finite() && smoothing >= 0.0) {
            return Err(ConfigError::Smoothing(smoothing).into());
        }
        Ok(Self {
            samples,
            constants,
            smoothing,
            system: None,
            fields: None,
            fields_current: false,
        })
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    pub(crate) fn samples_mut(&mut self) -> &mut SampleSet {
        self.fields_current = false;
        &mut self.samples
    }

    pub fn constants(&self) -> &PlanetConstants {
        &self.constants
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Fields from the most recent refit, if any.
    pub fn fields(&self) -> Option<&FieldSet> {
        self.fields.as_ref()
    }

    /// Returns true if the fields were fitted to the samples as they are now.
    pub fn fields_are_current(&self) -> bool {
        self.fields_current
    }

    /// Mean temperature over the sample points (K).
    pub fn mean_temperature(&self) -> f64 {
        self.samples.mean_temperature()
    }

    /// Fits temperature, zonal and meridional velocity to the current samples.
    ///
    /// The spline system is factorised on first use and reused afterwards,
    /// since sample positions never move. On error nothing is modified.
    pub fn refit_fields(&mut self) -> Result<(), FitError> {
        let system = match self.system.take() {
            Some(system) => system,
            None => SplineSystem::new(&self.samples.lats, &self.samples.lons, self.smoothing)?,
        };
        let fitted = fit_fields(&system, &self.samples);
        self.system = Some(system);
        self.fields = Some(fitted?);
        self.fields_current = true;
        Ok(())
    }

    /// Refits only if the samples changed since the last fit.
    ///
    /// A refit of unchanged samples yields the same fields, so this is
    /// interchangeable with [`Self::refit_fields`].
    pub fn ensure_fields(&mut self) -> Result<(), FitError> {
        if self.fields_current {
            return Ok(());
        }
        self.refit_fields()
    }

    /// `∂field/∂θ / radius` at every sample point.
    pub fn physical_dtheta(&self, field: &FittedField) -> Vec<f64> {
        let radius = self.constants.radius;
        self.samples
            .lats
            .par_iter()
            .zip(self.samples.lons.par_iter())
            .map(|(&theta, &phi)| field.dtheta_at(theta, phi) / radius)
            .collect()
    }

    /// `∂field/∂φ / (radius · sin θ)` at every sample point.
    pub fn physical_dphi(&self, field: &FittedField) -> Vec<f64> {
        let radius = self.constants.radius;
        self.samples
            .lats
            .par_iter()
            .zip(self.samples.lons.par_iter())
            .map(|(&theta, &phi)| field.dphi_at(theta, phi) / (radius * theta.sin()))
            .collect()
    }

    /// `(∂field/∂θ / radius, ∂field/∂φ / (radius · sin θ))` at every sample
    /// point, from one gradient evaluation per point.
    pub fn physical_gradient(&self, field: &FittedField) -> (Vec<f64>, Vec<f64>) {
        let radius = self.constants.radius;
        self.samples
            .lats
            .par_iter()
            .zip(self.samples.lons.par_iter())
            .map(|(&theta, &phi)| {
                let (dtheta, dphi) = field.angular_gradient_at(theta, phi);
                (dtheta / radius, dphi / (radius * theta.sin()))
            })
            .unzip()
    }

    /// Evaluates the current fields on `grid`. Does not modify the state.
    pub fn project_to_grid(&self, grid: &RegularGrid) -> Result<GridProjection, StateError> {
        let fields = self.fields.as_ref().ok_or(StateError::NotFitted)?;
        Ok(GridProjection {
            temperature: grid.project(&fields.temperature)?,
            zonal_velocity: grid.project(&fields.zonal)?,
            meridional_velocity: grid.project(&fields.meridional)?,
        })
    }

    /// Advances the state by one timestep, see [`super::physics::step`].
    pub fn update(&mut self, dt: f64, sun_longitude: f64) -> Result<(), StateError> {
        super::physics::step(self, dt, sun_longitude)
    }
}

fn fit_fields(system: &SplineSystem, samples: &SampleSet) -> Result<FieldSet, FitError> {
    Ok(FieldSet {
        temperature: system.fit(&samples.temps)?,
        zonal: system.fit(&samples.us)?,
        meridional: system.fit(&samples.vs)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn small_config(points: usize) -> SimulationConfig {
        SimulationConfig {
            point_count: points,
            grid_resolution: 4,
            ..Default::default()
        }
    }

    #[test]
    fn new_state_is_at_rest_and_fitted() {
        let state = AtmosphereState::new(PlanetConstants::default(), &small_config(60)).unwrap();
        let s = state.samples();
        assert_eq!(s.len(), s.lons().len());
        assert_eq!(s.len(), s.temps().len());
        assert_eq!(s.len(), s.coriolis().len());
        assert!(s.us().iter().chain(s.vs()).all(|&x| x == 0.0));
        assert!(state.fields().is_some());
        assert!(state.fields_are_current());
        assert!(s.is_finite());
        for (&t, &f) in s.lats().iter().zip(s.coriolis()) {
            assert_relative_eq!(f, 1e-5 * t.cos());
        }
    }

    #[test]
    fn invalid_config_is_rejected_before_sampling() {
        let err = AtmosphereState::new(PlanetConstants::default(), &small_config(0)).unwrap_err();
        assert_eq!(err, StateError::Config(ConfigError::PointCount(0)));
    }

    #[test]
    fn too_few_points_fail_to_fit() {
        let err = AtmosphereState::new(PlanetConstants::default(), &small_config(3)).unwrap_err();
        assert!(matches!(err, StateError::Fit(FitError::InsufficientSamples { .. })));
    }

    #[test]
    fn physical_derivatives_of_rest_state() {
        let state = AtmosphereState::new(PlanetConstants::default(), &small_config(120)).unwrap();
        let fields = state.fields().unwrap();

        // Velocity is zero everywhere, so are its derivatives.
        assert!(state.physical_dtheta(&fields.zonal).iter().all(|d| d.abs() < 1e-12));
        assert!(state.physical_dphi(&fields.meridional).iter().all(|d| d.abs() < 1e-12));

        // T = 270 + 20 sin θ has ∂T/∂θ = 20 cos θ. The smoothed fit tracks it
        // well away from the sample-free polar caps.
        let radius = state.constants().radius;
        let dt = state.physical_dtheta(&fields.temperature);
        let s = state.samples();
        let max_err = s
            .lats()
            .iter()
            .zip(&dt)
            .filter(|&(&t, _)| t > 0.25 * std::f64::consts::PI && t < 0.75 * std::f64::consts::PI)
            .map(|(&t, &d)| (d * radius - 20.0 * t.cos()).abs())
            .fold(0.0, f64::max);
        assert!(max_err < 2.0, "max error {max_err}");
    }

    #[test]
    fn combined_gradient_matches_separate_partials() {
        let state = AtmosphereState::new(PlanetConstants::default(), &small_config(80)).unwrap();
        let field = &state.fields().unwrap().temperature;
        let (dtheta, dphi) = state.physical_gradient(field);
        for (a, b) in dtheta.iter().zip(&state.physical_dtheta(field)) {
            assert_relative_eq!(*a, *b, epsilon = 1e-15, max_relative = 1e-12);
        }
        for (a, b) in dphi.iter().zip(&state.physical_dphi(field)) {
            assert_relative_eq!(*a, *b, epsilon = 1e-15, max_relative = 1e-12);
        }
    }

    #[test]
    fn fields_go_stale_when_samples_are_mutated() {
        let mut state = AtmosphereState::new(PlanetConstants::default(), &small_config(40)).unwrap();
        assert!(state.fields_are_current());
        // No change to the samples, so no refit is needed.
        state.ensure_fields().unwrap();
        assert!(state.fields_are_current());

        state.samples_mut().temps[0] += 5.0;
        assert!(!state.fields_are_current());
        state.ensure_fields().unwrap();
        assert!(state.fields_are_current());

        let fresh = crate::interpolation::fit(
            state.samples().lats(),
            state.samples().lons(),
            state.samples().temps(),
            state.smoothing(),
        )
        .unwrap();
        let (t, p) = (state.samples().lats()[0], state.samples().lons()[0]);
        let fitted = &state.fields().unwrap().temperature;
        assert_relative_eq!(fitted.value_at(t, p), fresh.value_at(t, p), epsilon = 1e-9);
    }

    #[test]
    fn projection_requires_fitted_fields() {
        let points = fibonacci_sphere(30);
        let samples = SampleSet::from_points(&points, &InitialConditions::default());
        let state = AtmosphereState::from_samples(samples, PlanetConstants::default(), 4.0).unwrap();
        let grid = RegularGrid::new(3).unwrap();
        assert_eq!(state.project_to_grid(&grid).unwrap_err(), StateError::NotFitted);
    }

    #[test]
    fn projection_has_grid_shape_and_leaves_state_alone() {
        let state = AtmosphereState::new(PlanetConstants::default(), &small_config(60)).unwrap();
        let before = state.samples().clone();
        let grid = RegularGrid::new(4).unwrap();
        let proj = state.project_to_grid(&grid).unwrap();
        assert_eq!(proj.temperature.shape(), (4, 8));
        assert_eq!(proj.zonal_velocity.shape(), (4, 8));
        assert_eq!(proj.meridional_velocity.shape(), (4, 8));
        assert_eq!(state.samples(), &before);
    }

    #[test]
    fn failed_refit_leaves_state_untouched() {
        let points = [
            SpherePoint::new(0.0, 1.0),
            SpherePoint::new(2.0, 1.5),
            SpherePoint::new(4.0, 2.0),
        ];
        let samples = SampleSet::from_points(&points, &InitialConditions::default());
        let mut state = AtmosphereState::from_samples(samples.clone(), PlanetConstants::default(), 4.0).unwrap();
        assert!(state.refit_fields().is_err());
        assert!(state.ensure_fields().is_err());
        assert!(state.fields().is_none());
        assert!(!state.fields_are_current());
        assert_eq!(state.samples(), &samples);
    }
}
