//! One explicit-Euler timestep: radiative forcing, wind, then advection.
//!
//! The integrator is unconditioned: there is no CFL check and no
//! adaptive step; a timestep that is large compared to the radiative or
//! advective timescales will drive temperatures to non-finite values, and
//! picking a small enough `dt` is the caller's responsibility.

use super::config::PlanetConstants;
use super::state::{AtmosphereState, SampleSet, StateError};

/// Stefan–Boltzmann constant (W·m⁻²·K⁻⁴).
pub const STEFAN_BOLTZMANN: f64 = 5.67e-8;

/// Physical-space derivatives of the fitted fields at every sample point.
///
/// All six are taken from the fields fitted at the start of the step, before
/// any sample value changes.
#[derive(Debug, Clone)]
pub struct FieldGradients {
    pub du_dphi: Vec<f64>,
    pub du_dtheta: Vec<f64>,
    pub dv_dphi: Vec<f64>,
    pub dv_dtheta: Vec<f64>,
    pub dt_dphi: Vec<f64>,
    pub dt_dtheta: Vec<f64>,
}

impl FieldGradients {
    /// Evaluates the derivatives of the state's current fields.
    pub fn from_state(state: &AtmosphereState) -> Result<Self, StateError> {
        let fields = state.fields().ok_or(StateError::NotFitted)?;
        let (du_dtheta, du_dphi) = state.physical_gradient(&fields.zonal);
        let (dv_dtheta, dv_dphi) = state.physical_gradient(&fields.meridional);
        let (dt_dtheta, dt_dphi) = state.physical_gradient(&fields.temperature);
        Ok(Self {
            du_dphi,
            du_dtheta,
            dv_dphi,
            dv_dtheta,
            dt_dphi,
            dt_dtheta,
        })
    }
}

/// Advances `state` by `dt` seconds with the sun above `sun_longitude`.
///
/// Order is fixed:
/// 1. refit temperature, u and v to the current samples, unless the fields
///    already match them;
/// 2. radiative forcing of temperature from the raw sample values;
/// 3. wind update from the step-1 fields;
/// 4. temperature advection from the same step-1 fields.
///
/// Steps 3 and 4 see the fields as they were before step 2 changed the
/// temperature. A failed refit returns early and leaves the samples untouched.
pub fn step(state: &mut AtmosphereState, dt: f64, sun_longitude: f64) -> Result<(), StateError> {
    state.ensure_fields()?;
    let gradients = FieldGradients::from_state(state)?;
    let constants = *state.constants();

    let samples = state.samples_mut();
    apply_radiative_forcing(samples, &constants, dt, sun_longitude);
    update_velocity(samples, &gradients, dt);
    advect_temperature(samples, &gradients, dt);
    Ok(())
}

/// Net radiative heating rate (K/s) of one sample.
///
/// Absorbed sunlight falls off with `sin θ` and with the longitude offset from
/// the subsolar point, and is zero on the night side. Emission is `σT⁴`.
pub fn radiative_tendency(
    temperature: f64,
    colat: f64,
    lon: f64,
    sun_longitude: f64,
    constants: &PlanetConstants,
) -> f64 {
    let insolation = constants.solar_constant
        * (1.0 - constants.albedo)
        * colat.sin().max(0.0)
        * (lon - sun_longitude).sin().max(0.0);
    let emission = STEFAN_BOLTZMANN * temperature.powi(4);
    (insolation - emission) / constants.heat_capacity
}

/// `T += dt · (absorbed − emitted) / C` at every sample.
pub fn apply_radiative_forcing(samples: &mut SampleSet, constants: &PlanetConstants, dt: f64, sun_longitude: f64) {
    for ((t, &colat), &lon) in samples.temps.iter_mut().zip(&samples.lats).zip(&samples.lons) {
        *t += dt * radiative_tendency(*t, colat, lon, sun_longitude, constants);
    }
}

/// Momentum update with self-advection, Coriolis deflection and the
/// temperature gradient as the pressure-like force.
///
/// The zonal component is updated first across all samples; the meridional
/// update then reads the new zonal velocity.
pub fn update_velocity(samples: &mut SampleSet, g: &FieldGradients, dt: f64) {
    let SampleSet { us, vs, coriolis, .. } = samples;

    for (i, u) in us.iter_mut().enumerate() {
        let v = vs[i];
        *u -= dt * (*u * g.du_dphi[i] + v * g.du_dtheta[i] + coriolis[i] * v + g.dt_dphi[i]);
    }
    for (i, v) in vs.iter_mut().enumerate() {
        let u = us[i];
        *v -= dt * (u * g.dv_dphi[i] + *v * g.dv_dtheta[i] - coriolis[i] * u + g.dt_dtheta[i]);
    }
}

/// Temperature transport by the wind.
///
/// Uses the product form `T ∂u/∂φ + u ∂T/∂φ + T ∂v/∂θ + v ∂T/∂θ` with the
/// velocities from [`update_velocity`] and the forced temperature.
pub fn advect_temperature(samples: &mut SampleSet, g: &FieldGradients, dt: f64) {
    let SampleSet { temps, us, vs, .. } = samples;

    for (i, t) in temps.iter_mut().enumerate() {
        let (u, v) = (us[i], vs[i]);
        *t -= dt * (*t * g.du_dphi[i] + u * g.dt_dphi[i] + *t * g.dv_dtheta[i] + v * g.dt_dtheta[i]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmosphere::{InitialConditions, SimulationConfig};
    use crate::geometry::SpherePoint;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn config(points: usize) -> SimulationConfig {
        SimulationConfig {
            point_count: points,
            grid_resolution: 4,
            ..Default::default()
        }
    }

    fn zero_gradients(n: usize) -> FieldGradients {
        FieldGradients {
            du_dphi: vec![0.0; n],
            du_dtheta: vec![0.0; n],
            dv_dphi: vec![0.0; n],
            dv_dtheta: vec![0.0; n],
            dt_dphi: vec![0.0; n],
            dt_dtheta: vec![0.0; n],
        }
    }

    #[test]
    fn night_side_only_radiates() {
        let c = PlanetConstants::default();
        let t = 280.0;
        // lon - sun = -π/2 puts the point at local midnight.
        let night = radiative_tendency(t, FRAC_PI_2, 0.0, FRAC_PI_2, &c);
        assert_relative_eq!(night, -STEFAN_BOLTZMANN * t.powi(4) / c.heat_capacity);
    }

    #[test]
    fn subsolar_point_absorbs_full_sunlight() {
        let c = PlanetConstants::default();
        // sin(lon - sun) = 1 when lon = sun + π/2.
        let day = radiative_tendency(0.0, FRAC_PI_2, FRAC_PI_2, 0.0, &c);
        assert_relative_eq!(day, c.solar_constant * (1.0 - c.albedo) / c.heat_capacity);
    }

    #[test]
    fn radiative_forcing_is_explicit_euler() {
        let points = [SpherePoint::new(FRAC_PI_2, FRAC_PI_2), SpherePoint::new(4.0, 1.0)];
        let mut samples = SampleSet::from_points(&points, &InitialConditions::uniform(260.0));
        let c = PlanetConstants::default();
        let dt = 600.0;
        let expected: Vec<f64> = points
            .iter()
            .map(|p| 260.0 + dt * radiative_tendency(260.0, p.colat, p.lon, 0.0, &c))
            .collect();
        apply_radiative_forcing(&mut samples, &c, dt, 0.0);
        for (t, e) in samples.temps().iter().zip(&expected) {
            assert_relative_eq!(*t, *e);
        }
    }

    #[test]
    fn dark_planet_forcing_never_warms() {
        let points = crate::geometry::fibonacci_sphere(50);
        let mut samples = SampleSet::from_points(&points, &InitialConditions::default());
        let c = PlanetConstants::default().dark();
        for k in 0..20 {
            let before = samples.temps().to_vec();
            apply_radiative_forcing(&mut samples, &c, 1080.0, k as f64);
            assert!(samples.temps().iter().zip(&before).all(|(a, b)| a <= b));
        }
    }

    #[test]
    fn meridional_update_sees_new_zonal_velocity() {
        let points = [SpherePoint::new(1.0, 1.0)];
        let mut samples = SampleSet::from_points(&points, &InitialConditions::uniform(280.0));
        let mut g = zero_gradients(1);
        g.dt_dphi[0] = 1e-3;
        let dt = 10.0;
        update_velocity(&mut samples, &g, dt);

        let f = samples.coriolis()[0];
        let u = -dt * 1e-3;
        assert_relative_eq!(samples.us()[0], u);
        // v starts at rest, so it only moves through the Coriolis term on the new u.
        assert_relative_eq!(samples.vs()[0], dt * f * u);
    }

    #[test]
    fn advection_uses_product_form() {
        let points = [SpherePoint::new(1.0, 1.0)];
        let mut samples = SampleSet::from_points(&points, &InitialConditions::uniform(300.0));
        samples.us[0] = 2.0;
        samples.vs[0] = -1.0;
        let mut g = zero_gradients(1);
        g.du_dphi[0] = 1e-6;
        g.dt_dphi[0] = 2e-6;
        g.dv_dtheta[0] = 3e-6;
        g.dt_dtheta[0] = 4e-6;
        let dt = 5.0;
        advect_temperature(&mut samples, &g, dt);

        let expected = 300.0 - dt * (300.0 * 1e-6 + 2.0 * 2e-6 + 300.0 * 3e-6 - 1.0 * 4e-6);
        assert_relative_eq!(samples.temps()[0], expected);
    }

    #[test]
    fn dark_planet_step_never_warms() {
        let constants = PlanetConstants::default().dark();
        let mut state = AtmosphereState::new(constants, &config(40)).unwrap();
        for k in 0..4 {
            let before = state.samples().temps().to_vec();
            step(&mut state, 1080.0, k as f64 * 0.1).unwrap();
            let after = state.samples().temps();
            assert!(
                after.iter().zip(&before).all(|(a, b)| a <= b),
                "step {k} warmed a sample"
            );
        }
    }

    #[test]
    fn step_uses_fields_fitted_before_forcing() {
        let mut state = AtmosphereState::new(PlanetConstants::default(), &config(40)).unwrap();
        let mut expected = state.samples().clone();

        // Replay the step by hand with the pre-step fields.
        let mut probe = state.clone();
        probe.refit_fields().unwrap();
        let g = FieldGradients::from_state(&probe).unwrap();
        let c = *probe.constants();
        apply_radiative_forcing(&mut expected, &c, 1080.0, 0.3);
        update_velocity(&mut expected, &g, 1080.0);
        advect_temperature(&mut expected, &g, 1080.0);

        step(&mut state, 1080.0, 0.3).unwrap();
        assert_eq!(state.samples(), &expected);
    }

    #[test]
    fn failed_step_leaves_samples_untouched() {
        let points = [
            SpherePoint::new(0.0, 1.0),
            SpherePoint::new(2.0, 1.5),
            SpherePoint::new(4.0, 2.0),
        ];
        let samples = SampleSet::from_points(&points, &InitialConditions::default());
        let mut state = AtmosphereState::from_samples(samples.clone(), PlanetConstants::default(), 4.0).unwrap();
        let err = state.update(1080.0, 0.0).unwrap_err();
        assert!(matches!(err, StateError::Fit(_)));
        assert_eq!(state.samples(), &samples);
    }
}
