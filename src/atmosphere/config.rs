//! Planet constants and run configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interpolation::DEFAULT_SMOOTHING;

/// Errors raised when a configuration cannot describe a valid run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Point count must be positive, got {0}")]
    PointCount(usize),
    #[error("Grid resolution must be positive, got {0}")]
    GridResolution(usize),
    #[error("Timestep must be positive and finite, got {0}")]
    Timestep(f64),
    #[error("Day length must be positive and finite, got {0}")]
    DayLength(f64),
    #[error("Planet radius must be positive and finite, got {0}")]
    Radius(f64),
    #[error("Heat capacity must be positive and finite, got {0}")]
    HeatCapacity(f64),
    #[error("Albedo must lie in [0, 1], got {0}")]
    Albedo(f64),
    #[error("Solar constant must be non-negative and finite, got {0}")]
    SolarConstant(f64),
    #[error("Smoothing must be non-negative and finite, got {0}")]
    Smoothing(f64),
}

/// Physical constants of the simulated planet.
///
/// Units: radius in m, heat capacity in J/(m²·K), solar constant in W/m².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetConstants {
    pub radius: f64,
    pub heat_capacity: f64,
    pub albedo: f64,
    pub solar_constant: f64,
}

impl Default for PlanetConstants {
    fn default() -> Self {
        Self {
            radius: 6.4e6,
            heat_capacity: 1e5,
            albedo: 0.3,
            solar_constant: 1370.0,
        }
    }
}

impl PlanetConstants {
    /// Earth-like planet.
    pub fn earth_like() -> Self {
        Self::default()
    }

    /// Same planet with the sun switched off.
    pub fn dark(self) -> Self {
        Self {
            solar_constant: 0.0,
            ..self
        }
    }

    /// Checks that every constant is physically meaningful.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(ConfigError::Radius(self.radius));
        }
        if !(self.heat_capacity.is_finite() && self.heat_capacity > 0.0) {
            return Err(ConfigError::HeatCapacity(self.heat_capacity));
        }
        if !(0.0..=1.0).contains(&self.albedo) {
            return Err(ConfigError::Albedo(self.albedo));
        }
        if !(self.solar_constant.is_finite() && self.solar_constant >= 0.0) {
            return Err(ConfigError::SolarConstant(self.solar_constant));
        }
        Ok(())
    }
}

/// Initial atmosphere: `T = base + equatorial_excess · sin θ`, at rest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialConditions {
    /// Temperature at the poles (K).
    pub base_temperature: f64,
    /// Extra temperature at the equator (K).
    pub equatorial_excess: f64,
}

impl Default for InitialConditions {
    fn default() -> Self {
        Self {
            base_temperature: 270.0,
            equatorial_excess: 20.0,
        }
    }
}

impl InitialConditions {
    /// Same temperature everywhere.
    pub fn uniform(temperature: f64) -> Self {
        Self {
            base_temperature: temperature,
            equatorial_excess: 0.0,
        }
    }

    /// Initial temperature at colatitude `colat`.
    pub fn temperature_at(&self, colat: f64) -> f64 {
        self.base_temperature + self.equatorial_excess * colat.sin()
    }
}

/// Numerical configuration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fibonacci points requested before polar exclusion.
    pub point_count: usize,
    /// Output grid has `resolution` colatitudes by `2 · resolution` longitudes.
    pub grid_resolution: usize,
    /// Timestep (s).
    pub timestep: f64,
    /// Length of one day (s).
    pub day_length: f64,
    /// Spline smoothing factor.
    pub smoothing: f64,
    /// Starting state of the atmosphere.
    pub initial: InitialConditions,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            point_count: 1500,
            grid_resolution: 75,
            timestep: 18.0 * 60.0,
            day_length: 60.0 * 60.0 * 24.0,
            smoothing: DEFAULT_SMOOTHING,
            initial: InitialConditions::default(),
        }
    }
}

impl SimulationConfig {
    /// Length of one year (s).
    pub fn year_length(&self) -> f64 {
        365.25 * self.day_length
    }

    /// Number of timesteps in one day, rounded down.
    pub fn steps_per_day(&self) -> usize {
        (self.day_length / self.timestep).floor() as usize
    }

    /// Checks that the run can be set up.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.point_count == 0 {
            return Err(ConfigError::PointCount(self.point_count));
        }
        if self.grid_resolution == 0 {
            return Err(ConfigError::GridResolution(self.grid_resolution));
        }
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return Err(ConfigError::Timestep(self.timestep));
        }
        if !(self.day_length.is_finite() && self.day_length > 0.0) {
            return Err(ConfigError::DayLength(self.day_length));
        }
        if !(self.smoothing.is_finite() && self.smoothing >= 0.0) {
            return Err(ConfigError::Smoothing(self.smoothing));
        }
        Ok(())
    }
}

/// Planet constants plus run configuration, as read from a JSON file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub planet: PlanetConstants,
    pub simulation: SimulationConfig,
}

impl ModelConfig {
    /// Validates both halves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.planet.validate()?;
        self.simulation.validate()
    }
}
