//! Atmosphere model: configuration, per-point state, physics and the output grid.
//!
//! Each timestep refits smooth fields to the samples, then applies radiative
//! forcing, a wind update and temperature advection in that order.

mod config;
mod grid;
mod physics;
mod state;

pub use config::{ConfigError, InitialConditions, ModelConfig, PlanetConstants, SimulationConfig};
pub use grid::{GridField, GridProjection, RegularGrid};
pub use physics::{
    FieldGradients, STEFAN_BOLTZMANN, advect_temperature, apply_radiative_forcing, radiative_tendency, step,
    update_velocity,
};
pub use state::{AtmosphereState, CORIOLIS_SCALE, FieldSet, SampleSet, StateError};
