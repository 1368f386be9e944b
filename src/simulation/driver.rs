//! Epoch loop: advances the clock and the sun, steps the atmosphere and
//! records one snapshot per epoch.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::atmosphere::{
    AtmosphereState, ConfigError, GridField, PlanetConstants, RegularGrid, SimulationConfig, StateError,
};

/// Errors raised while setting up or running a simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to build initial state: {0}")]
    State(#[from] StateError),
    #[error("Epoch {epoch} failed: {source}")]
    Epoch {
        epoch: usize,
        #[source]
        source: StateError,
    },
}

/// Regular-grid view of the atmosphere after one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub epoch_index: usize,
    /// Colatitude at each grid node.
    pub lat_grid: GridField,
    /// Longitude at each grid node.
    pub lon_grid: GridField,
    pub temperature: GridField,
    pub zonal_velocity: GridField,
    pub meridional_velocity: GridField,
    /// Elapsed time at the start of the epoch, e.g. `"1.25 days"`.
    pub time_label: String,
}

/// Formats an elapsed time in days with two decimals.
pub fn time_label(elapsed: f64, day_length: f64) -> String {
    format!("{:.2} days", elapsed / day_length)
}

/// One atmosphere plus the simulation clock.
#[derive(Debug, Clone)]
pub struct Simulation {
    state: AtmosphereState,
    grid: RegularGrid,
    lat_mesh: GridField,
    lon_mesh: GridField,
    timestep: f64,
    day_length: f64,
    epoch: usize,
    elapsed: f64,
    sun_longitude: f64,
    warned_non_finite: bool,
}

impl Simulation {
    /// Validates the inputs, samples the sphere and fits the initial fields.
    ///
    /// Nothing is sampled or fitted if the configuration is invalid.
    pub fn new(constants: &PlanetConstants, config: &SimulationConfig) -> Result<Self, SimulationError> {
        constants.validate()?;
        config.validate()?;

        let grid = RegularGrid::new(config.grid_resolution)?;
        let state = AtmosphereState::new(*constants, config)?;
        Ok(Self {
            lat_mesh: grid.lat_mesh(),
            lon_mesh: grid.lon_mesh(),
            grid,
            state,
            timestep: config.timestep,
            day_length: config.day_length,
            epoch: 0,
            elapsed: 0.0,
            sun_longitude: 0.0,
            warned_non_finite: false,
        })
    }

    /// Number of epochs completed so far.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Simulated time since the start (s).
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Longitude of the subsolar point (rad). Grows without wrapping.
    pub fn sun_longitude(&self) -> f64 {
        self.sun_longitude
    }

    pub fn state(&self) -> &AtmosphereState {
        &self.state
    }

    pub fn grid(&self) -> &RegularGrid {
        &self.grid
    }

    /// Runs one epoch and returns its snapshot.
    ///
    /// The clock and the sun only advance if the epoch succeeds.
    pub fn step(&mut self) -> Result<Snapshot, SimulationError> {
        let epoch = self.epoch;
        let wrap = |source| SimulationError::Epoch { epoch, source };

        self.state.update(self.timestep, self.sun_longitude).map_err(wrap)?;
        // Snapshots show the post-step samples; the next update reuses this fit.
        self.state
            .ensure_fields()
            .map_err(|e| wrap(StateError::from(e)))?;
        let projection = self.state.project_to_grid(&self.grid).map_err(wrap)?;

        let snapshot = Snapshot {
            epoch_index: epoch,
            lat_grid: self.lat_mesh.clone(),
            lon_grid: self.lon_mesh.clone(),
            temperature: projection.temperature,
            zonal_velocity: projection.zonal_velocity,
            meridional_velocity: projection.meridional_velocity,
            time_label: time_label(self.elapsed, self.day_length),
        };

        let mean_temperature = self.state.mean_temperature();
        tracing::debug!(
            epoch,
            days = self.elapsed / self.day_length,
            mean_temperature,
            "epoch complete"
        );
        if !self.warned_non_finite && !self.state.samples().is_finite() {
            self.warned_non_finite = true;
            tracing::warn!(
                epoch,
                timestep = self.timestep,
                "atmosphere contains non-finite values; the timestep is likely too large"
            );
        }

        self.sun_longitude += self.timestep * TAU / self.day_length;
        self.elapsed += self.timestep;
        self.epoch += 1;
        Ok(snapshot)
    }

    /// Runs `epochs` epochs and collects their snapshots.
    pub fn run(&mut self, epochs: usize) -> Result<Vec<Snapshot>, SimulationError> {
        let mut snapshots = Vec::with_capacity(epochs);
        self.run_with_callback(epochs, |s| snapshots.push(s.clone()))?;
        Ok(snapshots)
    }

    /// Runs `epochs` epochs, handing each snapshot to `on_epoch`.
    ///
    /// Stops at the first failing epoch; snapshots already delivered stay with
    /// the caller.
    pub fn run_with_callback<F>(&mut self, epochs: usize, mut on_epoch: F) -> Result<(), SimulationError>
    where
        F: FnMut(&Snapshot),
    {
        tracing::info!(
            epochs,
            points = self.state.samples().len(),
            grid = ?self.grid.shape(),
            "starting simulation"
        );
        for _ in 0..epochs {
            let snapshot = self.step()?;
            on_epoch(&snapshot);
        }
        tracing::info!(
            epochs = self.epoch,
            days = self.elapsed / self.day_length,
            mean_temperature = self.state.mean_temperature(),
            "simulation finished"
        );
        Ok(())
    }
}

/// Builds a fresh simulation and runs it for `epochs` epochs.
pub fn run_simulation(
    epochs: usize,
    constants: &PlanetConstants,
    config: &SimulationConfig,
) -> Result<Vec<Snapshot>, SimulationError> {
    Simulation::new(constants, config)?.run(epochs)
}
