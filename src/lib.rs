//! Toy general-circulation model on a sphere.
//!
//! Temperature and horizontal wind live on a Fibonacci-sampled set of points.
//! Every timestep the fields are refitted with a spherical smoothing spline,
//! whose analytic derivatives drive radiative forcing, a wind update and
//! temperature advection. Each epoch is projected onto a regular
//! latitude/longitude grid for output.

pub mod geometry;
pub mod interpolation;
pub mod atmosphere;
pub mod simulation;
pub mod export;

pub use geometry::{SpherePoint, fibonacci_sphere};
pub use interpolation::{EvalMode, FitError, FittedField, SplineSystem};
pub use atmosphere::{AtmosphereState, ModelConfig, PlanetConstants, RegularGrid, SimulationConfig};
pub use simulation::{Simulation, SimulationError, Snapshot, run_simulation};
