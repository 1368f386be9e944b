//! Simulation driver and per-epoch snapshots.

mod driver;

pub use driver::{Simulation, SimulationError, Snapshot, run_simulation, time_label};
