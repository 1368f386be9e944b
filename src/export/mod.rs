//! Export module for saving simulation output to disk.
//!
//! Snapshots are written as JSON so that an external tool can plot the
//! temperature and wind grids.

mod json;

pub use json::{SnapshotExportError, read_snapshots_json, write_snapshots_json};
