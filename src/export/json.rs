//! JSON export of simulation snapshots for external visualisation.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::simulation::Snapshot;

/// Errors that can occur while writing or reading snapshot files.
#[derive(Error, Debug)]
pub enum SnapshotExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes `snapshots` to `path` as a pretty-printed JSON array.
///
/// Missing parent directories are created.
pub fn write_snapshots_json(path: &Path, snapshots: &[Snapshot]) -> Result<(), SnapshotExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, snapshots)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Reads a file written by [`write_snapshots_json`].
pub fn read_snapshots_json(path: &Path) -> Result<Vec<Snapshot>, SnapshotExportError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmosphere::{PlanetConstants, SimulationConfig};
    use crate::simulation::run_simulation;
    use tempfile::tempdir;

    fn two_snapshots() -> Vec<Snapshot> {
        let config = SimulationConfig {
            point_count: 12,
            grid_resolution: 3,
            ..Default::default()
        };
        run_simulation(2, &PlanetConstants::default(), &config).unwrap()
    }

    #[test]
    fn export_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runs").join("earth").join("snapshots.json");
        write_snapshots_json(&path, &two_snapshots()).unwrap();
        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn exported_file_reads_back() {
        let snapshots = two_snapshots();
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshots.json");
        write_snapshots_json(&path, &snapshots).unwrap();

        let loaded = read_snapshots_json(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].epoch_index, 1);
        assert_eq!(loaded[1].time_label, snapshots[1].time_label);
        assert_eq!(loaded[0].temperature.shape(), (3, 6));
    }

    #[test]
    fn diverged_run_reads_back() {
        // A timestep far beyond the radiative timescale blows the fields up.
        let config = SimulationConfig {
            point_count: 12,
            grid_resolution: 3,
            timestep: 1e7,
            ..Default::default()
        };
        let snapshots = run_simulation(12, &PlanetConstants::default(), &config).unwrap();
        let non_finite = snapshots
            .iter()
            .flat_map(|s| [&s.temperature, &s.zonal_velocity, &s.meridional_velocity])
            .flat_map(|g| g.values())
            .filter(|x| !x.is_finite())
            .count();
        assert!(non_finite > 0);

        let dir = tempdir().unwrap();
        let path = dir.path().join("diverged.json");
        write_snapshots_json(&path, &snapshots).unwrap();
        let loaded = read_snapshots_json(&path).unwrap();

        assert_eq!(loaded.len(), snapshots.len());
        for (a, b) in loaded.iter().zip(&snapshots) {
            for (ga, gb) in [
                (&a.temperature, &b.temperature),
                (&a.zonal_velocity, &b.zonal_velocity),
                (&a.meridional_velocity, &b.meridional_velocity),
            ] {
                assert_eq!(ga.shape(), gb.shape());
                for (x, y) in ga.values().iter().zip(gb.values()) {
                    assert_eq!(x.is_finite(), y.is_finite());
                }
            }
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = read_snapshots_json(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SnapshotExportError::Io(_)));
    }
}
