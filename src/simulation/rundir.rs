//! Timestamped output directory holding every artifact of one process run.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::{Error, Result};

const DIR_PREFIX: &str = "simulation_";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Clone, Debug)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    /// Create `simulation_{YYYY-MM-DD_HH-MM-SS}` under `parent`.
    ///
    /// Two processes started within the same second share the directory.
    pub fn create(parent: impl AsRef<Path>) -> Result<Self> {
        Self::planned(parent).ensure_exists()
    }

    /// Create (or reuse) `parent/name`.
    pub fn create_named(parent: impl AsRef<Path>, name: &str) -> Result<Self> {
        Self {
            path: parent.as_ref().join(name),
        }
        .ensure_exists()
    }

    /// The directory `create` would use right now, without touching the
    /// filesystem.
    pub fn planned(parent: impl AsRef<Path>) -> Self {
        let name = format!("{}{}", DIR_PREFIX, Local::now().format(TIMESTAMP_FORMAT));
        Self {
            path: parent.as_ref().join(name),
        }
    }

    fn ensure_exists(self) -> Result<Self> {
        fs::create_dir_all(&self.path).map_err(|e| Error::fs(&self.path, e))?;
        info!(path = %self.path.display(), "run directory ready");
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Optimizer checkpoint.
    pub fn dump_file(&self) -> PathBuf {
        self.path.join("dump.yaml")
    }

    /// Canonical particle-group snapshot for `step`.
    pub fn snapshot_path(&self, step: u64) -> PathBuf {
        self.path.join(format!("lucretia_step_{}.h5", step))
    }

    /// Copy of the simulator's native particle file for `step`.
    pub fn native_copy_path(&self, step: u64) -> PathBuf {
        self.path.join(format!("lucretia_{}.mat", step))
    }

    /// Persisted snapshots ordered by step index.
    pub fn snapshots(&self) -> Result<Vec<(u64, PathBuf)>> {
        let pattern = self.path.join("lucretia_step_*.h5");
        let mut found: Vec<(u64, PathBuf)> = glob::glob(&pattern.to_string_lossy())
            .map_err(|e| Error::Config(format!("bad snapshot pattern: {}", e)))?
            .filter_map(|entry| entry.ok())
            .filter_map(|path| {
                let step = path
                    .file_stem()?
                    .to_str()?
                    .strip_prefix("lucretia_step_")?
                    .parse::<u64>()
                    .ok()?;
                Some((step, path))
            })
            .collect();
        found.sort_by_key(|(step, _)| *step);
        Ok(found)
    }
}

/// Most recent `cnsga_population_*.csv` written into `dir` by a previous run.
///
/// The generator stamps population files with an ISO timestamp, so the
/// lexicographic maximum is the newest.
pub fn latest_population(dir: &Path) -> Result<Option<PathBuf>> {
    let pattern = dir.join("cnsga_population_*.csv");
    let newest = glob::glob(&pattern.to_string_lossy())
        .map_err(|e| Error::Config(format!("bad population pattern: {}", e)))?
        .filter_map(|entry| entry.ok())
        .max();
    Ok(newest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creating_twice_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let first = RunDirectory::create_named(tmp.path(), "simulation_2023-08-16_11-18-18").unwrap();
        let second = RunDirectory::create_named(tmp.path(), "simulation_2023-08-16_11-18-18").unwrap();
        assert_eq!(first.path(), second.path());
        assert!(first.path().is_dir());
    }

    #[test]
    fn timestamped_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = RunDirectory::create(tmp.path()).unwrap();
        let name = dir.path().file_name().unwrap().to_str().unwrap();
        let stamp = name.strip_prefix("simulation_").unwrap();
        assert_eq!(stamp.len(), "2023-08-16_11-18-18".len());
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn planned_directory_is_not_created() {
        let tmp = tempfile::tempdir().unwrap();
        let planned = RunDirectory::planned(tmp.path());
        assert!(planned.path().starts_with(tmp.path()));
        assert!(!planned.path().exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);

        let created = planned.ensure_exists().unwrap();
        assert!(created.path().is_dir());
    }

    #[test]
    fn artifact_names() {
        let dir = RunDirectory {
            path: PathBuf::from("run"),
        };
        assert_eq!(dir.dump_file(), PathBuf::from("run/dump.yaml"));
        assert_eq!(dir.snapshot_path(3), PathBuf::from("run/lucretia_step_3.h5"));
        assert_eq!(dir.native_copy_path(3), PathBuf::from("run/lucretia_3.mat"));
    }

    #[test]
    fn snapshots_sorted_numerically() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = RunDirectory::create_named(tmp.path(), "run").unwrap();
        for step in [10, 2, 0] {
            fs::write(dir.snapshot_path(step), b"").unwrap();
        }
        let steps: Vec<u64> = dir.snapshots().unwrap().into_iter().map(|(s, _)| s).collect();
        assert_eq!(steps, vec![0, 2, 10]);
    }

    #[test]
    fn newest_population_wins() {
        let tmp = tempfile::tempdir().unwrap();
        for stamp in ["2023-08-11T00:20:40", "2023-08-16T16:16:43", "2023-08-09T10:00:00"] {
            fs::write(tmp.path().join(format!("cnsga_population_{}.csv", stamp)), b"").unwrap();
        }
        let newest = latest_population(tmp.path()).unwrap().unwrap();
        assert!(newest.to_string_lossy().contains("2023-08-16T16:16:43"));

        let empty = tempfile::tempdir().unwrap();
        assert_eq!(latest_population(empty.path()).unwrap(), None);
    }
}
