use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::info;

use super::{BeamInterchange, ParticleGroup};
use crate::error::{Error, Result};
use crate::simulation::RunDirectory;

/// Central fraction of the population used for twiss statistics.
pub const DEFAULT_TWISS_FRACTION: f64 = 0.95;

/// Bunch length is reported in picoseconds; values near 1e-12 lose digits in
/// some serialized formats.
pub const PICOSECONDS_PER_SECOND: f64 = 1e12;

/// Converted particle ensemble of one evaluation plus its derived statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct BeamSnapshot {
    pub step: u64,
    pub snapshot_path: PathBuf,
    pub native_copy_path: PathBuf,
    pub twiss: IndexMap<String, f64>,
    pub num_particles: usize,
    /// Coulombs.
    pub total_charge: f64,
    /// Seconds.
    pub sigma_t: f64,
}

impl BeamSnapshot {
    pub fn bunch_length_ps(&self) -> f64 {
        self.sigma_t * PICOSECONDS_PER_SECOND
    }

    /// Normalized emittance of plane `x` or `y`.
    pub fn emittance(&self, plane: char) -> Option<f64> {
        self.twiss.get(&format!("norm_emit_{}", plane)).copied()
    }

    /// Geometric mean of the transverse normalized emittances.
    pub fn emit_mean(&self) -> Option<f64> {
        Some((self.emittance('x')? * self.emittance('y')?).sqrt())
    }

    /// Flat output mapping, in the order it is reported to the optimizer.
    pub fn statistics(&self) -> IndexMap<String, f64> {
        let mut stats = self.twiss.clone();
        if let Some(x) = self.emittance('x') {
            stats.insert("emittance_x".into(), x);
        }
        if let Some(y) = self.emittance('y') {
            stats.insert("emittance_y".into(), y);
        }
        if let Some(mean) = self.emit_mean() {
            stats.insert("emit_mean".into(), mean);
        }
        stats.insert("bunch_length".into(), self.bunch_length_ps());
        stats.insert("bunch_charge_final".into(), self.total_charge);
        stats.insert("num_particles".into(), self.num_particles as f64);
        stats
    }
}

pub struct SnapshotConverter<B> {
    interchange: B,
    planes: String,
    fraction: f64,
}

impl<B: BeamInterchange> SnapshotConverter<B> {
    pub fn new(interchange: B) -> Self {
        Self {
            interchange,
            planes: "xy".into(),
            fraction: DEFAULT_TWISS_FRACTION,
        }
    }

    pub fn with_fraction(mut self, fraction: f64) -> Self {
        self.fraction = fraction;
        self
    }

    /// Convert the native file left by the simulator, persist both the
    /// canonical snapshot and a copy of the native file under `step`, and
    /// compute the derived statistics.
    pub fn convert_and_persist(
        &self,
        native: &Path,
        step: u64,
        run_dir: &RunDirectory,
    ) -> Result<BeamSnapshot> {
        if !native.is_file() {
            return Err(Error::conversion(native, "native particle file not found"));
        }

        let group = self
            .interchange
            .load_native(native)
            .map_err(|e| Error::conversion(native, e.to_string()))?;

        let snapshot_path = run_dir.snapshot_path(step);
        self.interchange.write(&group, &snapshot_path)?;

        let native_copy_path = run_dir.native_copy_path(step);
        fs::copy(native, &native_copy_path).map_err(|e| Error::fs(&native_copy_path, e))?;

        let (twiss, num_particles, total_charge, sigma_t) =
            Self::summarize(&group, &self.planes, self.fraction)?;
        let snapshot = BeamSnapshot {
            step,
            snapshot_path,
            native_copy_path,
            twiss,
            num_particles,
            total_charge,
            sigma_t,
        };

        info!(
            step,
            num_particles = snapshot.num_particles,
            bunch_length_ps = snapshot.bunch_length_ps(),
            "beam snapshot persisted"
        );
        Ok(snapshot)
    }

    /// Reload a persisted snapshot and recompute its statistics.
    pub fn reload(&self, step: u64, run_dir: &RunDirectory) -> Result<BeamSnapshot> {
        let snapshot_path = run_dir.snapshot_path(step);
        let group = self.interchange.read(&snapshot_path)?;
        let (twiss, num_particles, total_charge, sigma_t) =
            Self::summarize(&group, &self.planes, self.fraction)?;
        Ok(BeamSnapshot {
            step,
            snapshot_path,
            native_copy_path: run_dir.native_copy_path(step),
            twiss,
            num_particles,
            total_charge,
            sigma_t,
        })
    }

    fn summarize(
        group: &B::Group,
        planes: &str,
        fraction: f64,
    ) -> Result<(IndexMap<String, f64>, usize, f64, f64)> {
        Ok((
            group.twiss(planes, fraction)?,
            group.len("x")?,
            group.scalar("charge")?,
            group.scalar("sigma_t")?,
        ))
    }
}
