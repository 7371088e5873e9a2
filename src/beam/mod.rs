//! Conversion of the simulator's native particle file into a canonical
//! particle-group snapshot.
//!
//! The particle-group library itself (loading Lucretia `.mat` files, writing
//! openPMD snapshots, twiss statistics) is an external collaborator reached
//! through [`BeamInterchange`]; this module only orchestrates it.

mod converter;

pub use converter::{BeamSnapshot, SnapshotConverter, DEFAULT_TWISS_FRACTION, PICOSECONDS_PER_SECOND};

use std::path::Path;

use indexmap::IndexMap;

use crate::error::Result;

/// A loaded particle ensemble.
pub trait ParticleGroup {
    /// Twiss statistics (`alpha_x`, `beta_x`, `norm_emit_x`, ...) computed over
    /// the central `fraction` of particles for each plane in `planes`.
    fn twiss(&self, planes: &str, fraction: f64) -> Result<IndexMap<String, f64>>;

    /// Scalar statistic such as `charge` or `sigma_t`.
    fn scalar(&self, key: &str) -> Result<f64>;

    /// Length of a per-particle array such as `x`.
    fn len(&self, key: &str) -> Result<usize>;
}

/// Particle-group library operations the converter depends on.
pub trait BeamInterchange {
    type Group: ParticleGroup;

    /// Read the simulator's native particle file.
    fn load_native(&self, path: &Path) -> Result<Self::Group>;

    /// Persist the canonical form.
    fn write(&self, group: &Self::Group, path: &Path) -> Result<()>;

    /// Reload a canonical snapshot written by [`BeamInterchange::write`].
    fn read(&self, path: &Path) -> Result<Self::Group>;
}
