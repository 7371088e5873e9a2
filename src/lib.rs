//! Evaluation driver for Lucretia injector simulations optimized by Xopt.
//!
//! One evaluation runs the simulator for a parameter vector, parses its
//! report, converts the particle file it leaves behind into an openPMD
//! snapshot and returns the merged statistics. The Python collaborators
//! (MATLAB engine, openPMD-beamphysics, Xopt) live behind the `python`
//! feature.

pub mod beam;
pub mod core;
pub mod error;
pub mod optimization;
#[cfg(feature = "python")]
pub mod python;
pub mod settings;
pub mod simulation;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

pub use crate::core::*;
pub use error::{Error, Result};
pub use settings::Settings;

/// Install the global subscriber. `RUST_LOG` wins over `verbose`; calling
/// this more than once is harmless.
pub fn enable_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}
