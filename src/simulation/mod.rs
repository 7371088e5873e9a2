pub mod command;
pub mod report;
pub mod rundir;
pub mod transport;

pub use report::{extract, parse_report, ExtractedMetrics};
pub use rundir::{latest_population, RunDirectory};
pub use transport::{
    ProcessSettings, ProcessTransport, RawResult, SimulationRunRecord, SimulatorTransport,
};
