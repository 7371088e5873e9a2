use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::beam::{BeamInterchange, BeamSnapshot, SnapshotConverter};
use crate::core::{ParameterVector, Vocs};
use crate::error::Result;
use crate::simulation::{extract, ExtractedMetrics, RunDirectory, SimulatorTransport};

/// Evaluation counter that names snapshot files.
///
/// An index is reserved before the simulator starts, so a failed evaluation
/// still consumes its index and a later one never reuses its file names.
#[derive(Debug, Default)]
pub struct StepCounter(AtomicU64);

impl StepCounter {
    pub fn reserve(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    /// Index the next evaluation will receive.
    pub fn next(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Flat named outputs of one evaluation, handed back to the optimizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub step: u64,
    pub outputs: IndexMap<String, f64>,
}

impl EvaluationResult {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.outputs.get(name).copied()
    }

    pub fn outputs(&self) -> &IndexMap<String, f64> {
        &self.outputs
    }
}

/// Function from a parameter vector to named outputs.
pub trait Objective {
    fn evaluate(&self, parameters: &ParameterVector) -> Result<EvaluationResult>;
}

/// Merge text-derived metrics with snapshot statistics.
///
/// Snapshot values win on overlapping names: they come from the particle
/// ensemble itself rather than from the simulator's summary line.
pub fn merge_outputs(metrics: ExtractedMetrics, snapshot: &BeamSnapshot) -> IndexMap<String, f64> {
    let mut outputs = metrics.into_map();

    if !outputs.contains_key("emit_mean") {
        if let (Some(&x), Some(&y)) = (outputs.get("emittance_x"), outputs.get("emittance_y")) {
            outputs.insert("emit_mean".into(), (x * y).sqrt());
        }
    }

    outputs.extend(snapshot.statistics());
    outputs
}

/// Invoker, extractor and converter composed into one objective function.
pub struct ObjectiveEvaluator<T, B> {
    transport: T,
    converter: SnapshotConverter<B>,
    run_dir: RunDirectory,
    vocs: Vocs,
    steps: StepCounter,
}

impl<T: SimulatorTransport, B: BeamInterchange> ObjectiveEvaluator<T, B> {
    pub fn new(
        transport: T,
        converter: SnapshotConverter<B>,
        run_dir: RunDirectory,
        vocs: Vocs,
    ) -> Self {
        Self {
            transport,
            converter,
            run_dir,
            vocs,
            steps: StepCounter::default(),
        }
    }

    pub fn steps(&self) -> &StepCounter {
        &self.steps
    }

    pub fn run_directory(&self) -> &RunDirectory {
        &self.run_dir
    }

    pub fn vocs(&self) -> &Vocs {
        &self.vocs
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: SimulatorTransport, B: BeamInterchange> Objective for ObjectiveEvaluator<T, B> {
    fn evaluate(&self, parameters: &ParameterVector) -> Result<EvaluationResult> {
        self.vocs.validate_point(parameters)?;

        let step = self.steps.reserve();
        let span = info_span!("evaluate", step, transport = self.transport.name());
        let _guard = span.enter();
        let start = Instant::now();

        let record = self.transport.invoke_recorded(parameters)?;
        let metrics = extract(&record.raw)?;
        let snapshot =
            self.converter
                .convert_and_persist(self.transport.native_file(), step, &self.run_dir)?;

        let outputs = merge_outputs(metrics, &snapshot);
        info!(
            simulator_secs = record.elapsed_secs(),
            total_secs = start.elapsed().as_secs_f64(),
            outputs = outputs.len(),
            "evaluation finished"
        );

        Ok(EvaluationResult { step, outputs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::parse_report;
    use std::path::PathBuf;

    #[test]
    fn steps_are_reserved_in_order() {
        let steps = StepCounter::default();
        assert_eq!(steps.reserve(), 0);
        assert_eq!(steps.reserve(), 1);
        assert_eq!(steps.next(), 2);
    }

    #[test]
    fn snapshot_values_take_precedence() {
        let metrics =
            parse_report("Emittance: 1.5 / 2.5 Energy: 10.0 sigx: 0.001 um sigy: 0.002").unwrap();

        let mut twiss = IndexMap::new();
        twiss.insert("norm_emit_x".to_string(), 4.0);
        twiss.insert("norm_emit_y".to_string(), 9.0);
        let snapshot = BeamSnapshot {
            step: 0,
            snapshot_path: PathBuf::new(),
            native_copy_path: PathBuf::new(),
            twiss,
            num_particles: 10,
            total_charge: 1.0,
            sigma_t: 1.0e-12,
        };

        let outputs = merge_outputs(metrics, &snapshot);
        assert_eq!(outputs["emittance_x"], 4.0);
        assert_eq!(outputs["emittance_y"], 9.0);
        assert_eq!(outputs["emit_mean"], 6.0);
        assert_eq!(outputs["energy"], 10.0);
        assert_eq!(outputs["sigy"], 0.002);
        assert_eq!(outputs["bunch_length"], 1.0);
    }

    #[test]
    fn text_emittance_fills_in_without_twiss() {
        let metrics =
            parse_report("Emittance: 4.0 / 9.0 Energy: 10.0 sigx: 1 sigy: 2").unwrap();
        let snapshot = BeamSnapshot {
            step: 0,
            snapshot_path: PathBuf::new(),
            native_copy_path: PathBuf::new(),
            twiss: IndexMap::new(),
            num_particles: 10,
            total_charge: 1.0,
            sigma_t: 0.0,
        };
        assert_eq!(merge_outputs(metrics, &snapshot)["emit_mean"], 6.0);
    }
}
