use super::history::EvaluationRecord;
use crate::core::ParameterVector;
use crate::error::Result;

/// Callback interface for optimization progress
pub trait ProgressCallback {
    /// Called after every completed evaluation
    fn on_evaluation(&mut self, record: &EvaluationRecord) -> Result<()>;

    /// Check if optimization should stop early
    fn should_stop(&self) -> bool {
        false
    }
}

/// Source of candidate points, e.g. a CNSGA population.
///
/// The driver only asks for points and reports results back; selection,
/// crossover and mutation all live behind this trait.
pub trait Generator {
    fn name(&self) -> &str;

    /// Up to `n` new points to evaluate.
    fn generate(&mut self, n: usize) -> Result<Vec<ParameterVector>>;

    /// Feed back the records of the points returned by `generate`.
    fn add_data(&mut self, records: &[EvaluationRecord]) -> Result<()>;
}
