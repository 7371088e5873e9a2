use tracing::{info, warn};

use super::evaluator::Objective;
use super::history::{write_dump, EvaluationRecord};
use super::traits::{Generator, ProgressCallback};
use crate::core::{ParameterVector, XoptConfig};
use crate::error::{Error, Result};

/// Outcome of [`OptimizationDriver::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub evaluations: usize,
    pub feasible: usize,
    pub message: String,
}

/// Thin adapter between an [`Objective`] and a [`Generator`].
///
/// Evaluations are strictly sequential. After each one the record is
/// appended to the history and `dump.yaml` is rewritten, so a fatal error
/// leaves every completed evaluation on disk.
pub struct OptimizationDriver<'a> {
    config: XoptConfig,
    objective: &'a dyn Objective,
    history: Vec<EvaluationRecord>,
}

impl<'a> OptimizationDriver<'a> {
    pub fn new(config: XoptConfig, objective: &'a dyn Objective) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            objective,
            history: Vec::new(),
        })
    }

    pub fn config(&self) -> &XoptConfig {
        &self.config
    }

    pub fn history(&self) -> &[EvaluationRecord] {
        &self.history
    }

    /// Evaluate pre-recorded points without consulting any generator.
    pub fn evaluate_data(
        &mut self,
        points: &[ParameterVector],
        callback: &mut dyn ProgressCallback,
    ) -> Result<Vec<EvaluationRecord>> {
        info!(points = points.len(), "evaluating recorded points");
        let first = self.history.len();
        for point in points {
            self.evaluate_one(point, callback)?;
        }
        Ok(self.history[first..].to_vec())
    }

    /// Let `generator` propose points until the evaluation budget is spent.
    pub fn run(
        &mut self,
        generator: &mut dyn Generator,
        callback: &mut dyn ProgressCallback,
    ) -> Result<RunSummary> {
        let budget = self.config.xopt.max_evaluations;
        let batch = self.config.generator.population_size;
        info!(
            generator = generator.name(),
            budget, batch, "starting optimization"
        );

        let mut evaluated = 0;
        let mut message = "Evaluation budget exhausted".to_string();

        while evaluated < budget {
            if callback.should_stop() {
                message = "Stopped by callback".into();
                break;
            }

            let n = batch.min(budget - evaluated);
            let candidates = generator.generate(n)?;
            if candidates.is_empty() {
                return Err(Error::Config(format!(
                    "generator '{}' produced no candidates",
                    generator.name()
                )));
            }
            if candidates.len() > n {
                warn!(
                    requested = n,
                    produced = candidates.len(),
                    "generator returned extra candidates, truncating"
                );
            }

            let first = self.history.len();
            for point in candidates.iter().take(n) {
                self.evaluate_one(point, callback)?;
                evaluated += 1;
            }
            generator.add_data(&self.history[first..])?;
        }

        let feasible = self.history.iter().filter(|r| r.feasible).count();
        info!(evaluated, feasible, "{}", message);
        Ok(RunSummary {
            evaluations: evaluated,
            feasible,
            message,
        })
    }

    fn evaluate_one(
        &mut self,
        point: &ParameterVector,
        callback: &mut dyn ProgressCallback,
    ) -> Result<()> {
        let inputs = self.config.vocs.with_constants(point);
        let result = self.objective.evaluate(&inputs)?;
        let record = EvaluationRecord::new(self.history.len(), inputs, result, &self.config.vocs);

        self.history.push(record);
        write_dump(&self.config.xopt.dump_file, &self.config, &self.history)?;

        if let Some(record) = self.history.last() {
            callback.on_evaluation(record)?;
        }
        Ok(())
    }
}
