use std::time::Instant;

use indexmap::IndexMap;
use tracing::{info, warn};

use super::history::EvaluationRecord;
use super::traits::ProgressCallback;
use crate::core::ObjectiveDirection;
use crate::error::Result;

/// Format duration in seconds to human-readable string (e.g., "2m 30s", "1h 15m")
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.0}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let secs_remaining = secs % 60.0;
        format!("{}m {:.0}s", mins, secs_remaining)
    } else {
        let hours = (secs / 3600.0).floor();
        let mins_remaining = ((secs % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours, mins_remaining)
    }
}

/// Best feasible value seen for one objective.
#[derive(Clone, Debug, PartialEq)]
pub struct BestValue {
    pub value: f64,
    pub index: usize,
}

/// Default callback: logs every evaluation and tracks the best feasible
/// value per objective.
pub struct ProgressLog {
    objectives: IndexMap<String, ObjectiveDirection>,
    max_evaluations: Option<usize>,
    evaluations: usize,
    feasible: usize,
    best: IndexMap<String, BestValue>,
    start_time: Instant,
}

impl ProgressLog {
    pub fn new(objectives: IndexMap<String, ObjectiveDirection>) -> Self {
        Self {
            objectives,
            max_evaluations: None,
            evaluations: 0,
            feasible: 0,
            best: IndexMap::new(),
            start_time: Instant::now(),
        }
    }

    /// Stop once `limit` evaluations have been seen.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.max_evaluations = Some(limit);
        self
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn feasible(&self) -> usize {
        self.feasible
    }

    pub fn best(&self, objective: &str) -> Option<&BestValue> {
        self.best.get(objective)
    }

    pub fn log_summary(&self) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        info!(
            evaluations = self.evaluations,
            feasible = self.feasible,
            elapsed = %format_duration(elapsed),
            "optimization summary"
        );
        for (name, best) in &self.best {
            info!(objective = name.as_str(), value = best.value, index = best.index, "best feasible");
        }
        if self.best.is_empty() && self.evaluations > 0 {
            warn!("no feasible evaluation found");
        }
    }
}

impl ProgressCallback for ProgressLog {
    fn on_evaluation(&mut self, record: &EvaluationRecord) -> Result<()> {
        self.evaluations += 1;

        let objectives: Vec<String> = self
            .objectives
            .keys()
            .map(|name| match record.output(name) {
                Some(v) => format!("{}={:.6e}", name, v),
                None => format!("{}=?", name),
            })
            .collect();

        if !record.feasible {
            warn!(
                index = record.index,
                step = record.step,
                violated = %record.violated.join(","),
                "infeasible: {}",
                objectives.join(" ")
            );
            return Ok(());
        }

        self.feasible += 1;
        info!(index = record.index, step = record.step, "{}", objectives.join(" "));

        for (name, direction) in &self.objectives {
            let Some(value) = record.output(name) else {
                continue;
            };
            let improved = self
                .best
                .get(name)
                .map_or(true, |best| direction.improves(value, best.value));
            if improved {
                self.best.insert(
                    name.clone(),
                    BestValue {
                        value,
                        index: record.index,
                    },
                );
            }
        }

        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.max_evaluations
            .map_or(false, |limit| self.evaluations >= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParameterVector;

    fn record(index: usize, emit: f64, feasible: bool) -> EvaluationRecord {
        let mut outputs = IndexMap::new();
        outputs.insert("emit_mean".to_string(), emit);
        EvaluationRecord {
            index,
            step: index as u64,
            inputs: ParameterVector::new(),
            outputs,
            feasible,
            violated: if feasible { vec![] } else { vec!["num_particles".into()] },
        }
    }

    #[test]
    fn tracks_best_feasible_only() {
        let mut objectives = IndexMap::new();
        objectives.insert("emit_mean".to_string(), ObjectiveDirection::Minimize);
        let mut log = ProgressLog::new(objectives).with_limit(3);

        log.on_evaluation(&record(0, 3.0, true)).unwrap();
        log.on_evaluation(&record(1, 1.0, false)).unwrap();
        assert!(!log.should_stop());
        log.on_evaluation(&record(2, 2.0, true)).unwrap();

        let best = log.best("emit_mean").unwrap();
        assert_eq!(best.value, 2.0);
        assert_eq!(best.index, 2);
        assert_eq!(log.feasible(), 2);
        assert!(log.should_stop());
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(42.0), "42s");
        assert_eq!(format_duration(150.0), "2m 30s");
        assert_eq!(format_duration(4500.0), "1h 15m");
    }
}
