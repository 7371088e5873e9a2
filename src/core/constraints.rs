use indexmap::IndexMap;
use tracing::warn;

use super::types::{ParameterVector, Vocs};
use crate::error::{Error, Result};

/// A constraint that an evaluation failed to meet.
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    pub output: String,
    /// `None` when the output was missing from the result.
    pub achieved: Option<f64>,
    pub threshold: f64,
}

impl Vocs {
    /// Check that the search definition is usable before any simulator runs.
    pub fn validate(&self) -> Result<()> {
        if self.variables.is_empty() {
            return Err(Error::Config("vocs declares no variables".into()));
        }

        for (name, bounds) in &self.variables {
            if name.trim().is_empty() {
                return Err(Error::Config("variable with empty name".into()));
            }
            if !(bounds.min < bounds.max) {
                return Err(Error::Config(format!(
                    "variable '{}' has invalid bounds [{}, {}]",
                    name, bounds.min, bounds.max
                )));
            }
            if self.constants.contains_key(name) {
                return Err(Error::Config(format!(
                    "'{}' is declared both as variable and constant",
                    name
                )));
            }
        }

        if self.objectives.is_empty() {
            return Err(Error::Config("vocs declares no objectives".into()));
        }

        Ok(())
    }

    /// Every declared variable and constant must be present. Bounds are the
    /// generator's job, so an out-of-range value only logs.
    pub fn validate_point(&self, point: &ParameterVector) -> Result<()> {
        let missing: Vec<&str> = self
            .variables
            .keys()
            .chain(self.constants.keys())
            .map(String::as_str)
            .filter(|name| !point.contains(name))
            .collect();

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "parameter vector is missing: {}",
                missing.join(", ")
            )));
        }

        for (name, bounds) in &self.variables {
            if let Some(value) = point.get(name) {
                if !bounds.contains(value) {
                    warn!(
                        variable = name.as_str(),
                        value,
                        min = bounds.min,
                        max = bounds.max,
                        "variable outside configured bounds"
                    );
                }
            }
        }

        Ok(())
    }

    /// Constraints not met by `outputs`. A missing output counts as violated.
    pub fn violations(&self, outputs: &IndexMap<String, f64>) -> Vec<Violation> {
        self.constraints
            .iter()
            .filter_map(|(name, constraint)| match outputs.get(name) {
                Some(&achieved) if constraint.is_satisfied(achieved) => None,
                achieved => Some(Violation {
                    output: name.clone(),
                    achieved: achieved.copied(),
                    threshold: constraint.threshold,
                }),
            })
            .collect()
    }

    pub fn is_feasible(&self, outputs: &IndexMap<String, f64>) -> bool {
        self.violations(outputs).is_empty()
    }
}
