//! Evaluation records and the checkpoint file the driver keeps current.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::evaluator::EvaluationResult;
use crate::core::{ParameterVector, Vocs, XoptConfig};
use crate::error::{Error, Result};

/// One evaluated point as the optimizer sees it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub index: usize,
    pub step: u64,
    pub inputs: ParameterVector,
    pub outputs: IndexMap<String, f64>,
    pub feasible: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violated: Vec<String>,
}

impl EvaluationRecord {
    pub fn new(index: usize, inputs: ParameterVector, result: EvaluationResult, vocs: &Vocs) -> Self {
        let violated: Vec<String> = vocs
            .violations(&result.outputs)
            .into_iter()
            .map(|v| v.output)
            .collect();
        Self {
            index,
            step: result.step,
            inputs,
            outputs: result.outputs,
            feasible: violated.is_empty(),
            violated,
        }
    }

    pub fn output(&self, name: &str) -> Option<f64> {
        self.outputs.get(name).copied()
    }
}

/// Contents of `dump.yaml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dump {
    pub config: XoptConfig,
    #[serde(default)]
    pub data: Vec<EvaluationRecord>,
}

#[derive(Serialize)]
struct DumpView<'a> {
    config: &'a XoptConfig,
    data: &'a [EvaluationRecord],
}

impl Dump {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::fs(path, e))?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

/// Rewrite the checkpoint with everything evaluated so far.
pub fn write_dump(path: &Path, config: &XoptConfig, data: &[EvaluationRecord]) -> Result<()> {
    let text = serde_yaml::to_string(&DumpView { config, data })?;
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, text).map_err(|e| Error::fs(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| Error::fs(path, e))
}
