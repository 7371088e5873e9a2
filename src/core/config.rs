//! Typed optimizer configuration.
//!
//! The document mirrors the sections Xopt recognizes (`xopt`, `generator`,
//! `evaluator`, `vocs`) and is built in code, never by interpolating values
//! into a YAML template.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::types::Vocs;
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XoptConfig {
    pub xopt: XoptSection,
    pub generator: GeneratorSection,
    pub evaluator: EvaluatorSection,
    pub vocs: Vocs,
}

/// Run-level settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XoptSection {
    pub dump_file: PathBuf,
    pub max_evaluations: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSection {
    pub name: String,
    pub population_size: usize,
    pub output_path: PathBuf,
    /// Previously saved population to resume from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_file: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorSection {
    pub function: String,
}

impl XoptConfig {
    pub fn validate(&self) -> Result<()> {
        self.vocs.validate()?;

        if self.xopt.max_evaluations == 0 {
            return Err(Error::Config("max_evaluations must be positive".into()));
        }
        if self.generator.population_size == 0 {
            return Err(Error::Config("population_size must be positive".into()));
        }
        if let Some(file) = &self.generator.population_file {
            if !file.is_file() {
                return Err(Error::Config(format!(
                    "population file not found: {}",
                    file.display()
                )));
            }
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::fs(path, e))?;
        Self::from_yaml(&text)
    }
}
