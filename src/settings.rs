//! Run settings file.
//!
//! Every field has a default that reproduces the production injector
//! optimization, so an empty YAML document is a valid settings file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::beam::DEFAULT_TWISS_FRACTION;
use crate::core::{
    EvaluatorSection, GeneratorSection, ParameterVector, Vocs, XoptConfig, XoptSection,
};
use crate::error::{Error, Result};
use crate::simulation::{latest_population, ProcessSettings, RunDirectory};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Launch the simulator as a batch process and parse its text report.
    Process,
    /// Call into a long-lived MATLAB engine session.
    Engine,
}

/// Embedded-engine call `function(p1, p2, p3, quads, p4)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub function: String,
    /// Scalar arguments in call order; the quad vector goes before the last one.
    pub process_variables: Vec<String>,
    pub quad_marker: String,
    /// Directory the engine session works in.
    pub working_dir: PathBuf,
    pub native_file: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            function: "run".into(),
            process_variables: vec![
                "sol_var".into(),
                "gun_phase".into(),
                "laser_pulse_length".into(),
                "bunch_charge".into(),
            ],
            quad_marker: "QUAD".into(),
            working_dir: PathBuf::from("."),
            native_file: PathBuf::from("lucretia.mat"),
        }
    }
}

/// One positional argument of the engine call.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineArg {
    Scalar(f64),
    /// Every quadrupole value, in declaration order.
    Quads(Vec<f64>),
}

impl EngineSettings {
    /// Positional arguments for `function`: the process variables in order,
    /// with the quad vector inserted before the last one.
    pub fn call_arguments(&self, parameters: &ParameterVector) -> Result<Vec<EngineArg>> {
        let mut args = self
            .process_variables
            .iter()
            .map(|name| {
                parameters
                    .get(name)
                    .map(EngineArg::Scalar)
                    .ok_or_else(|| Error::Config(format!("missing process variable '{}'", name)))
            })
            .collect::<Result<Vec<_>>>()?;

        let last = args
            .pop()
            .ok_or_else(|| Error::Config("engine call needs at least one process variable".into()))?;
        args.push(EngineArg::Quads(parameters.values_matching(&self.quad_marker)));
        args.push(last);
        Ok(args)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub name: String,
    pub population_size: usize,
    /// Explicit population file to resume from.
    pub population_file: Option<PathBuf>,
    /// Previous run directory; its newest population file is used when
    /// `population_file` is not set.
    pub resume_from: Option<PathBuf>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            name: "cnsga".into(),
            population_size: 80,
            population_file: None,
            resume_from: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Parent of the timestamped run directory.
    pub output_root: PathBuf,
    pub transport: TransportKind,
    pub process: ProcessSettings,
    pub engine: EngineSettings,
    pub twiss_fraction: f64,
    pub max_evaluations: usize,
    pub generator: GeneratorSettings,
    pub evaluator_function: String,
    pub vocs: Vocs,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            transport: TransportKind::Process,
            process: ProcessSettings::default(),
            engine: EngineSettings::default(),
            twiss_fraction: DEFAULT_TWISS_FRACTION,
            max_evaluations: 240,
            generator: GeneratorSettings::default(),
            evaluator_function: "lucretia_xopt.evaluate".into(),
            vocs: Vocs::injector(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::fs(path, e))?;
        let settings: Self = serde_yaml::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings from `path`, or the defaults when no file is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.twiss_fraction > 0.0 && self.twiss_fraction <= 1.0) {
            return Err(Error::Config(format!(
                "twiss_fraction must be in (0, 1], got {}",
                self.twiss_fraction
            )));
        }
        self.vocs.validate()
    }

    /// Population file to resume from, if any.
    pub fn resolve_population_file(&self) -> Result<Option<PathBuf>> {
        if let Some(file) = &self.generator.population_file {
            return Ok(Some(file.clone()));
        }
        match &self.generator.resume_from {
            Some(dir) => {
                let found = latest_population(dir)?;
                match &found {
                    Some(file) => info!(population = %file.display(), "resuming population"),
                    None => {
                        return Err(Error::Config(format!(
                            "no cnsga_population_*.csv in {}",
                            dir.display()
                        )))
                    }
                }
                Ok(found)
            }
            None => Ok(None),
        }
    }

    /// Optimizer configuration for a run writing into `run_dir`.
    pub fn xopt_config(&self, run_dir: &RunDirectory) -> Result<XoptConfig> {
        let config = XoptConfig {
            xopt: XoptSection {
                dump_file: run_dir.dump_file(),
                max_evaluations: self.max_evaluations,
            },
            generator: GeneratorSection {
                name: self.generator.name.clone(),
                population_size: self.generator.population_size,
                output_path: run_dir.path().to_path_buf(),
                population_file: self.resolve_population_file()?,
            },
            evaluator: EvaluatorSection {
                function: self.evaluator_function.clone(),
            },
            vocs: self.vocs.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}
