use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use tracing::{debug, info};

use crate::core::{ParameterVector, XoptConfig};
use crate::error::{Error, Result};
use crate::optimization::{EvaluationRecord, Generator};

/// Xopt's continuous NSGA-II generator.
///
/// Built from the same [`XoptConfig`] that is written to `dump.yaml`, so
/// the population file and output path match the run directory.
pub struct CnsgaGenerator {
    generator: Py<PyAny>,
    dataframe: Py<PyAny>,
    variables: Vec<String>,
}

impl CnsgaGenerator {
    pub fn new(config: &XoptConfig) -> Result<Self> {
        let vocs_json = serde_json::to_string(&config.vocs)?;
        let section = &config.generator;

        Python::with_gil(|py| -> Result<Self> {
            let vocs_dict = py.import_bound("json")?.call_method1("loads", (vocs_json,))?;
            let vocs_dict = vocs_dict
                .downcast::<PyDict>()
                .map_err(|_| Error::Config("VOCS did not serialize to a mapping".into()))?;
            let vocs = py.import_bound("xopt")?.getattr("VOCS")?.call((), Some(vocs_dict))?;

            let kwargs = PyDict::new_bound(py);
            kwargs.set_item("vocs", vocs)?;
            kwargs.set_item("population_size", section.population_size)?;
            kwargs.set_item("output_path", section.output_path.to_string_lossy().into_owned())?;
            if let Some(file) = &section.population_file {
                info!(population = %file.display(), "seeding CNSGA from population file");
                kwargs.set_item("population_file", file.to_string_lossy().into_owned())?;
            }

            let generator = py
                .import_bound("xopt.generators.ga")?
                .getattr("CNSGAGenerator")?
                .call((), Some(&kwargs))?;
            let dataframe = py.import_bound("pandas")?.getattr("DataFrame")?;

            Ok(Self {
                generator: generator.unbind(),
                dataframe: dataframe.unbind(),
                variables: config.vocs.variables.keys().cloned().collect(),
            })
        })
    }
}

impl Generator for CnsgaGenerator {
    fn name(&self) -> &str {
        "cnsga"
    }

    fn generate(&mut self, n: usize) -> Result<Vec<ParameterVector>> {
        Python::with_gil(|py| -> Result<Vec<ParameterVector>> {
            let candidates = self.generator.bind(py).call_method1("generate", (n,))?;
            let mut points = Vec::new();
            for candidate in candidates.iter()? {
                let candidate = candidate?;
                let mut point = ParameterVector::new();
                for name in &self.variables {
                    let value = candidate.get_item(name.as_str()).map_err(|_| {
                        Error::Config(format!("generator candidate lacks variable '{}'", name))
                    })?;
                    point.insert(name.clone(), value.extract::<f64>()?);
                }
                points.push(point);
            }
            debug!(requested = n, produced = points.len(), "CNSGA candidates");
            Ok(points)
        })
    }

    fn add_data(&mut self, records: &[EvaluationRecord]) -> Result<()> {
        Python::with_gil(|py| -> Result<()> {
            let rows = PyList::empty_bound(py);
            for record in records {
                let row = PyDict::new_bound(py);
                for (name, value) in record.inputs.iter() {
                    row.set_item(name, value)?;
                }
                for (name, value) in &record.outputs {
                    row.set_item(name, value)?;
                }
                row.set_item("xopt_error", false)?;
                rows.append(row)?;
            }
            let frame = self.dataframe.bind(py).call1((rows,))?;
            self.generator.bind(py).call_method1("add_data", (frame,))?;
            Ok(())
        })
    }
}
