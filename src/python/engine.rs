use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict, PyList, PyString, PyTuple};
use tracing::{debug, info, warn};

use crate::core::ParameterVector;
use crate::error::{Error, Result};
use crate::settings::{EngineArg, EngineSettings};
use crate::simulation::transport::remove_stale;
use crate::simulation::{RawResult, SimulatorTransport};

/// Simulator reached through a MATLAB engine session.
///
/// The session is started once and reused for every evaluation; dropping
/// the transport quits it.
pub struct MatlabEngineTransport {
    engine: Py<PyAny>,
    settings: EngineSettings,
    native_path: PathBuf,
}

impl MatlabEngineTransport {
    pub fn start(settings: EngineSettings) -> Result<Self> {
        if settings.process_variables.is_empty() {
            return Err(Error::Config(
                "engine call needs at least one process variable".into(),
            ));
        }

        let engine = Python::with_gil(|py| -> Result<Py<PyAny>> {
            info!(function = %settings.function, "starting MATLAB engine");
            let engine = py
                .import_bound("matlab.engine")?
                .call_method0("start_matlab")?;
            let cwd = settings.working_dir.to_string_lossy().into_owned();
            let kwargs = PyDict::new_bound(py);
            kwargs.set_item("nargout", 0)?;
            engine.call_method("cd", (cwd,), Some(&kwargs))?;
            Ok(engine.unbind())
        })?;

        let native_path = settings.working_dir.join(&settings.native_file);
        Ok(Self {
            engine,
            settings,
            native_path,
        })
    }
}

/// Every float in a scalar or a (possibly nested) MATLAB array, or `None`
/// when the value holds anything that is not a number.
fn numeric_values(value: &Bound<'_, PyAny>) -> PyResult<Option<Vec<f64>>> {
    let mut out = Vec::new();
    Ok(collect_numbers(value, &mut out)?.then_some(out))
}

fn collect_numbers(value: &Bound<'_, PyAny>, out: &mut Vec<f64>) -> PyResult<bool> {
    if let Ok(x) = value.extract::<f64>() {
        out.push(x);
        return Ok(true);
    }
    // strings iterate into one-character strings forever
    if value.is_instance_of::<PyString>() || value.is_instance_of::<PyBytes>() {
        return Ok(false);
    }
    let Ok(items) = value.iter() else {
        return Ok(false);
    };
    for item in items {
        if !collect_numbers(&item?, out)? {
            return Ok(false);
        }
    }
    Ok(true)
}

impl SimulatorTransport for MatlabEngineTransport {
    fn name(&self) -> &str {
        "matlab-engine"
    }

    fn native_file(&self) -> &Path {
        &self.native_path
    }

    fn invoke(&self, parameters: &ParameterVector) -> Result<RawResult> {
        let call = self.settings.call_arguments(parameters)?;
        remove_stale(&self.native_path)?;
        debug!(?call, function = %self.settings.function, "calling engine");

        Python::with_gil(|py| -> Result<RawResult> {
            let args: Vec<PyObject> = call
                .iter()
                .map(|arg| match arg {
                    EngineArg::Scalar(v) => (*v).into_py(py),
                    EngineArg::Quads(values) => PyList::new_bound(py, values).into_any().unbind(),
                })
                .collect();

            let result = self
                .engine
                .bind(py)
                .call_method1(self.settings.function.as_str(), PyTuple::new_bound(py, args))
                .map_err(|e| Error::Subprocess {
                    command: self.settings.function.clone(),
                    status: "engine error".into(),
                    stderr: e.to_string(),
                })?;

            let fields = result
                .downcast::<PyDict>()
                .map_err(|_| Error::parse("engine result", "expected a struct"))?;

            let mut structured = IndexMap::new();
            for (key, value) in fields.iter() {
                let name = key.extract::<String>()?;
                match numeric_values(&value)? {
                    Some(values) => {
                        structured.insert(name, values);
                    }
                    None => warn!(field = %name, "skipping non-numeric engine field"),
                }
            }
            Ok(RawResult::Structured(structured))
        })
    }
}

impl Drop for MatlabEngineTransport {
    fn drop(&mut self) {
        Python::with_gil(|py| {
            if let Err(e) = self.engine.bind(py).call_method0("quit") {
                warn!(error = %e, "MATLAB engine did not quit cleanly");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_value<R>(expr: &str, f: impl FnOnce(&Bound<'_, PyAny>) -> R) -> R {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let value = py.eval_bound(expr, None, None).unwrap();
            f(&value)
        })
    }

    #[test]
    fn scalars_and_nested_arrays_flatten() {
        assert_eq!(with_value("3.5", |v| numeric_values(v).unwrap()), Some(vec![3.5]));
        assert_eq!(
            with_value("[[1.0], [2.5, 4]]", |v| numeric_values(v).unwrap()),
            Some(vec![1.0, 2.5, 4.0])
        );
    }

    #[test]
    fn text_fields_are_not_numbers() {
        assert_eq!(with_value("'ok'", |v| numeric_values(v).unwrap()), None);
        assert_eq!(with_value("b'ok'", |v| numeric_values(v).unwrap()), None);
        assert_eq!(with_value("[1.0, 'x']", |v| numeric_values(v).unwrap()), None);
        assert_eq!(with_value("None", |v| numeric_values(v).unwrap()), None);
    }
}
