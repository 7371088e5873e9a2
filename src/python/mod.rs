//! Bindings to the Python-side collaborators and the `lucretia_xopt`
//! extension module.

mod cnsga;
mod engine;
mod pmd;

pub use cnsga::CnsgaGenerator;
pub use engine::MatlabEngineTransport;
pub use pmd::{PmdBeamphysics, PyParticleGroup};

use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3::sync::GILOnceCell;
use pyo3::types::PyDict;

use crate::beam::SnapshotConverter;
use crate::core::{ParameterVector, XoptConfig};
use crate::error::Result;
use crate::optimization::{Objective, ObjectiveEvaluator};
use crate::settings::{Settings, TransportKind};
use crate::simulation::{ProcessTransport, RunDirectory, SimulatorTransport};

/// Evaluator wired to the real collaborators.
pub type PythonEvaluator = ObjectiveEvaluator<Box<dyn SimulatorTransport>, PmdBeamphysics>;

/// Build the evaluator selected by `settings`, writing into `run_dir`.
pub fn build_evaluator(settings: &Settings, run_dir: RunDirectory) -> Result<PythonEvaluator> {
    let transport: Box<dyn SimulatorTransport> = match settings.transport {
        TransportKind::Process => Box::new(ProcessTransport::new(settings.process.clone())),
        TransportKind::Engine => Box::new(MatlabEngineTransport::start(settings.engine.clone())?),
    };
    let converter =
        SnapshotConverter::new(PmdBeamphysics::new()?).with_fraction(settings.twiss_fraction);
    Ok(ObjectiveEvaluator::new(
        transport,
        converter,
        run_dir,
        settings.vocs.clone(),
    ))
}

/// Callable handed to `xopt.Evaluator(function=...)`.
#[pyclass(name = "Evaluator", unsendable)]
pub struct Evaluator {
    inner: PythonEvaluator,
    config: XoptConfig,
}

#[pymethods]
impl Evaluator {
    #[new]
    #[pyo3(signature = (settings_path=None))]
    fn new(settings_path: Option<PathBuf>) -> PyResult<Self> {
        let settings = Settings::load_or_default(settings_path.as_deref())?;
        let run_dir = RunDirectory::create(&settings.output_root)?;
        let config = settings.xopt_config(&run_dir)?;
        let inner = build_evaluator(&settings, run_dir)?;
        Ok(Self { inner, config })
    }

    fn __call__<'py>(
        &self,
        py: Python<'py>,
        inputs: &Bound<'py, PyDict>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let mut point = ParameterVector::new();
        for (name, value) in inputs.iter() {
            point.insert(name.extract::<String>()?, value.extract::<f64>()?);
        }

        let result = self.inner.evaluate(&point)?;

        let outputs = PyDict::new_bound(py);
        for (name, value) in &result.outputs {
            outputs.set_item(name, value)?;
        }
        Ok(outputs)
    }

    #[getter]
    fn run_directory(&self) -> String {
        self.inner.run_directory().path().display().to_string()
    }

    #[getter]
    fn step(&self) -> u64 {
        self.inner.steps().next()
    }

    /// YAML document to pass to `Xopt.from_yaml`.
    fn xopt_config(&self) -> PyResult<String> {
        Ok(self.config.to_yaml()?)
    }
}

static DEFAULT_EVALUATOR: GILOnceCell<Py<Evaluator>> = GILOnceCell::new();

/// Module-level entry point named by the default `evaluator.function`.
/// Builds an [`Evaluator`] with default settings on first use.
#[pyfunction]
fn evaluate<'py>(py: Python<'py>, inputs: &Bound<'py, PyDict>) -> PyResult<Bound<'py, PyDict>> {
    let evaluator =
        DEFAULT_EVALUATOR.get_or_try_init(py, || Py::new(py, Evaluator::new(None)?))?;
    evaluator.borrow(py).__call__(py, inputs)
}

#[pymodule]
fn lucretia_xopt(m: &Bound<'_, PyModule>) -> PyResult<()> {
    crate::enable_tracing(false);
    m.add_class::<Evaluator>()?;
    m.add_function(wrap_pyfunction!(evaluate, m)?)?;
    Ok(())
}
