use std::path::Path;

use indexmap::IndexMap;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::beam::{BeamInterchange, ParticleGroup};
use crate::error::{Error, Result};

/// `pmd_beamphysics.ParticleGroup` instance.
pub struct PyParticleGroup(Py<PyAny>);

impl ParticleGroup for PyParticleGroup {
    fn twiss(&self, planes: &str, fraction: f64) -> Result<IndexMap<String, f64>> {
        Python::with_gil(|py| -> Result<IndexMap<String, f64>> {
            let kwargs = PyDict::new_bound(py);
            kwargs.set_item("fraction", fraction)?;
            let stats = self.0.bind(py).call_method("twiss", (planes,), Some(&kwargs))?;
            let stats = stats
                .downcast::<PyDict>()
                .map_err(|_| Error::parse("twiss", "expected a dict"))?;

            let mut out = IndexMap::new();
            for (key, value) in stats.iter() {
                out.insert(key.extract::<String>()?, value.extract::<f64>()?);
            }
            Ok(out)
        })
    }

    fn scalar(&self, key: &str) -> Result<f64> {
        Python::with_gil(|py| Ok(self.0.bind(py).get_item(key)?.extract::<f64>()?))
    }

    fn len(&self, key: &str) -> Result<usize> {
        Python::with_gil(|py| Ok(self.0.bind(py).get_item(key)?.len()?))
    }
}

/// openPMD-beamphysics, including its Lucretia reader.
pub struct PmdBeamphysics {
    particle_group: Py<PyAny>,
    lucretia_to_data: Py<PyAny>,
}

impl PmdBeamphysics {
    /// Import the library up front so a missing install fails before the
    /// first simulation.
    pub fn new() -> Result<Self> {
        Python::with_gil(|py| -> Result<Self> {
            let particle_group = py
                .import_bound("pmd_beamphysics")?
                .getattr("ParticleGroup")?
                .unbind();
            let lucretia_to_data = py
                .import_bound("pmd_beamphysics.interfaces.lucretia")?
                .getattr("lucretia_to_data")?
                .unbind();
            Ok(Self {
                particle_group,
                lucretia_to_data,
            })
        })
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl BeamInterchange for PmdBeamphysics {
    type Group = PyParticleGroup;

    fn load_native(&self, path: &Path) -> Result<PyParticleGroup> {
        Python::with_gil(|py| -> Result<PyParticleGroup> {
            let kwargs = PyDict::new_bound(py);
            kwargs.set_item("verbose", true)?;
            let data = self
                .lucretia_to_data
                .bind(py)
                .call((path_arg(path),), Some(&kwargs))?;

            let kwargs = PyDict::new_bound(py);
            kwargs.set_item("data", data)?;
            let group = self.particle_group.bind(py).call((), Some(&kwargs))?;
            Ok(PyParticleGroup(group.unbind()))
        })
    }

    fn write(&self, group: &PyParticleGroup, path: &Path) -> Result<()> {
        Python::with_gil(|py| {
            group
                .0
                .bind(py)
                .call_method1("write", (path_arg(path),))
                .map_err(|e| Error::conversion(path, e.to_string()))?;
            Ok(())
        })
    }

    fn read(&self, path: &Path) -> Result<PyParticleGroup> {
        Python::with_gil(|py| {
            let group = self
                .particle_group
                .bind(py)
                .call1((path_arg(path),))
                .map_err(|e| Error::conversion(path, e.to_string()))?;
            Ok(PyParticleGroup(group.unbind()))
        })
    }
}
