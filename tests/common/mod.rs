#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use lucretia_xopt::beam::{BeamInterchange, ParticleGroup};
use lucretia_xopt::optimization::{EvaluationRecord, Generator};
use lucretia_xopt::simulation::{RawResult, SimulatorTransport};
use lucretia_xopt::{Error, ParameterVector, Result, INJECTOR_QUADS};

pub const REPORT: &str =
    "Beamline done. Emittance: 1.5 / 2.5 Energy: 10.0 sigx: 0.001 um, extra sigy: 0.002";

/// Point from the production search space with every quad at zero.
pub fn injector_point() -> ParameterVector {
    let mut point: ParameterVector = [
        ("sol_var", 0.2),
        ("gun_phase", 290.0),
        ("bunch_charge", 2.0e-9),
        ("laser_pulse_length", 4.4999e-12),
    ]
    .into_iter()
    .collect();
    for quad in INJECTOR_QUADS {
        point.insert(quad, 0.0);
    }
    point
}

/// Particle ensemble stored as JSON, standing in for both the native file
/// and the canonical snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FakeGroup {
    pub x: Vec<f64>,
    pub weight: Vec<f64>,
    pub sigma_t: f64,
    pub norm_emit_x: f64,
    pub norm_emit_y: f64,
}

impl FakeGroup {
    pub fn uniform(n: usize, total_charge: f64) -> Self {
        Self {
            x: (0..n).map(|i| i as f64 * 1e-6).collect(),
            weight: vec![total_charge / n as f64; n],
            sigma_t: 1.0e-12,
            norm_emit_x: 4.0e-6,
            norm_emit_y: 1.0e-6,
        }
    }
}

impl ParticleGroup for FakeGroup {
    fn twiss(&self, planes: &str, _fraction: f64) -> Result<IndexMap<String, f64>> {
        let mut out = IndexMap::new();
        for plane in planes.chars() {
            let emit = match plane {
                'x' => self.norm_emit_x,
                'y' => self.norm_emit_y,
                other => return Err(Error::Config(format!("unknown plane {}", other))),
            };
            out.insert(format!("alpha_{}", plane), 0.5);
            out.insert(format!("beta_{}", plane), 12.0);
            out.insert(format!("norm_emit_{}", plane), emit);
        }
        Ok(out)
    }

    fn scalar(&self, key: &str) -> Result<f64> {
        match key {
            "charge" => Ok(self.weight.iter().sum()),
            "sigma_t" => Ok(self.sigma_t),
            other => Err(Error::Config(format!("unknown statistic {}", other))),
        }
    }

    fn len(&self, key: &str) -> Result<usize> {
        match key {
            "x" => Ok(self.x.len()),
            other => Err(Error::Config(format!("unknown array {}", other))),
        }
    }
}

#[derive(Default)]
pub struct JsonInterchange;

fn read_group(path: &Path) -> Result<FakeGroup> {
    let text = fs::read_to_string(path).map_err(|e| Error::Conversion {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(serde_json::from_str(&text)?)
}

impl BeamInterchange for JsonInterchange {
    type Group = FakeGroup;

    fn load_native(&self, path: &Path) -> Result<FakeGroup> {
        read_group(path)
    }

    fn write(&self, group: &FakeGroup, path: &Path) -> Result<()> {
        let text = serde_json::to_string(group)?;
        fs::write(path, text).map_err(|e| Error::Filesystem {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn read(&self, path: &Path) -> Result<FakeGroup> {
        read_group(path)
    }
}

/// Simulator stand-in: writes a fixed native file into its scratch
/// directory and returns a fixed report.
pub struct FixtureTransport {
    native_path: PathBuf,
    group: FakeGroup,
    report: String,
    fail_next: Cell<bool>,
    write_native: bool,
    pub calls: Cell<usize>,
}

impl FixtureTransport {
    pub fn new(scratch: &Path, group: FakeGroup) -> Self {
        Self {
            native_path: scratch.join("lucretia.mat"),
            group,
            report: REPORT.to_string(),
            fail_next: Cell::new(false),
            write_native: true,
            calls: Cell::new(0),
        }
    }

    /// Simulator that "succeeds" without leaving a particle file.
    pub fn without_native(mut self) -> Self {
        self.write_native = false;
        self
    }

    pub fn with_report(mut self, report: &str) -> Self {
        self.report = report.to_string();
        self
    }

    pub fn fail_next(&self) {
        self.fail_next.set(true);
    }
}

impl SimulatorTransport for FixtureTransport {
    fn name(&self) -> &str {
        "fixture"
    }

    fn native_file(&self) -> &Path {
        &self.native_path
    }

    fn invoke(&self, _parameters: &ParameterVector) -> Result<RawResult> {
        self.calls.set(self.calls.get() + 1);
        if self.fail_next.replace(false) {
            return Err(Error::Subprocess {
                command: "fixture".into(),
                status: "exit status: 1".into(),
                stderr: "license checkout failed".into(),
            });
        }
        if self.write_native {
            fs::write(&self.native_path, serde_json::to_string(&self.group)?).map_err(|e| {
                Error::Filesystem {
                    path: self.native_path.clone(),
                    source: e,
                }
            })?;
        }
        Ok(RawResult::Report {
            text: self.report.clone(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Generator that proposes the same point, nudging `sol_var` each time.
pub struct StubGenerator {
    base: ParameterVector,
    proposed: usize,
    pub requests: Vec<usize>,
    pub received: RefCell<Vec<EvaluationRecord>>,
}

impl StubGenerator {
    pub fn new(base: ParameterVector) -> Self {
        Self {
            base,
            proposed: 0,
            requests: Vec::new(),
            received: RefCell::new(Vec::new()),
        }
    }
}

impl Generator for StubGenerator {
    fn name(&self) -> &str {
        "stub"
    }

    fn generate(&mut self, n: usize) -> Result<Vec<ParameterVector>> {
        self.requests.push(n);
        let points = (0..n)
            .map(|i| {
                let mut point = self.base.clone();
                point.insert("sol_var", 0.1 + 0.001 * (self.proposed + i) as f64);
                point
            })
            .collect();
        self.proposed += n;
        Ok(points)
    }

    fn add_data(&mut self, records: &[EvaluationRecord]) -> Result<()> {
        self.received.borrow_mut().extend_from_slice(records);
        Ok(())
    }
}
