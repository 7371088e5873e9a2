use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::command::render_template;
use crate::core::ParameterVector;
use crate::error::{Error, Result};

/// Whatever the simulator handed back, before metric extraction.
#[derive(Clone, Debug, PartialEq)]
pub enum RawResult {
    /// Process transport: the text report plus the captured streams.
    Report {
        text: String,
        stdout: String,
        stderr: String,
    },
    /// Engine transport: named fields, each still wrapped in its container.
    Structured(IndexMap<String, Vec<f64>>),
}

/// One simulator invocation. Immutable once returned.
#[derive(Clone, Debug)]
pub struct SimulationRunRecord {
    pub parameters: ParameterVector,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub raw: RawResult,
}

impl SimulationRunRecord {
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// A way of running the simulator once for a parameter vector.
///
/// Calls block until the simulator terminates. There is no timeout: a hung
/// simulator hangs the caller.
pub trait SimulatorTransport {
    fn name(&self) -> &str;

    /// Native particle file the simulator leaves behind after each run.
    fn native_file(&self) -> &Path;

    fn invoke(&self, parameters: &ParameterVector) -> Result<RawResult>;

    /// `invoke` wrapped with wall-clock timestamps.
    fn invoke_recorded(&self, parameters: &ParameterVector) -> Result<SimulationRunRecord> {
        let started_at = Local::now();
        let raw = self.invoke(parameters)?;
        Ok(SimulationRunRecord {
            parameters: parameters.clone(),
            started_at,
            finished_at: Local::now(),
            raw,
        })
    }
}

impl<T: SimulatorTransport + ?Sized> SimulatorTransport for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn native_file(&self) -> &Path {
        (**self).native_file()
    }

    fn invoke(&self, parameters: &ParameterVector) -> Result<RawResult> {
        (**self).invoke(parameters)
    }
}

/// Delete an output left behind by the previous run so it cannot be read
/// back as this run's result.
pub(crate) fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::fs(path, e)),
    }
}

// ===== PROCESS TRANSPORT =====

/// How to launch the simulator as a child process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSettings {
    pub program: PathBuf,
    /// Fixed arguments placed before the script.
    pub args: Vec<String>,
    /// Flag that introduces the script argument.
    pub script_flag: String,
    /// Script with `{name}` placeholders, see [`render_template`].
    pub script_template: String,
    /// Directory the simulator runs in and writes its files to.
    pub working_dir: PathBuf,
    /// Text report, relative to `working_dir`.
    pub report_file: PathBuf,
    /// Native particle file, relative to `working_dir`.
    pub native_file: PathBuf,
    /// Substring identifying quadrupole variables.
    pub quad_marker: String,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("matlab"),
            args: vec!["-nodesktop".into(), "-nosplash".into()],
            script_flag: "-r".into(),
            script_template:
                "run({sol_var},{gun_phase},{laser_pulse_length},{quads},{bunch_charge}); exit;"
                    .into(),
            working_dir: PathBuf::from("."),
            report_file: PathBuf::from("output.txt"),
            native_file: PathBuf::from("lucretia.mat"),
            quad_marker: "QUAD".into(),
        }
    }
}

pub struct ProcessTransport {
    settings: ProcessSettings,
    native_path: PathBuf,
}

impl ProcessTransport {
    pub fn new(settings: ProcessSettings) -> Self {
        let native_path = settings.working_dir.join(&settings.native_file);
        Self {
            settings,
            native_path,
        }
    }

    pub fn report_path(&self) -> PathBuf {
        self.settings.working_dir.join(&self.settings.report_file)
    }

    /// Program and arguments for one run, without spawning anything.
    pub fn command_line(&self, parameters: &ParameterVector) -> Result<(PathBuf, Vec<String>)> {
        let script = render_template(
            &self.settings.script_template,
            parameters,
            &self.settings.quad_marker,
        )?;

        let mut args = self.settings.args.clone();
        if !self.settings.script_flag.is_empty() {
            args.push(self.settings.script_flag.clone());
        }
        args.push(script);

        Ok((self.settings.program.clone(), args))
    }
}

impl SimulatorTransport for ProcessTransport {
    fn name(&self) -> &str {
        "process"
    }

    fn native_file(&self) -> &Path {
        &self.native_path
    }

    fn invoke(&self, parameters: &ParameterVector) -> Result<RawResult> {
        let (program, args) = self.command_line(parameters)?;
        let command = format!("{} {}", program.display(), args.join(" "));

        let report = self.report_path();
        remove_stale(&report)?;
        remove_stale(&self.native_path)?;
        debug!(%command, "launching simulator");

        let start = Instant::now();
        let output = Command::new(&program)
            .args(&args)
            .current_dir(&self.settings.working_dir)
            .output()
            .map_err(|e| Error::Spawn {
                command: command.clone(),
                source: e,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            status = %output.status,
            "simulator finished"
        );
        debug!(%stdout, %stderr, "simulator output");

        if !output.status.success() {
            return Err(Error::Subprocess {
                command,
                status: output.status.to_string(),
                stderr,
            });
        }

        let text = fs::read_to_string(&report).map_err(|e| Error::fs(&report, e))?;

        Ok(RawResult::Report {
            text,
            stdout,
            stderr,
        })
    }
}
