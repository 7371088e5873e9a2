//! Error taxonomy for the evaluation loop.
//!
//! Every variant is fatal for the evaluation that raised it; nothing in the
//! crate retries.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Directory or file creation/access failed.
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The simulator process could not be started.
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The simulator ran but exited unsuccessfully, or the engine call raised.
    #[error("simulator `{command}` failed ({status}): {stderr}")]
    Subprocess {
        command: String,
        status: String,
        stderr: String,
    },

    /// The simulator report is missing a marker or holds a non-numeric value.
    #[error("cannot parse {field} from simulator output: {detail}")]
    Parse { field: String, detail: String },

    /// The native particle file is missing or the interchange rejected it.
    #[error("beam conversion failed for {}: {detail}", path.display())]
    Conversion { path: PathBuf, detail: String },

    /// Invalid settings, VOCS or parameter vector.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// An exception raised inside one of the Python collaborators.
    #[error("python error: {0}")]
    Python(String),
}

impl Error {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse {
            field: field.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn conversion(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(feature = "python")]
impl From<pyo3::PyErr> for Error {
    fn from(e: pyo3::PyErr) -> Self {
        Self::Python(e.to_string())
    }
}

#[cfg(feature = "python")]
impl From<Error> for pyo3::PyErr {
    fn from(e: Error) -> Self {
        use pyo3::exceptions::{PyOSError, PyRuntimeError, PyValueError};
        match e {
            Error::Config(_) | Error::Parse { .. } => PyValueError::new_err(e.to_string()),
            Error::Filesystem { .. } | Error::Spawn { .. } => PyOSError::new_err(e.to_string()),
            _ => PyRuntimeError::new_err(e.to_string()),
        }
    }
}
