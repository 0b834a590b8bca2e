use std::fmt;
use std::path::PathBuf;

use crate::model::DesignField;

/// Errors raised by a `Fitter` for a single replication.
///
/// These never abort a sweep; the replication is recorded as failed.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    UnsupportedFormula(String),
    InsufficientData(String),
    /// The data admit no valid test (e.g. zero between-subject variance)
    Degenerate(String),
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitError::UnsupportedFormula(formula) => {
                write!(f, "unsupported model formula: {formula}")
            }
            FitError::InsufficientData(msg) => write!(f, "insufficient data: {msg}"),
            FitError::Degenerate(msg) => write!(f, "degenerate fit: {msg}"),
        }
    }
}

impl std::error::Error for FitError {}

/// Errors from reading or writing the result store
#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize(serde_json::Error),
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, source } => {
                write!(f, "I/O error on {}: {source}", path.display())
            }
            StoreError::Serialize(e) => write!(f, "failed to serialize result row: {e}"),
            StoreError::Parse { path, line, source } => {
                write!(f, "malformed row at {}:{line}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Serialize(e) => Some(e),
            StoreError::Parse { source, .. } => Some(source),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialize(e)
    }
}

/// Errors that abort a simulation or sweep
#[derive(Debug)]
pub enum SimulationError {
    InvalidParameters {
        field: DesignField,
        value: f64,
        reason: &'static str,
    },
    /// Random-effect covariance matrix is not positive semi-definite
    InvalidCovariance {
        tau_intercept: f64,
        tau_slope: f64,
        rho: f64,
    },
    /// Appending to the sink failed; the store can no longer be trusted for resume
    SinkWrite(StoreError),
    SinkRead(StoreError),
    /// Sweep was cancelled before all rows were run
    Cancelled,
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::InvalidParameters {
                field,
                value,
                reason,
            } => write!(f, "invalid {field} = {value}: {reason}"),
            SimulationError::InvalidCovariance {
                tau_intercept,
                tau_slope,
                rho,
            } => write!(
                f,
                "random-effect covariance is not positive semi-definite \
                 (tau_intercept={tau_intercept}, tau_slope={tau_slope}, rho={rho})"
            ),
            SimulationError::SinkWrite(e) => write!(f, "sink write failed: {e}"),
            SimulationError::SinkRead(e) => write!(f, "sink read failed: {e}"),
            SimulationError::Cancelled => write!(f, "sweep cancelled"),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::SinkWrite(e) | SimulationError::SinkRead(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
