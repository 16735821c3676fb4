//! Error taxonomy for model construction and run setup.
//!
//! Only configuration and graph problems are errors. Per-day numerical edge
//! cases (guarded divisions, bound clamps) are recorded as diagnostics on the
//! results instead.

use thiserror::Error;

pub type SimResult<T> = Result<T, SimulationError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("Variable '{0}' is already registered")]
    DuplicateVariable(String),

    #[error("Variable '{output}' already has an equation")]
    DuplicateEquation { output: String },

    #[error("Invalid equation for '{output}': {reason}")]
    InvalidEquation { output: String, reason: String },

    #[error("Invalid parameter for {distribution}: {reason}")]
    InvalidParameter { distribution: String, reason: String },

    /// An unresolvable same-day cycle. Members are listed in equation insertion order.
    #[error("Circular dependency among {members:?}")]
    CircularDependency { members: Vec<String> },

    #[error("Historical series needs at least {required} samples, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("Simulated series needs at least {required} days, got {actual}")]
    SimulationTooShort { required: usize, actual: usize },

    /// A statistical test was given fewer observations than it is defined for.
    #[error("Test needs at least {required} observations, got {actual}")]
    InsufficientSamples { required: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SimulationError {
    pub(crate) fn invalid_parameter(distribution: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter { distribution: distribution.into(), reason: reason.into() }
    }
}

impl From<serde_json::Error> for SimulationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<std::io::Error> for SimulationError {
    fn from(e: std::io::Error) -> Self {
        Self::Config(e.to_string())
    }
}
