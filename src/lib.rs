//! Daily demand and financial simulation core.
//!
//! Build a `VariableRegistry`, add `Equation`s to an `EquationGraph`, resolve
//! it into a `SimulationModel`, then run seeded `SimulationRun`s through a
//! `Simulator` and check the output with the `Validator`.

pub mod analysis;
pub mod bindings;
pub mod compute;
pub mod config;
pub mod display;
pub mod error;
pub mod graph;
pub mod model;
pub mod sampling;
pub mod store;
pub mod validation;

pub use compute::{ResultSimulation, SimulationModel, SimulationRun, Simulator};
pub use config::ScenarioConfig;
pub use error::{SimResult, SimulationError};
pub use graph::{Equation, EquationGraph, Expr};
pub use store::{Variable, VariableKind, VariableRegistry};
pub use validation::{ValidationReport, Validator};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// The `_core` Python module. The leading underscore marks it as the
/// compiled half of the Python package.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    bindings::python::register(m)
}
