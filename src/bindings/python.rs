//! pyo3 surface for the web layer. Requests and results cross the boundary
//! as JSON strings, so Python never holds Rust-owned state besides `_Model`.

use crate::analysis::ModelReport;
use crate::compute::{SimulationModel, Simulator};
use crate::config::ScenarioConfig;
use crate::display::trace;
use crate::error::SimulationError;
use crate::model::dairy;
use crate::sampling::fit_best;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

fn to_py_err(e: SimulationError) -> PyErr {
    match e {
        SimulationError::CircularDependency { .. } => PyRuntimeError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

/// A simple function to confirm the Rust core is callable from Python.
#[pyfunction]
pub fn rust_core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Runs a JSON scenario on the canonical dairy model.
/// Returns `{"result": ..., "report": ...}` as JSON.
#[pyfunction]
pub fn run_scenario(py: Python<'_>, config_json: &str) -> PyResult<String> {
    let config = ScenarioConfig::from_json_str(config_json).map_err(to_py_err)?;
    let outcome = py.detach(|| config.execute()).map_err(to_py_err)?;
    to_json(&outcome)
}

/// Ranks the distribution families by how well they fit `data`.
#[pyfunction]
pub fn fit_distribution(data: Vec<f64>) -> PyResult<String> {
    let ranked = fit_best(&data).map_err(to_py_err)?;
    to_json(&ranked)
}

#[pyclass(name = "_Model")]
#[derive(Debug, Clone)]
pub struct PyModel {
    simulator: Simulator,
}

#[pymethods]
impl PyModel {
    /// The canonical dairy model; `legacy=True` resolves the older sheet through its repair rules.
    #[new]
    #[pyo3(signature = (legacy = false))]
    pub fn new(legacy: bool) -> PyResult<Self> {
        let graph = if legacy { dairy::legacy_graph() } else { dairy::graph() }.map_err(to_py_err)?;
        let model = SimulationModel::build(&graph).map_err(to_py_err)?;
        Ok(Self { simulator: Simulator::new(model) })
    }

    pub fn execution_order(&self) -> Vec<String> {
        self.simulator.model().plan().order().into_iter().map(String::from).collect()
    }

    pub fn report(&self) -> PyResult<String> {
        to_json(&ModelReport::analyze(self.simulator.model()))
    }

    /// Runs a scenario, profiles included, and validates it.
    pub fn run(&self, py: Python<'_>, config_json: &str) -> PyResult<String> {
        let config = ScenarioConfig::from_json_str(config_json).map_err(to_py_err)?;
        let outcome = py.detach(|| config.execute_on(self.simulator.model())).map_err(to_py_err)?;
        to_json(&outcome)
    }

    pub fn trace(&self, config_json: &str, day_index: usize, initials: &str) -> PyResult<String> {
        let config = ScenarioConfig::from_json_str(config_json).map_err(to_py_err)?;
        let (_, result) = config.simulate(self.simulator.model()).map_err(to_py_err)?;
        Ok(trace::format_trace(self.simulator.model(), &result, day_index, initials))
    }
}

pub(crate) fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(rust_core_version, m)?)?;
    m.add_function(wrap_pyfunction!(run_scenario, m)?)?;
    m.add_function(wrap_pyfunction!(fit_distribution, m)?)?;
    m.add_class::<PyModel>()?;
    Ok(())
}
