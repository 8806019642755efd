//! PyO3 wrapper for Simulation
//!
//! This module provides the Python interface to the Rust simulation.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use super::types::{parse_simulation_config, run_summary_to_py, tick_result_to_py};
use crate::models::NodeId;
use crate::orchestrator::{RunOutcome, Simulation as RustSimulation, SimulationConfig};
use crate::telemetry::TrustRecorder;

/// Python wrapper for the Rust simulation
///
/// Trust trajectories of the tracked nodes are always recorded.
///
/// # Example (from Python)
///
/// ```python
/// from trust_simulator_core_rs import Simulation
///
/// config = {
///     "rng_seed": 12345,
///     "nodes": [{"performance": 0.5} for _ in range(30)],
///     "jobs": [{"active": True}, {}, {}],
///     "tracked_nodes": [0, 1],
/// }
///
/// sim = Simulation(config)
/// outcome, summary = sim.run()
/// print(outcome, summary["redundancy_ratio"])
/// ```
#[pyclass(name = "Simulation")]
pub struct PySimulation {
    inner: RustSimulation<TrustRecorder>,
}

fn runtime_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    PyErr::new::<PyRuntimeError, _>(format!("{}: {}", context, err))
}

impl PySimulation {
    fn from_config(config: SimulationConfig) -> PyResult<Self> {
        let inner = RustSimulation::with_sink(config, TrustRecorder::new())
            .map_err(|e| runtime_error("Failed to create simulation", e))?;
        Ok(Self { inner })
    }
}

#[pymethods]
impl PySimulation {
    /// Create a simulation from a configuration dict
    ///
    /// Raises RuntimeError if the configuration is invalid.
    #[new]
    fn new(config: &Bound<'_, PyDict>) -> PyResult<Self> {
        Self::from_config(parse_simulation_config(config)?)
    }

    /// Create a simulation from a JSON configuration string
    #[staticmethod]
    fn from_json(config: &str) -> PyResult<Self> {
        let config: SimulationConfig = serde_json::from_str(config)
            .map_err(|e| PyErr::new::<PyValueError, _>(format!("Invalid JSON config: {}", e)))?;
        Self::from_config(config)
    }

    /// Execute one tick and return its counters as a dict
    fn tick(&mut self, py: Python<'_>) -> PyResult<Py<PyDict>> {
        let result = self
            .inner
            .tick()
            .map_err(|e| runtime_error("Tick execution failed", e))?;
        tick_result_to_py(py, &result)
    }

    /// Run to completion or stall
    ///
    /// Returns `("Completed" | "Stalled", summary_dict)`.
    fn run(&mut self, py: Python<'_>) -> PyResult<(String, Py<PyDict>)> {
        let outcome = self
            .inner
            .run()
            .map_err(|e| runtime_error("Simulation failed", e))?;
        let label = match outcome {
            RunOutcome::Completed(_) => "Completed",
            RunOutcome::Stalled(_) => "Stalled",
        };
        Ok((label.to_string(), run_summary_to_py(py, outcome.summary())?))
    }

    fn current_tick(&self) -> u64 {
        self.inner.current_tick()
    }

    fn jobs_completed(&self) -> usize {
        self.inner.jobs_completed()
    }

    fn results_sent(&self) -> usize {
        self.inner.results_sent()
    }

    fn summary(&self, py: Python<'_>) -> PyResult<Py<PyDict>> {
        run_summary_to_py(py, &self.inner.summary())
    }

    /// Raw trust of a node, or None for an unknown handle
    fn node_trust(&self, node: u32) -> Option<f64> {
        let state = self.inner.state();
        ((node as usize) < state.num_nodes()).then(|| state.node(NodeId(node)).trust())
    }

    /// Recorded trust trajectories as a JSON string
    fn telemetry_json(&self) -> PyResult<String> {
        serde_json::to_string(self.inner.sink())
            .map_err(|e| runtime_error("Failed to serialize telemetry", e))
    }

    /// SHA-256 fingerprint of the recorded trajectories
    fn fingerprint(&self) -> String {
        self.inner.sink().fingerprint()
    }
}
