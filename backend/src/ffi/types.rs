//! Type conversion utilities for FFI boundary
//!
//! Converts between Rust types and PyO3-compatible types (PyDict, PyList, etc.)

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::orchestrator::{
    JobConfig, NodeConfig, RunSummary, SimulationConfig, TickResult, DEFAULT_STALL_THRESHOLD,
};

// ========================================================================
// PyDict Extraction Helpers
// ========================================================================

/// Extract a required field from a Python dict.
///
/// # Errors
/// Returns PyValueError if the field is missing, or the conversion error.
fn extract_required<T>(dict: &Bound<'_, PyDict>, key: &str) -> PyResult<T>
where
    for<'py> T: FromPyObject<'py>,
{
    dict.get_item(key)?
        .ok_or_else(|| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "Missing required field '{}'",
                key
            ))
        })?
        .extract()
}

/// Extract a field with a default value if missing.
fn extract_with_default<T>(dict: &Bound<'_, PyDict>, key: &str, default: T) -> PyResult<T>
where
    for<'py> T: FromPyObject<'py>,
{
    match dict.get_item(key)? {
        Some(value) => value.extract(),
        None => Ok(default),
    }
}

fn dicts_in<'py>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<Vec<Bound<'py, PyDict>>> {
    let Some(items) = dict.get_item(key)? else {
        return Ok(Vec::new());
    };
    let list: Bound<'py, PyList> = items.downcast_into()?;
    list.iter()
        .map(|item| item.downcast_into::<PyDict>().map_err(PyErr::from))
        .collect()
}

// ========================================================================
// Configuration Parsers
// ========================================================================

/// Convert Python dict to SimulationConfig
///
/// Mirrors the JSON config layout: `rng_seed`, `nodes`, `jobs`, and the
/// optional `tracked_nodes` / `stall_threshold`.
pub fn parse_simulation_config(py_config: &Bound<'_, PyDict>) -> PyResult<SimulationConfig> {
    let rng_seed: u64 = extract_required(py_config, "rng_seed")?;

    let nodes = dicts_in(py_config, "nodes")?
        .iter()
        .map(parse_node_config)
        .collect::<PyResult<Vec<_>>>()?;
    let jobs = dicts_in(py_config, "jobs")?
        .iter()
        .map(parse_job_config)
        .collect::<PyResult<Vec<_>>>()?;

    let tracked_nodes: Vec<u32> = extract_with_default(py_config, "tracked_nodes", Vec::new())?;
    let stall_threshold: u64 =
        extract_with_default(py_config, "stall_threshold", DEFAULT_STALL_THRESHOLD)?;

    Ok(SimulationConfig::new(rng_seed)
        .with_nodes(nodes)
        .with_jobs(jobs)
        .with_tracked_nodes(tracked_nodes)
        .with_stall_threshold(stall_threshold))
}

fn parse_node_config(py_node: &Bound<'_, PyDict>) -> PyResult<NodeConfig> {
    Ok(NodeConfig {
        performance: extract_required(py_node, "performance")?,
        false_ratio: extract_with_default(py_node, "false_ratio", 0.0)?,
        last_action_time: extract_with_default(py_node, "last_action_time", None)?,
    })
}

fn parse_job_config(py_job: &Bound<'_, PyDict>) -> PyResult<JobConfig> {
    Ok(JobConfig {
        difficulty: extract_with_default(py_job, "difficulty", 1.0)?,
        active: extract_with_default(py_job, "active", false)?,
    })
}

// ========================================================================
// Result Converters
// ========================================================================

pub fn tick_result_to_py(py: Python<'_>, result: &TickResult) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);

    dict.set_item("tick", result.tick)?;
    dict.set_item("nodes_processed", result.nodes_processed)?;
    dict.set_item("assignments", result.assignments)?;
    dict.set_item("results_submitted", result.results_submitted)?;
    dict.set_item("jobs_completed", result.jobs_completed)?;
    dict.set_item("nodes_retired", result.nodes_retired)?;
    dict.set_item("status", format!("{:?}", result.status))?;

    Ok(dict.unbind())
}

pub fn run_summary_to_py(py: Python<'_>, summary: &RunSummary) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);

    dict.set_item("final_tick", summary.final_tick)?;
    dict.set_item("jobs_completed", summary.jobs_completed)?;
    dict.set_item("jobs_total", summary.jobs_total)?;
    dict.set_item("results_sent", summary.results_sent)?;
    dict.set_item("late_submissions", summary.late_submissions)?;
    dict.set_item("redundancy_ratio", summary.redundancy_ratio)?;
    dict.set_item("retired_nodes", summary.retired_nodes)?;

    Ok(dict.unbind())
}
