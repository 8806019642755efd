//! Trust Simulator Core - Rust Engine
//!
//! Deterministic simulation of trust-weighted redundant verification in a
//! volunteer-computing project.
//!
//! # Architecture
//!
//! - **core**: Time management
//! - **models**: Domain types (Job, Node, State, Events)
//! - **scheduler**: Job/node ordering, assignment and trust scores
//! - **orchestrator**: Configuration and the main simulation loop
//! - **population**: Deterministic population generation
//! - **telemetry**: Trust trajectory sinks
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All randomness is deterministic (seeded RNG)
//! 2. Entities are referenced by arena handles, never by pointer
//! 3. A non-canonical hash reaching consensus is a reported failure, not a
//!    process exit
//! 4. FFI boundary is minimal and safe

// Module declarations
pub mod core;
pub mod models;
pub mod orchestrator;
pub mod population;
pub mod rng;
pub mod scheduler;
pub mod telemetry;

// Re-exports for convenience
pub use crate::core::time::TimeManager;
pub use models::{
    event::{Event, EventLog},
    job::{ConsensusError, FinalizeOutcome, Job},
    node::Node,
    state::SimulationState,
    JobId, NodeId,
};
pub use orchestrator::{
    JobConfig, NodeConfig, RunOutcome, RunStatus, RunSummary, Simulation, SimulationConfig,
    SimulationError, TickResult,
};
pub use population::{PopulationConfig, ValueDistribution};
pub use rng::{RandomSource, RngManager};
pub use scheduler::Project;
pub use telemetry::{NullTelemetry, TelemetrySink, TrustRecorder};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn trust_simulator_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::simulation::PySimulation>()?;
    Ok(())
}
