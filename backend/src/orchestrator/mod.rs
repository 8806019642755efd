//! Orchestrator - main simulation loop
//!
//! [`Simulation`] drives the trust model tick by tick from a
//! [`SimulationConfig`]. See `engine.rs` for the tick phases.

pub mod config;
pub mod engine;

pub use config::{JobConfig, NodeConfig, SimulationConfig, DEFAULT_STALL_THRESHOLD};
pub use engine::{
    RunOutcome, RunStatus, RunSummary, Simulation, SimulationError, TickResult,
    CORRECTNESS_NOISE, MAX_RESERVATION_CORRECTNESS,
};
