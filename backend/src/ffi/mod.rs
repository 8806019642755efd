//! Python bindings
//!
//! Compiled only with the `pyo3` feature.

pub mod simulation;
pub mod types;
