//! Telemetry collection
//!
//! The driver reports trust trajectories through [`TelemetrySink`]. The core
//! never renders or persists them; hosts pick a sink:
//!
//! - [`NullTelemetry`] discards everything
//! - [`TrustRecorder`] keeps per-node series in memory and can fingerprint
//!   them for reproducibility checks

use crate::models::NodeId;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Consumer of per-tick trust samples
pub trait TelemetrySink {
    /// Trust of a tracked node at the end of a tick
    fn on_trust_sample(&mut self, node: NodeId, tick: u64, trust_score: f64, raw_trust: f64);

    /// Tracked node was handed a job
    fn on_assignment(&mut self, node: NodeId, tick: u64, trust_score: f64);

    /// Results submitted per completed job so far
    fn on_redundancy_sample(&mut self, _tick: u64, _ratio: f64) {}
}

/// Sink that drops every sample
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn on_trust_sample(&mut self, _node: NodeId, _tick: u64, _trust_score: f64, _raw_trust: f64) {}

    fn on_assignment(&mut self, _node: NodeId, _tick: u64, _trust_score: f64) {}
}

/// Time series recorded for one tracked node
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeSeries {
    /// `(tick, trust_score)`
    pub trust_score: Vec<(u64, f64)>,

    /// `(tick, raw_trust)`
    pub raw_trust: Vec<(u64, f64)>,

    /// `(tick, trust_score)` at each assignment
    pub assignments: Vec<(u64, f64)>,
}

/// In-memory recorder of trust trajectories
///
/// # Example
/// ```
/// use trust_simulator_core_rs::models::NodeId;
/// use trust_simulator_core_rs::telemetry::{TelemetrySink, TrustRecorder};
///
/// let mut recorder = TrustRecorder::new();
/// recorder.on_trust_sample(NodeId(1), 0, 0.1, 0.0);
/// recorder.on_trust_sample(NodeId(1), 1, 0.4, 0.3);
///
/// let series = recorder.series(NodeId(1)).unwrap();
/// assert_eq!(series.raw_trust, vec![(0, 0.0), (1, 0.3)]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrustRecorder {
    nodes: BTreeMap<NodeId, NodeSeries>,

    /// `(tick, results_sent / jobs_completed)`
    redundancy: Vec<(u64, f64)>,
}

impl TrustRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn series(&self, node: NodeId) -> Option<&NodeSeries> {
        self.nodes.get(&node)
    }

    pub fn tracked_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn redundancy(&self) -> &[(u64, f64)] {
        &self.redundancy
    }

    /// SHA-256 over every recorded sample, hex encoded
    ///
    /// Two runs with the same seed and population produce the same
    /// fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();

        for (node, series) in &self.nodes {
            hasher.update(node.0.to_le_bytes());
            for samples in [&series.trust_score, &series.raw_trust, &series.assignments] {
                hasher.update((samples.len() as u64).to_le_bytes());
                for (tick, value) in samples {
                    hasher.update(tick.to_le_bytes());
                    hasher.update(value.to_bits().to_le_bytes());
                }
            }
        }
        for (tick, ratio) in &self.redundancy {
            hasher.update(tick.to_le_bytes());
            hasher.update(ratio.to_bits().to_le_bytes());
        }

        format!("{:x}", hasher.finalize())
    }
}

impl TelemetrySink for TrustRecorder {
    fn on_trust_sample(&mut self, node: NodeId, tick: u64, trust_score: f64, raw_trust: f64) {
        let series = self.nodes.entry(node).or_default();
        series.trust_score.push((tick, trust_score));
        series.raw_trust.push((tick, raw_trust));
    }

    fn on_assignment(&mut self, node: NodeId, tick: u64, trust_score: f64) {
        self.nodes
            .entry(node)
            .or_default()
            .assignments
            .push((tick, trust_score));
    }

    fn on_redundancy_sample(&mut self, tick: u64, ratio: f64) {
        self.redundancy.push((tick, ratio));
    }
}
