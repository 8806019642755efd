//! Simulation configuration
//!
//! A [`SimulationConfig`] fully determines a run: same config (including
//! `rng_seed`) → identical trust trajectories. Configs can be written by hand
//! (JSON via serde) or generated from a [`PopulationConfig`].
//!
//! [`PopulationConfig`]: crate::population::PopulationConfig

use crate::models::{Job, JobId, Node, NodeId};
use crate::orchestrator::SimulationError;
use serde::{Deserialize, Serialize};

/// Consecutive ticks without any assignment before a run counts as stalled
pub const DEFAULT_STALL_THRESHOLD: u64 = 1000;

fn default_stall_threshold() -> u64 {
    DEFAULT_STALL_THRESHOLD
}

fn default_difficulty() -> f64 {
    1.0
}

/// Per-node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Fraction of nominal work delay saved, in [0, 1]
    pub performance: f64,

    /// Probability of submitting a fabricated hash, in [0, 1]
    #[serde(default)]
    pub false_ratio: f64,

    /// Retirement deadline (`None` or `0` = never retire)
    #[serde(default)]
    pub last_action_time: Option<u64>,
}

impl NodeConfig {
    /// Honest node with the given performance
    pub fn honest(performance: f64) -> Self {
        Self {
            performance,
            false_ratio: 0.0,
            last_action_time: None,
        }
    }

    /// Builder: fabricate results with probability `false_ratio`
    pub fn with_false_ratio(mut self, false_ratio: f64) -> Self {
        self.false_ratio = false_ratio;
        self
    }

    /// Builder: retire once idle after `tick`
    pub fn with_last_action_time(mut self, tick: u64) -> Self {
        self.last_action_time = Some(tick);
        self
    }

    pub(crate) fn build(&self, id: NodeId) -> Node {
        let node = Node::new(id, self.performance, self.false_ratio);
        match self.last_action_time {
            Some(tick) if tick > 0 => node.with_last_action_time(tick),
            _ => node,
        }
    }
}

/// Per-job configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: f64,

    /// Start in the active working set
    #[serde(default)]
    pub active: bool,
}

impl JobConfig {
    pub fn new(difficulty: f64) -> Self {
        Self {
            difficulty,
            active: false,
        }
    }

    /// Builder: start in the active working set
    pub fn active(mut self) -> Self {
        self.active = true;
        self
    }

    pub(crate) fn build(&self, id: JobId) -> Job {
        Job::new(id, self.difficulty).with_active(self.active)
    }
}

/// Complete simulation configuration
///
/// # Example
/// ```
/// use trust_simulator_core_rs::orchestrator::{JobConfig, NodeConfig, SimulationConfig};
///
/// let config = SimulationConfig::new(42)
///     .with_nodes(vec![NodeConfig::honest(0.5); 3])
///     .with_jobs(vec![JobConfig::new(1.0).active()])
///     .with_tracked_nodes(vec![0]);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// RNG seed for deterministic simulation
    pub rng_seed: u64,

    /// Worker population, in handle order
    pub nodes: Vec<NodeConfig>,

    /// Job backlog, in handle order
    pub jobs: Vec<JobConfig>,

    /// Node handles whose trust is reported to telemetry every tick
    #[serde(default)]
    pub tracked_nodes: Vec<u32>,

    /// Consecutive idle ticks tolerated before the run stalls
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold: u64,
}

impl SimulationConfig {
    /// Empty configuration with the given seed
    pub fn new(rng_seed: u64) -> Self {
        Self {
            rng_seed,
            nodes: Vec::new(),
            jobs: Vec::new(),
            tracked_nodes: Vec::new(),
            stall_threshold: DEFAULT_STALL_THRESHOLD,
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<NodeConfig>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_jobs(mut self, jobs: Vec<JobConfig>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_tracked_nodes(mut self, tracked: Vec<u32>) -> Self {
        self.tracked_nodes = tracked;
        self
    }

    pub fn with_stall_threshold(mut self, ticks: u64) -> Self {
        self.stall_threshold = ticks;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.nodes.is_empty() {
            return Err(SimulationError::InvalidConfig(
                "Must have at least one node".to_string(),
            ));
        }

        if self.stall_threshold == 0 {
            return Err(SimulationError::InvalidConfig(
                "stall_threshold must be > 0".to_string(),
            ));
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if !(0.0..=1.0).contains(&node.performance) {
                return Err(SimulationError::InvalidConfig(format!(
                    "node {} performance {} outside [0, 1]",
                    index, node.performance
                )));
            }
            if !(0.0..=1.0).contains(&node.false_ratio) {
                return Err(SimulationError::InvalidConfig(format!(
                    "node {} false_ratio {} outside [0, 1]",
                    index, node.false_ratio
                )));
            }
        }

        for (index, job) in self.jobs.iter().enumerate() {
            if !job.difficulty.is_finite() || job.difficulty < 0.0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "job {} difficulty {} must be finite and non-negative",
                    index, job.difficulty
                )));
            }
        }

        for tracked in &self.tracked_nodes {
            if *tracked as usize >= self.nodes.len() {
                return Err(SimulationError::InvalidConfig(format!(
                    "tracked node {} does not exist ({} nodes)",
                    tracked,
                    self.nodes.len()
                )));
            }
        }

        Ok(())
    }
}
