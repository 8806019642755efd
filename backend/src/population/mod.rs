//! Population generation for experiment setup.
//!
//! Builds a [`SimulationConfig`] from a compact description of the node and
//! job populations. All generation is deterministic based on the seed.
//!
//! # Key Principles
//!
//! 1. **Determinism**: Same seed + same population → same config
//! 2. **Independent stream**: generation draws from its own RNG so the
//!    simulation's random sequence does not depend on population size
//! 3. **Cohorts**: dishonest nodes are a random subset; retiring nodes are
//!    the lowest handles
//!
//! # Example
//!
//! ```
//! use trust_simulator_core_rs::population::{PopulationConfig, ValueDistribution};
//!
//! let population = PopulationConfig {
//!     num_nodes: 50,
//!     num_jobs: 200,
//!     dishonest_nodes: 5,
//!     false_ratio: 0.3,
//!     performance: ValueDistribution::Uniform { min: 0.2, max: 0.8 },
//!     ..PopulationConfig::default()
//! };
//!
//! let config = population.generate(42).unwrap();
//! assert_eq!(config.nodes.len(), 50);
//! assert_eq!(config.jobs.iter().filter(|job| job.active).count(), 1);
//! ```

use crate::orchestrator::{
    JobConfig, NodeConfig, SimulationConfig, SimulationError, DEFAULT_STALL_THRESHOLD,
};
use crate::rng::{RandomSource, RngManager};
use serde::{Deserialize, Serialize};

/// Mixed into the seed so generation and simulation use different streams
const POPULATION_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Distribution of a per-entity value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueDistribution {
    /// Every entity gets the same value
    Fixed { value: f64 },

    /// Uniform between min (inclusive) and max (exclusive)
    Uniform { min: f64, max: f64 },
}

impl ValueDistribution {
    /// Draw one value
    pub fn sample(&self, rng: &mut impl RandomSource) -> f64 {
        match self {
            ValueDistribution::Fixed { value } => *value,
            ValueDistribution::Uniform { min, max } => rng.uniform(*min, *max),
        }
    }

    /// Smallest and largest value the distribution can produce
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            ValueDistribution::Fixed { value } => (*value, *value),
            ValueDistribution::Uniform { min, max } => (*min, *max),
        }
    }
}

fn default_initial_active_jobs() -> usize {
    1
}

fn default_performance() -> ValueDistribution {
    ValueDistribution::Uniform { min: 0.0, max: 1.0 }
}

fn default_difficulty() -> ValueDistribution {
    ValueDistribution::Fixed { value: 1.0 }
}

fn default_stall_threshold() -> u64 {
    DEFAULT_STALL_THRESHOLD
}

/// Compact description of a node and job population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub num_nodes: usize,
    pub num_jobs: usize,

    /// Jobs (lowest handles) that start in the working set
    #[serde(default = "default_initial_active_jobs")]
    pub initial_active_jobs: usize,

    #[serde(default = "default_performance")]
    pub performance: ValueDistribution,

    #[serde(default = "default_difficulty")]
    pub difficulty: ValueDistribution,

    /// Size of the randomly chosen dishonest cohort
    #[serde(default)]
    pub dishonest_nodes: usize,

    /// False ratio of every dishonest node
    #[serde(default)]
    pub false_ratio: f64,

    /// Number of nodes (lowest handles) that retire after `retire_after`
    #[serde(default)]
    pub retiring_nodes: usize,

    #[serde(default)]
    pub retire_after: u64,

    #[serde(default)]
    pub tracked_nodes: Vec<u32>,

    #[serde(default = "default_stall_threshold")]
    pub stall_threshold: u64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            num_nodes: 100,
            num_jobs: 1000,
            initial_active_jobs: default_initial_active_jobs(),
            performance: default_performance(),
            difficulty: default_difficulty(),
            dishonest_nodes: 0,
            false_ratio: 0.0,
            retiring_nodes: 0,
            retire_after: 0,
            tracked_nodes: Vec::new(),
            stall_threshold: DEFAULT_STALL_THRESHOLD,
        }
    }
}

impl PopulationConfig {
    /// Check cohort sizes and value ranges
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.dishonest_nodes > self.num_nodes {
            return Err(SimulationError::InvalidConfig(format!(
                "dishonest_nodes ({}) exceeds num_nodes ({})",
                self.dishonest_nodes, self.num_nodes
            )));
        }
        if self.retiring_nodes > self.num_nodes {
            return Err(SimulationError::InvalidConfig(format!(
                "retiring_nodes ({}) exceeds num_nodes ({})",
                self.retiring_nodes, self.num_nodes
            )));
        }
        if self.retiring_nodes > 0 && self.retire_after == 0 {
            return Err(SimulationError::InvalidConfig(
                "retire_after must be > 0 when nodes retire".to_string(),
            ));
        }
        if self.initial_active_jobs > self.num_jobs {
            return Err(SimulationError::InvalidConfig(format!(
                "initial_active_jobs ({}) exceeds num_jobs ({})",
                self.initial_active_jobs, self.num_jobs
            )));
        }

        let (lo, hi) = self.performance.bounds();
        if lo > hi || lo < 0.0 || hi > 1.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "performance range [{}, {}] outside [0, 1]",
                lo, hi
            )));
        }
        let (lo, hi) = self.difficulty.bounds();
        if lo > hi || lo < 0.0 || !hi.is_finite() {
            return Err(SimulationError::InvalidConfig(format!(
                "difficulty range [{}, {}] must be finite and non-negative",
                lo, hi
            )));
        }
        if !(0.0..=1.0).contains(&self.false_ratio) {
            return Err(SimulationError::InvalidConfig(format!(
                "false_ratio {} outside [0, 1]",
                self.false_ratio
            )));
        }

        Ok(())
    }

    /// Generate a full simulation config
    ///
    /// The returned config carries `seed` as its `rng_seed`, and is
    /// validated before it is returned.
    pub fn generate(&self, seed: u64) -> Result<SimulationConfig, SimulationError> {
        self.validate()?;

        let mut rng = RngManager::new(seed ^ POPULATION_SEED_SALT);

        let mut nodes: Vec<NodeConfig> = (0..self.num_nodes)
            .map(|_| NodeConfig::honest(self.performance.sample(&mut rng)))
            .collect();

        for index in self.pick_dishonest(&mut rng) {
            nodes[index].false_ratio = self.false_ratio;
        }
        for node in nodes.iter_mut().take(self.retiring_nodes) {
            node.last_action_time = Some(self.retire_after);
        }

        let jobs = (0..self.num_jobs)
            .map(|index| JobConfig {
                difficulty: self.difficulty.sample(&mut rng),
                active: index < self.initial_active_jobs,
            })
            .collect();

        let config = SimulationConfig::new(seed)
            .with_nodes(nodes)
            .with_jobs(jobs)
            .with_tracked_nodes(self.tracked_nodes.clone())
            .with_stall_threshold(self.stall_threshold);
        config.validate()?;
        Ok(config)
    }

    /// Partial Fisher-Yates over node indices
    fn pick_dishonest(&self, rng: &mut RngManager) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.num_nodes).collect();
        for i in 0..self.dishonest_nodes {
            let j = rng.range(i as i64, self.num_nodes as i64) as usize;
            indices.swap(i, j);
        }
        indices.truncate(self.dishonest_nodes);
        indices
    }
}
