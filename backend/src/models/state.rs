//! Simulation State
//!
//! Arena owning every job and node. Entities reference each other only
//! through [`JobId`] / [`NodeId`] handles, so reservations and results never
//! dangle when the scheduler removes and re-inserts entities.
//!
//! # Critical Invariants
//!
//! 1. **Handle Stability**: `jobs[i].id() == JobId(i)`, `nodes[i].id() == NodeId(i)`
//! 2. **Single Reservation**: a node holds at most one reservation, mirrored in its job
//! 3. **Payout Before Failure**: trust payouts are credited before a wrong
//!    consensus is reported, so the host observes the post-payout state

use crate::models::ids::{JobId, NodeId};
use crate::models::job::{ConsensusError, FinalizeOutcome, Job, CANONICAL_HASH};
use crate::models::node::Node;
use crate::rng::RandomSource;

/// Result of finishing a node's outstanding work
#[derive(Debug, Clone, PartialEq)]
pub struct FinishReport {
    /// Job the work belonged to
    pub job: JobId,

    /// What the finalize did
    pub outcome: FinalizeOutcome,
}

/// Complete simulation state
///
/// # Example
///
/// ```rust
/// use trust_simulator_core_rs::models::{Job, JobId, Node, NodeId};
/// use trust_simulator_core_rs::{RngManager, SimulationState};
///
/// let nodes = vec![Node::new(NodeId(0), 0.0, 0.0)];
/// let jobs = vec![Job::new(JobId(0), 1.0).with_active(true)];
/// let mut state = SimulationState::new(nodes, jobs);
/// let mut rng = RngManager::new(1);
///
/// state.start_work(NodeId(0), JobId(0), 0.4, 0).unwrap();
/// let report = state.finish_work(NodeId(0), &mut rng).unwrap();
/// assert_eq!(report.job, JobId(0));
/// assert!((state.job(JobId(0)).best_correctness() - 0.4).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct SimulationState {
    nodes: Vec<Node>,
    jobs: Vec<Job>,
}

impl SimulationState {
    /// Create a new state from pre-built entities
    ///
    /// # Panics
    ///
    /// Panics if an entity's handle does not match its arena position
    pub fn new(nodes: Vec<Node>, jobs: Vec<Job>) -> Self {
        for (index, node) in nodes.iter().enumerate() {
            assert_eq!(node.id().index(), index, "node handle must match position");
        }
        for (index, job) in jobs.iter().enumerate() {
            assert_eq!(job.id().index(), index, "job handle must match position");
        }

        Self { nodes, jobs }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn job(&self, id: JobId) -> &Job {
        &self.jobs[id.index()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Mutable job arena, used by the scheduler to activate jobs
    pub fn jobs_mut(&mut self) -> &mut [Job] {
        &mut self.jobs
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Number of jobs whose best hash reached the threshold
    pub fn num_done_jobs(&self) -> usize {
        self.jobs.iter().filter(|job| job.is_done()).count()
    }

    /// Node `node_id` starts `job_id` with the given correctness weight
    pub fn start_work(
        &mut self,
        node_id: NodeId,
        job_id: JobId,
        correctness: f64,
        now: u64,
    ) -> Result<(), ConsensusError> {
        let node = &mut self.nodes[node_id.index()];
        let job = &mut self.jobs[job_id.index()];
        node.start_work(job, correctness, now)
    }

    /// Finalize the node's outstanding work and apply any trust payout
    ///
    /// # Errors
    ///
    /// - `NoReservation` if the node is idle
    /// - `WrongConsensus` if this submission completed the job around a
    ///   non-canonical hash (payouts have already been credited)
    /// - any invariant violation from the job
    pub fn finish_work(
        &mut self,
        node_id: NodeId,
        rng: &mut impl RandomSource,
    ) -> Result<FinishReport, ConsensusError> {
        let node = &mut self.nodes[node_id.index()];
        let job_id = node
            .current_reservation()
            .map(|reservation| reservation.job)
            .ok_or(ConsensusError::NoReservation { node: node_id })?;

        let job = &mut self.jobs[job_id.index()];
        let outcome = node.finish_work(job, rng)?;

        if let FinalizeOutcome::Completed {
            winning_hash,
            payouts,
            ..
        } = &outcome
        {
            for payout in payouts {
                self.nodes[payout.node.index()].credit_trust(payout.amount);
            }

            if *winning_hash != CANONICAL_HASH {
                return Err(ConsensusError::WrongConsensus {
                    job: job_id,
                    hash: *winning_hash,
                    correctness: self.jobs[job_id.index()].best_correctness(),
                });
            }
        }

        Ok(FinishReport {
            job: job_id,
            outcome,
        })
    }
}
