//! Assignment scheduler
//!
//! [`Project`] owns the two ordered collections that drive the simulation:
//!
//! - **Job order**: active jobs first, closest to completion first. Used to
//!   pick the job a node should corroborate next.
//! - **Node order**: earliest `next_action_time` first. This is the event
//!   queue; the driver drains it tick by tick.
//!
//! It also normalises raw trust into a score in `[TRUST_FLOOR, 1]` relative to
//! the best trust seen so far.

mod ordering;

pub use ordering::{JobOrderKey, NodeOrderKey};

use crate::models::{ConsensusError, Job, JobId, Node, NodeId, COMPLETION_THRESHOLD};
use crate::rng::RandomSource;
use std::collections::BTreeSet;
use tracing::trace;

/// Trust score of a node when nobody has earned trust yet, and the additive
/// floor of every score afterwards
pub const TRUST_FLOOR: f64 = 0.1;

/// Range of the randomized target confidence before trust is subtracted
pub const TARGET_RANGE: (f64, f64) = (1.0, 1.3);

/// Assignment scheduler for a volunteer-computing project
///
/// # Example
/// ```
/// use trust_simulator_core_rs::models::{Job, JobId, Node, NodeId};
/// use trust_simulator_core_rs::{Project, RngManager};
///
/// let jobs = vec![Job::new(JobId(0), 1.0).with_active(true)];
/// let node = Node::new(NodeId(0), 0.0, 0.0);
/// let mut project = Project::new();
/// for job in &jobs {
///     project.insert_job(job);
/// }
///
/// let mut rng = RngManager::new(7);
/// let found = project.find_job_for_node(&node, &jobs, &mut rng).unwrap();
/// assert_eq!(found, Some(JobId(0)));
/// assert_eq!(project.queued_jobs(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Project {
    job_order: BTreeSet<JobOrderKey>,

    /// Key each job was inserted under, indexed by handle
    job_keys: Vec<Option<JobOrderKey>>,

    node_order: BTreeSet<NodeOrderKey>,

    /// Key each node was inserted under, indexed by handle
    node_keys: Vec<Option<NodeOrderKey>>,

    best_trust: f64,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest raw trust recorded so far
    pub fn best_trust(&self) -> f64 {
        self.best_trust
    }

    /// Number of jobs currently in the job order
    pub fn queued_jobs(&self) -> usize {
        self.job_order.len()
    }

    /// Number of active jobs currently in the job order
    pub fn active_jobs(&self) -> usize {
        self.job_order.iter().take_while(|key| key.active).count()
    }

    /// Number of nodes currently in the event queue
    pub fn scheduled_nodes(&self) -> usize {
        self.node_order.len()
    }

    pub fn contains_job(&self, job: JobId) -> bool {
        matches!(self.job_keys.get(job.index()), Some(Some(_)))
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        matches!(self.node_keys.get(node.index()), Some(Some(_)))
    }

    // ========================================================================
    // Job order
    // ========================================================================

    /// Insert (or re-insert) a job under its current key
    pub fn insert_job(&mut self, job: &Job) {
        self.remove_job(job.id());

        let key = JobOrderKey::of(job);
        let slot = job.id().index();
        if self.job_keys.len() <= slot {
            self.job_keys.resize(slot + 1, None);
        }
        self.job_keys[slot] = Some(key);
        self.job_order.insert(key);
    }

    /// Remove a job; returns false if it was not queued
    pub fn remove_job(&mut self, job: JobId) -> bool {
        match self.job_keys.get_mut(job.index()).and_then(Option::take) {
            Some(key) => self.job_order.remove(&key),
            None => false,
        }
    }

    /// Activate the highest-priority inactive job
    ///
    /// Inactive jobs sort after every active one; among them the lowest
    /// handle comes first. Returns `None` when every queued job is active.
    pub fn activate_job(&mut self, jobs: &mut [Job]) -> Option<JobId> {
        let key = self
            .job_order
            .range(JobOrderKey::first_inactive()..)
            .next()
            .copied()?;

        self.remove_job(key.job);
        let job = &mut jobs[key.job.index()];
        job.activate();
        self.insert_job(job);
        Some(key.job)
    }

    /// Pick a job for `node` and take it out of the job order
    ///
    /// The target confidence is `uniform(TARGET_RANGE) - trust_score`, clamped
    /// to `[0, 1]`: distrusted nodes are steered toward jobs that need more
    /// corroboration, trusted nodes toward jobs close to completion. The scan
    /// starts at the first active job whose correctness does not exceed the
    /// target and walks toward less corroborated jobs, skipping jobs that are
    /// already saturated or that the node has submitted to. If nothing fits,
    /// the scan is repeated from the top of the active set.
    ///
    /// # Errors
    /// `TrustAboveMaximum` if the node's trust was never recorded
    pub fn find_job_for_node(
        &mut self,
        node: &Node,
        jobs: &[Job],
        rng: &mut impl RandomSource,
    ) -> Result<Option<JobId>, ConsensusError> {
        let score = self.trust_score(node)?;
        let target = (rng.uniform(TARGET_RANGE.0, TARGET_RANGE.1) - score).clamp(0.0, 1.0);

        let found = self
            .scan_from(target, node, jobs)
            .or_else(|| self.scan_from(COMPLETION_THRESHOLD, node, jobs));

        let Some(key) = found else {
            trace!(node = %node.id(), target_confidence = target, "no eligible job");
            return Ok(None);
        };

        self.remove_job(key.job);
        trace!(node = %node.id(), job = %key.job, target_confidence = target, "job selected");
        Ok(Some(key.job))
    }

    fn scan_from(&self, target: f64, node: &Node, jobs: &[Job]) -> Option<JobOrderKey> {
        self.job_order
            .range(JobOrderKey::active_at_most(target)..)
            .take_while(|key| key.active)
            .find(|key| {
                let job = &jobs[key.job.index()];
                job.correctness() < COMPLETION_THRESHOLD && !node.has_submitted(key.job)
            })
            .copied()
    }

    // ========================================================================
    // Node order
    // ========================================================================

    /// Insert (or re-insert) a node under its current due time and record
    /// its trust
    pub fn insert_node(&mut self, node: &Node) {
        self.remove_node(node.id());

        let key = NodeOrderKey::of(node);
        let slot = node.id().index();
        if self.node_keys.len() <= slot {
            self.node_keys.resize(slot + 1, None);
        }
        self.node_keys[slot] = Some(key);
        self.node_order.insert(key);
        self.record_trust(node);
    }

    /// Remove a node; returns false if it was not scheduled
    pub fn remove_node(&mut self, node: NodeId) -> bool {
        match self.node_keys.get_mut(node.index()).and_then(Option::take) {
            Some(key) => self.node_order.remove(&key),
            None => false,
        }
    }

    /// Take every node due at or before `tick`, earliest first
    ///
    /// The returned nodes are no longer scheduled; the caller re-inserts the
    /// ones that stay in the simulation.
    pub fn drain_due_nodes(&mut self, tick: u64) -> Vec<NodeId> {
        let mut due = Vec::new();
        while let Some(key) = self.node_order.first().copied() {
            if key.next_action_time > tick {
                break;
            }
            self.remove_node(key.node);
            due.push(key.node);
        }
        due
    }

    // ========================================================================
    // Trust
    // ========================================================================

    /// Trust normalised against the best trust seen, in `[TRUST_FLOOR, 1]`
    ///
    /// # Errors
    /// `TrustAboveMaximum` if the node's trust exceeds the recorded maximum,
    /// which means a payout was not followed by [`Project::record_trust`]
    pub fn trust_score(&self, node: &Node) -> Result<f64, ConsensusError> {
        if self.best_trust == 0.0 {
            return Ok(TRUST_FLOOR);
        }

        if node.trust() > self.best_trust {
            return Err(ConsensusError::TrustAboveMaximum {
                node: node.id(),
                trust: node.trust(),
                best: self.best_trust,
            });
        }

        Ok((TRUST_FLOOR + node.trust() / self.best_trust).clamp(0.0, 1.0))
    }

    /// Raise the tracked maximum to the node's trust if needed
    pub fn record_trust(&mut self, node: &Node) {
        if node.trust() > self.best_trust {
            self.best_trust = node.trust();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed value for every draw
    struct Fixed(f64);

    impl RandomSource for Fixed {
        fn next_f64(&mut self) -> f64 {
            self.0
        }

        fn nonzero_hash(&mut self) -> u64 {
            1
        }
    }

    fn job_with_correctness(id: u32, correctness: f64) -> Job {
        let mut job = Job::new(JobId(id), 1.0).with_active(true);
        if correctness > 0.0 {
            job.reserve(NodeId(1000 + id), correctness).unwrap();
        }
        job
    }

    fn project_with(jobs: &[Job]) -> Project {
        let mut project = Project::new();
        for job in jobs {
            project.insert_job(job);
        }
        project
    }

    #[test]
    fn test_trust_score_floor_without_trust() {
        let project = Project::new();
        let node = Node::new(NodeId(0), 0.0, 0.0);
        assert_eq!(project.trust_score(&node).unwrap(), TRUST_FLOOR);
    }

    #[test]
    fn test_trust_score_relative_to_best() {
        let mut project = Project::new();
        let mut best = Node::new(NodeId(0), 0.0, 0.0);
        let mut half = Node::new(NodeId(1), 0.0, 0.0);
        best.credit_trust(2.0);
        half.credit_trust(1.0);
        project.record_trust(&best);
        project.record_trust(&half);

        assert_eq!(project.best_trust(), 2.0);
        assert!((project.trust_score(&half).unwrap() - 0.6).abs() < 1e-12);
        assert_eq!(project.trust_score(&best).unwrap(), 1.0);
    }

    #[test]
    fn test_unrecorded_trust_is_invariant_violation() {
        let mut project = Project::new();
        let mut a = Node::new(NodeId(0), 0.0, 0.0);
        a.credit_trust(1.0);
        project.record_trust(&a);
        a.credit_trust(1.0);

        let err = project.trust_score(&a).unwrap_err();
        assert!(matches!(err, ConsensusError::TrustAboveMaximum { .. }));
    }

    #[test]
    fn test_newcomer_targets_jobs_near_completion() {
        // Fixed(0.0) => target = 1.0 - 0.1 = 0.9
        let jobs = vec![
            job_with_correctness(0, 0.95),
            job_with_correctness(1, 0.85),
            job_with_correctness(2, 0.2),
        ];
        let mut project = project_with(&jobs);
        let node = Node::new(NodeId(0), 0.0, 0.0);

        let found = project.find_job_for_node(&node, &jobs, &mut Fixed(0.0)).unwrap();
        assert_eq!(found, Some(JobId(1)));
        assert!(!project.contains_job(JobId(1)));
        assert_eq!(project.queued_jobs(), 2);
    }

    #[test]
    fn test_fallback_scans_from_top() {
        // Target 0.9 lies below both jobs; the sweep from 1.0 skips the
        // saturated job 1 and lands on job 0
        let jobs = vec![job_with_correctness(0, 0.95), job_with_correctness(1, 1.0)];
        let mut project = project_with(&jobs);
        let node = Node::new(NodeId(0), 0.0, 0.0);

        let found = project.find_job_for_node(&node, &jobs, &mut Fixed(0.0)).unwrap();
        assert_eq!(found, Some(JobId(0)));
    }

    #[test]
    fn test_inactive_jobs_never_assigned() {
        let jobs = vec![Job::new(JobId(0), 1.0)];
        let mut project = project_with(&jobs);
        let node = Node::new(NodeId(0), 0.0, 0.0);

        let found = project.find_job_for_node(&node, &jobs, &mut Fixed(0.5)).unwrap();
        assert_eq!(found, None);
        assert!(project.contains_job(JobId(0)));
    }

    #[test]
    fn test_activate_job_picks_lowest_inactive_handle() {
        let mut jobs = vec![
            Job::new(JobId(0), 1.0).with_active(true),
            Job::new(JobId(1), 1.0),
            Job::new(JobId(2), 1.0),
        ];
        let mut project = project_with(&jobs);
        assert_eq!(project.active_jobs(), 1);

        assert_eq!(project.activate_job(&mut jobs), Some(JobId(1)));
        assert!(jobs[1].is_active());
        assert_eq!(project.active_jobs(), 2);

        assert_eq!(project.activate_job(&mut jobs), Some(JobId(2)));
        assert_eq!(project.activate_job(&mut jobs), None);
        assert_eq!(project.active_jobs(), 3);
    }

    #[test]
    fn test_drain_due_nodes_in_order() {
        let mut project = Project::new();
        let mut nodes: Vec<Node> = (0..4).map(|i| Node::new(NodeId(i), 0.0, 0.0)).collect();
        nodes[0].set_next_action_time(5);
        nodes[1].set_next_action_time(2);
        nodes[2].set_next_action_time(2);
        nodes[3].set_next_action_time(9);
        for node in &nodes {
            project.insert_node(node);
        }

        let due = project.drain_due_nodes(5);
        assert_eq!(due, vec![NodeId(1), NodeId(2), NodeId(0)]);
        assert_eq!(project.scheduled_nodes(), 1);
        assert!(project.contains_node(NodeId(3)));
    }

    #[test]
    fn test_reinsert_after_mutation_uses_fresh_key() {
        let mut jobs = vec![Job::new(JobId(0), 1.0).with_active(true)];
        let mut project = project_with(&jobs);

        // Mutating while queued is tolerated because removal uses the stored key
        jobs[0].reserve(NodeId(1), 0.4).unwrap();
        assert!(project.remove_job(JobId(0)));
        assert!(!project.remove_job(JobId(0)));

        project.insert_job(&jobs[0]);
        assert_eq!(project.queued_jobs(), 1);
    }
}
