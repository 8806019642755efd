//! Worker node model
//!
//! A node pulls one job at a time, finishes it after a delay that depends on
//! job difficulty and node performance, and submits either the canonical hash
//! or (with probability `false_ratio`) a fabricated one.

use crate::models::ids::{JobId, NodeId};
use crate::models::job::{ConsensusError, FinalizeOutcome, Job, Reservation, WorkResult, CANONICAL_HASH};
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ticks of work per unit of difficulty for a node with zero performance
pub const DELAY_SCALE: f64 = 100.0;

/// A simulated worker with speed, honesty and accumulated trust
///
/// # Example
/// ```
/// use trust_simulator_core_rs::models::{Job, JobId, Node, NodeId};
///
/// let mut node = Node::new(NodeId(0), 0.5, 0.0);
/// let mut job = Job::new(JobId(0), 1.0);
///
/// node.start_work(&mut job, 0.3, 10).unwrap();
/// assert_eq!(node.next_action_time(), 10 + 1 + 50);
/// assert!(!node.is_idle());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,

    /// Accumulated reputation, only ever increased by payouts
    trust: f64,

    /// Fraction of the nominal delay saved, in [0, 1]
    performance: f64,

    /// Probability of submitting a fabricated hash, in [0, 1]
    false_ratio: f64,

    /// Tick at which the node next finalizes or asks for work
    next_action_time: u64,

    /// Retirement deadline; the node stops taking work once idle after it
    last_action_time: Option<u64>,

    current_reservation: Option<Reservation>,

    submitted_jobs: BTreeSet<JobId>,

    /// Accepted submissions in the order they were made
    results: Vec<WorkResult>,
}

impl Node {
    /// Create a node with zero trust
    ///
    /// # Panics
    /// Panics if `performance` or `false_ratio` is outside [0, 1]
    pub fn new(id: NodeId, performance: f64, false_ratio: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&performance),
            "performance must be in [0, 1]"
        );
        assert!(
            (0.0..=1.0).contains(&false_ratio),
            "false_ratio must be in [0, 1]"
        );

        Self {
            id,
            trust: 0.0,
            performance,
            false_ratio,
            next_action_time: 0,
            last_action_time: None,
            current_reservation: None,
            submitted_jobs: BTreeSet::new(),
            results: Vec::new(),
        }
    }

    /// Builder: retire the node once idle after `tick`
    pub fn with_last_action_time(mut self, tick: u64) -> Self {
        self.last_action_time = Some(tick);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn trust(&self) -> f64 {
        self.trust
    }

    pub fn performance(&self) -> f64 {
        self.performance
    }

    pub fn false_ratio(&self) -> f64 {
        self.false_ratio
    }

    pub fn next_action_time(&self) -> u64 {
        self.next_action_time
    }

    pub fn last_action_time(&self) -> Option<u64> {
        self.last_action_time
    }

    pub fn current_reservation(&self) -> Option<&Reservation> {
        self.current_reservation.as_ref()
    }

    pub fn results(&self) -> &[WorkResult] {
        &self.results
    }

    pub fn is_idle(&self) -> bool {
        self.current_reservation.is_none()
    }

    /// Whether the node already has an accepted result for `job`
    pub fn has_submitted(&self, job: JobId) -> bool {
        self.submitted_jobs.contains(&job)
    }

    /// Whether the retirement deadline lies strictly before `tick`
    pub fn deadline_passed(&self, tick: u64) -> bool {
        self.last_action_time.is_some_and(|deadline| deadline < tick)
    }

    /// Reschedule without taking work (no job was available)
    pub fn set_next_action_time(&mut self, tick: u64) {
        self.next_action_time = tick;
    }

    /// Add a payout to the node's trust
    pub fn credit_trust(&mut self, amount: f64) {
        self.trust += amount;
    }

    /// Reserve `job` with the given correctness weight and schedule completion
    ///
    /// The node is due again at
    /// `now + 1 + floor(DELAY_SCALE * difficulty * (1 - performance))`,
    /// saturating at `u64::MAX` (never due).
    ///
    /// # Errors
    /// - `NodeBusy` if the node already holds a reservation
    /// - `DuplicateReservation` from the job
    pub fn start_work(
        &mut self,
        job: &mut Job,
        correctness: f64,
        now: u64,
    ) -> Result<(), ConsensusError> {
        if let Some(current) = &self.current_reservation {
            return Err(ConsensusError::NodeBusy {
                node: self.id,
                job: current.job,
            });
        }

        job.reserve(self.id, correctness)?;
        self.current_reservation = Some(Reservation {
            job: job.id(),
            node: self.id,
            correctness,
        });

        // The float-to-int cast saturates for huge difficulties
        let delay = (DELAY_SCALE * job.difficulty() * (1.0 - self.performance)).floor() as u64;
        self.next_action_time = now.saturating_add(1).saturating_add(delay);
        Ok(())
    }

    /// Submit a hash for the current reservation
    ///
    /// Once `job` is confirmed to be the reserved one, the reservation is
    /// cleared whatever the outcome. Honest nodes (`false_ratio == 0`) never
    /// consume randomness here.
    ///
    /// # Errors
    /// - `NoReservation` if the node is idle
    /// - `UnknownReservation` if `job` is not the reserved job; nothing is
    ///   modified
    /// - any error from [`Job::finalize`]
    pub fn finish_work(
        &mut self,
        job: &mut Job,
        rng: &mut impl RandomSource,
    ) -> Result<FinalizeOutcome, ConsensusError> {
        match &self.current_reservation {
            None => return Err(ConsensusError::NoReservation { node: self.id }),
            Some(current) if current.job != job.id() => {
                return Err(ConsensusError::UnknownReservation {
                    job: job.id(),
                    node: self.id,
                })
            }
            Some(_) => {}
        }
        let reservation = self
            .current_reservation
            .take()
            .ok_or(ConsensusError::NoReservation { node: self.id })?;

        let mut hash = CANONICAL_HASH;
        if self.false_ratio > 0.0 && rng.next_f64() < self.false_ratio {
            hash = rng.nonzero_hash();
        }

        let outcome = job.finalize(reservation, hash)?;
        if let Some(result) = outcome.result() {
            self.results.push(*result);
            self.submitted_jobs.insert(result.job);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RngManager;

    #[test]
    #[should_panic(expected = "performance must be in [0, 1]")]
    fn test_performance_out_of_range_panics() {
        Node::new(NodeId(0), 1.5, 0.0);
    }

    #[test]
    fn test_full_performance_still_advances() {
        let mut node = Node::new(NodeId(0), 1.0, 0.0);
        let mut job = Job::new(JobId(0), 5.0);

        node.start_work(&mut job, 0.1, 7).unwrap();
        assert_eq!(node.next_action_time(), 8);
    }

    #[test]
    fn test_busy_node_cannot_start_again() {
        let mut node = Node::new(NodeId(2), 0.0, 0.0);
        let mut first = Job::new(JobId(0), 1.0);
        let mut second = Job::new(JobId(1), 1.0);

        node.start_work(&mut first, 0.1, 0).unwrap();
        let err = node.start_work(&mut second, 0.1, 0).unwrap_err();
        assert_eq!(
            err,
            ConsensusError::NodeBusy {
                node: NodeId(2),
                job: JobId(0)
            }
        );
        assert_eq!(second.reservation_count(), 0);
    }

    #[test]
    fn test_idle_node_cannot_finish() {
        let mut node = Node::new(NodeId(4), 0.0, 0.0);
        let mut job = Job::new(JobId(0), 1.0);
        let mut rng = RngManager::new(1);

        let err = node.finish_work(&mut job, &mut rng).unwrap_err();
        assert_eq!(err, ConsensusError::NoReservation { node: NodeId(4) });
    }

    #[test]
    fn test_deadline_is_strict() {
        let node = Node::new(NodeId(0), 0.0, 0.0).with_last_action_time(250);
        assert!(!node.deadline_passed(250));
        assert!(node.deadline_passed(251));
        assert!(!Node::new(NodeId(1), 0.0, 0.0).deadline_passed(u64::MAX));
    }
}
