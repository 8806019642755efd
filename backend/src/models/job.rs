//! Job model and incremental consensus
//!
//! A job is replicated across nodes until the results for a single hash
//! accumulate a correctness weight of at least [`COMPLETION_THRESHOLD`].
//!
//! Each job tracks:
//! - Reservations: in-flight work with a provisional correctness weight
//! - Results: accepted submissions, kept for the trust payout
//! - Per-hash running totals and the current leader (`best_correctness`)
//!
//! # Critical Invariants
//!
//! 1. `assumed_correctness >= -ASSUMED_CORRECTNESS_EPSILON` at all times
//! 2. `best_correctness` never decreases
//! 3. Completion fires at most once; later finalizes are no-ops
//! 4. `assumed_correctness + best_correctness <= reserved_total`

use crate::models::ids::{JobId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Hash value of the objectively correct computation
pub const CANONICAL_HASH: u64 = 0;

/// Correctness weight a single hash must reach for the job to be done
pub const COMPLETION_THRESHOLD: f64 = 1.0;

/// Tolerance for floating-point drift when releasing reservations
pub const ASSUMED_CORRECTNESS_EPSILON: f64 = 0.01;

/// Errors raised by the reservation/finalize protocol
///
/// Every variant except [`ConsensusError::WrongConsensus`] is a logic bug in
/// the simulator. `WrongConsensus` is the failure the simulation exists to
/// detect: the trust scheme let a fabricated hash win.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConsensusError {
    #[error("{job} already holds a reservation for {node}")]
    DuplicateReservation { job: JobId, node: NodeId },

    #[error("{job} has no reservation for {node}")]
    UnknownReservation { job: JobId, node: NodeId },

    #[error("{node} has no outstanding reservation")]
    NoReservation { node: NodeId },

    #[error("{node} is already working on {job}")]
    NodeBusy { node: NodeId, job: JobId },

    #[error("{job} assumed correctness dropped to {value}")]
    NegativeAssumedCorrectness { job: JobId, value: f64 },

    #[error("{node} trust {trust} exceeds tracked maximum {best}")]
    TrustAboveMaximum { node: NodeId, trust: f64, best: f64 },

    #[error("Incorrect result accepted for {job}: hash {hash:#x} reached correctness {correctness}")]
    WrongConsensus {
        job: JobId,
        hash: u64,
        correctness: f64,
    },
}

impl ConsensusError {
    /// True when the monitored trust scheme failed, false for simulator bugs
    pub fn is_protocol_failure(&self) -> bool {
        matches!(self, ConsensusError::WrongConsensus { .. })
    }
}

/// A node's pending claim on a job
///
/// Held by value in both the job's reservation map and the node's
/// `current_reservation`; released exactly once by [`Job::finalize`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub job: JobId,
    pub node: NodeId,
    pub correctness: f64,
}

/// An accepted, immutable submission
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkResult {
    pub job: JobId,
    pub node: NodeId,
    pub hash: u64,
    pub correctness: f64,
}

/// Trust owed to a node when a job completes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustPayout {
    pub node: NodeId,
    pub amount: f64,
}

/// What a finalize did to the job
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    /// The job was already done; the submission was discarded
    Late,

    /// The result was recorded and the job is still open
    Accepted(WorkResult),

    /// The result pushed a hash over the threshold
    Completed {
        result: WorkResult,
        winning_hash: u64,
        payouts: Vec<TrustPayout>,
    },
}

impl FinalizeOutcome {
    /// The recorded result, if the submission was not late
    pub fn result(&self) -> Option<&WorkResult> {
        match self {
            FinalizeOutcome::Late => None,
            FinalizeOutcome::Accepted(result) => Some(result),
            FinalizeOutcome::Completed { result, .. } => Some(result),
        }
    }

    /// Whether this finalize transitioned the job to done
    pub fn completed(&self) -> bool {
        matches!(self, FinalizeOutcome::Completed { .. })
    }
}

/// A unit of work requiring redundant verification
///
/// # Example
/// ```
/// use trust_simulator_core_rs::models::{Job, JobId, NodeId, CANONICAL_HASH};
///
/// let mut job = Job::new(JobId(0), 1.0);
/// job.reserve(NodeId(0), 0.6).unwrap();
/// job.reserve(NodeId(1), 0.5).unwrap();
/// assert!((job.correctness() - 1.1).abs() < 1e-9);
///
/// let first = job.reservation(NodeId(0)).copied().unwrap();
/// let outcome = job.finalize(first, CANONICAL_HASH).unwrap();
/// assert!(!outcome.completed());
///
/// let second = job.reservation(NodeId(1)).copied().unwrap();
/// let outcome = job.finalize(second, CANONICAL_HASH).unwrap();
/// assert!(outcome.completed());
/// assert!(job.is_done());
/// ```
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,

    /// Scales per-node execution delay
    difficulty: f64,

    /// Whether the job currently accepts new work
    active: bool,

    /// Sum of correctness of in-flight reservations
    assumed_correctness: f64,

    /// Highest per-hash total among accepted results
    best_correctness: f64,

    /// Sum of every correctness weight ever reserved
    reserved_total: f64,

    correctness_per_hash: BTreeMap<u64, f64>,

    reservations: BTreeMap<NodeId, Reservation>,

    /// Ordered-by-hash multimap of accepted results
    results: BTreeMap<u64, Vec<WorkResult>>,

    winning_hash: Option<u64>,

    late_submissions: usize,
}

impl Job {
    /// Create an inactive job
    ///
    /// # Panics
    /// Panics if difficulty is negative or not finite
    pub fn new(id: JobId, difficulty: f64) -> Self {
        assert!(
            difficulty.is_finite() && difficulty >= 0.0,
            "difficulty must be finite and non-negative"
        );

        Self {
            id,
            difficulty,
            active: false,
            assumed_correctness: 0.0,
            best_correctness: 0.0,
            reserved_total: 0.0,
            correctness_per_hash: BTreeMap::new(),
            reservations: BTreeMap::new(),
            results: BTreeMap::new(),
            winning_hash: None,
            late_submissions: 0,
        }
    }

    /// Builder: start the job in the active working set
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn assumed_correctness(&self) -> f64 {
        self.assumed_correctness
    }

    pub fn best_correctness(&self) -> f64 {
        self.best_correctness
    }

    pub fn reserved_total(&self) -> f64 {
        self.reserved_total
    }

    /// Provisional plus confirmed correctness, the scheduler's priority key
    pub fn correctness(&self) -> f64 {
        self.assumed_correctness + self.best_correctness
    }

    /// Done exactly when some hash reached the completion threshold
    pub fn is_done(&self) -> bool {
        self.best_correctness >= COMPLETION_THRESHOLD
    }

    /// Hash that reached the threshold, once the job is done
    pub fn winning_hash(&self) -> Option<u64> {
        self.winning_hash
    }

    /// Running correctness total submitted for `hash`
    pub fn correctness_for_hash(&self, hash: u64) -> f64 {
        self.correctness_per_hash.get(&hash).copied().unwrap_or(0.0)
    }

    pub fn reservation(&self, node: NodeId) -> Option<&Reservation> {
        self.reservations.get(&node)
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    /// All accepted results, ordered by hash
    pub fn results(&self) -> impl Iterator<Item = &WorkResult> {
        self.results.values().flatten()
    }

    pub fn results_for_hash(&self, hash: u64) -> &[WorkResult] {
        self.results.get(&hash).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn result_count(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    /// Nodes that have an accepted result on this job
    pub fn contributors(&self) -> Vec<NodeId> {
        self.results().map(|result| result.node).collect()
    }

    /// Submissions discarded because the job was already done
    pub fn late_submissions(&self) -> usize {
        self.late_submissions
    }

    // ========================================================================
    // State transitions
    // ========================================================================

    /// Put the job into the active working set
    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Register in-flight work by `node` with a provisional weight
    ///
    /// # Errors
    /// `DuplicateReservation` if the node already holds a reservation here
    pub fn reserve(&mut self, node: NodeId, correctness: f64) -> Result<(), ConsensusError> {
        if self.reservations.contains_key(&node) {
            return Err(ConsensusError::DuplicateReservation { job: self.id, node });
        }

        self.assumed_correctness += correctness;
        self.reserved_total += correctness;
        self.reservations.insert(
            node,
            Reservation {
                job: self.id,
                node,
                correctness,
            },
        );
        Ok(())
    }

    /// Release a reservation and submit `hash` for it
    ///
    /// Once the job is done every further finalize returns
    /// [`FinalizeOutcome::Late`] without touching consensus state.
    ///
    /// When a hash first crosses the threshold, every result carrying that
    /// hash earns `best_correctness - result.correctness`: the corroboration
    /// it received from everyone else. Crediting the payouts to nodes is the
    /// caller's job, as is treating a non-canonical winner as a failure.
    ///
    /// # Errors
    /// - `UnknownReservation` if the job holds no reservation for the node
    /// - `NegativeAssumedCorrectness` if releasing drives the provisional
    ///   total below `-ASSUMED_CORRECTNESS_EPSILON`
    pub fn finalize(
        &mut self,
        reservation: Reservation,
        hash: u64,
    ) -> Result<FinalizeOutcome, ConsensusError> {
        let released = self.reservations.remove(&reservation.node).ok_or(
            ConsensusError::UnknownReservation {
                job: self.id,
                node: reservation.node,
            },
        )?;

        self.assumed_correctness -= released.correctness;
        if self.assumed_correctness < -ASSUMED_CORRECTNESS_EPSILON {
            return Err(ConsensusError::NegativeAssumedCorrectness {
                job: self.id,
                value: self.assumed_correctness,
            });
        }

        if self.is_done() {
            self.late_submissions += 1;
            return Ok(FinalizeOutcome::Late);
        }

        let result = WorkResult {
            job: self.id,
            node: released.node,
            hash,
            correctness: released.correctness,
        };
        self.results.entry(hash).or_default().push(result);

        let total = self.correctness_per_hash.entry(hash).or_insert(0.0);
        *total += result.correctness;
        let total = *total;

        if total > self.best_correctness {
            self.best_correctness = total;
        }

        if !self.is_done() {
            return Ok(FinalizeOutcome::Accepted(result));
        }

        self.winning_hash = Some(hash);
        let best = self.best_correctness;
        let payouts = self
            .results_for_hash(hash)
            .iter()
            .map(|winner| TrustPayout {
                node: winner.node,
                amount: best - winner.correctness,
            })
            .collect();

        Ok(FinalizeOutcome::Completed {
            result,
            winning_hash: hash,
            payouts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserve(job: &mut Job, node: u32, correctness: f64) -> Reservation {
        job.reserve(NodeId(node), correctness).unwrap();
        *job.reservation(NodeId(node)).unwrap()
    }

    #[test]
    fn test_new_job_is_inactive_and_empty() {
        let job = Job::new(JobId(3), 2.0);
        assert!(!job.is_active());
        assert_eq!(job.correctness(), 0.0);
        assert_eq!(job.winning_hash(), None);
        assert_eq!(job.result_count(), 0);
    }

    #[test]
    #[should_panic(expected = "difficulty must be finite and non-negative")]
    fn test_negative_difficulty_panics() {
        Job::new(JobId(0), -1.0);
    }

    #[test]
    fn test_duplicate_reservation_rejected() {
        let mut job = Job::new(JobId(0), 1.0);
        job.reserve(NodeId(1), 0.3).unwrap();

        let err = job.reserve(NodeId(1), 0.3).unwrap_err();
        assert_eq!(
            err,
            ConsensusError::DuplicateReservation {
                job: JobId(0),
                node: NodeId(1)
            }
        );
        assert!((job.assumed_correctness() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_finalize_without_reservation_rejected() {
        let mut job = Job::new(JobId(0), 1.0);
        let stray = Reservation {
            job: JobId(0),
            node: NodeId(9),
            correctness: 0.5,
        };

        let err = job.finalize(stray, CANONICAL_HASH).unwrap_err();
        assert!(matches!(err, ConsensusError::UnknownReservation { .. }));
    }

    #[test]
    fn test_only_wrong_consensus_is_protocol_failure() {
        let wrong = ConsensusError::WrongConsensus {
            job: JobId(0),
            hash: 5,
            correctness: 1.2,
        };
        let bug = ConsensusError::NegativeAssumedCorrectness {
            job: JobId(0),
            value: -0.5,
        };

        assert!(wrong.is_protocol_failure());
        assert!(!bug.is_protocol_failure());
    }

    #[test]
    fn test_leader_tracks_highest_hash_total() {
        let mut job = Job::new(JobId(0), 1.0);
        let a = reserve(&mut job, 1, 0.4);
        let b = reserve(&mut job, 2, 0.3);
        let c = reserve(&mut job, 3, 0.2);

        job.finalize(a, 7).unwrap();
        job.finalize(b, CANONICAL_HASH).unwrap();
        job.finalize(c, CANONICAL_HASH).unwrap();

        assert!((job.correctness_for_hash(7) - 0.4).abs() < 1e-12);
        assert!((job.correctness_for_hash(CANONICAL_HASH) - 0.5).abs() < 1e-12);
        assert!((job.best_correctness() - 0.5).abs() < 1e-12);
        assert!(!job.is_done());
    }

    #[test]
    fn test_payout_is_corroboration_from_others() {
        let mut job = Job::new(JobId(0), 1.0);
        let a = reserve(&mut job, 1, 0.7);
        let b = reserve(&mut job, 2, 0.1);
        let c = reserve(&mut job, 3, 0.4);

        job.finalize(a, CANONICAL_HASH).unwrap();
        job.finalize(b, 42).unwrap();
        let outcome = job.finalize(c, CANONICAL_HASH).unwrap();

        match outcome {
            FinalizeOutcome::Completed {
                winning_hash,
                payouts,
                ..
            } => {
                assert_eq!(winning_hash, CANONICAL_HASH);
                assert_eq!(payouts.len(), 2);
                let by_node: BTreeMap<NodeId, f64> =
                    payouts.iter().map(|p| (p.node, p.amount)).collect();
                assert!((by_node[&NodeId(1)] - 0.4).abs() < 1e-12);
                assert!((by_node[&NodeId(3)] - 0.7).abs() < 1e-12);
                assert!(!by_node.contains_key(&NodeId(2)));
            }
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn test_late_finalize_is_noop() {
        let mut job = Job::new(JobId(0), 1.0);
        let a = reserve(&mut job, 1, 0.99);
        let b = reserve(&mut job, 2, 0.5);
        let late = reserve(&mut job, 3, 0.5);

        job.finalize(a, CANONICAL_HASH).unwrap();
        assert!(job.finalize(b, CANONICAL_HASH).unwrap().completed());
        let best = job.best_correctness();

        let outcome = job.finalize(late, CANONICAL_HASH).unwrap();
        assert_eq!(outcome, FinalizeOutcome::Late);
        assert_eq!(job.best_correctness(), best);
        assert_eq!(job.result_count(), 2);
        assert_eq!(job.late_submissions(), 1);
        assert_eq!(job.reservation_count(), 0);
    }
}
