//! Ordering keys for the scheduler's two collections
//!
//! Keys are value snapshots taken at insertion time. A job or node must be
//! removed from its collection before any field feeding its key changes and
//! re-inserted afterwards.

use crate::models::{Job, JobId, Node, NodeId};
use std::cmp::Ordering;

/// Position of a job in the urgency order
///
/// Active jobs first, then higher `correctness()` first, then lower handle.
#[derive(Debug, Clone, Copy)]
pub struct JobOrderKey {
    pub active: bool,
    pub correctness: f64,
    pub job: JobId,
}

impl JobOrderKey {
    pub fn of(job: &Job) -> Self {
        Self {
            active: job.is_active(),
            correctness: job.correctness(),
            job: job.id(),
        }
    }

    /// Lower bound for active jobs whose correctness is at most `target`
    pub fn active_at_most(target: f64) -> Self {
        Self {
            active: true,
            correctness: target,
            job: JobId(0),
        }
    }

    /// Lower bound for the inactive section of the order
    pub fn first_inactive() -> Self {
        Self {
            active: false,
            correctness: f64::INFINITY,
            job: JobId(0),
        }
    }
}

impl Ord for JobOrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .active
            .cmp(&self.active)
            .then_with(|| other.correctness.total_cmp(&self.correctness))
            .then_with(|| self.job.cmp(&other.job))
    }
}

impl PartialOrd for JobOrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for JobOrderKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for JobOrderKey {}

/// Position of a node in the event queue: due time, then handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeOrderKey {
    pub next_action_time: u64,
    pub node: NodeId,
}

impl NodeOrderKey {
    pub fn of(node: &Node) -> Self {
        Self {
            next_action_time: node.next_action_time(),
            node: node.id(),
        }
    }
}
