//! Event logging for simulation replay and auditing.
//!
//! This module defines the Event enum which captures every state change of
//! the trust model during a run:
//! - **WorkStarted**: a node reserved a job
//! - **ResultSubmitted** / **LateSubmission**: a node finalized its work
//! - **TrustCredited** / **JobCompleted**: consensus payout
//! - **JobActivated**: the working set grew
//! - **NodeRetired**: a node passed its deadline while idle
//!
//! # Example
//!
//! ```rust
//! use trust_simulator_core_rs::models::{Event, EventLog, JobId, NodeId};
//!
//! let mut log = EventLog::new();
//! log.log(Event::WorkStarted {
//!     tick: 10,
//!     node: NodeId(3),
//!     job: JobId(42),
//!     correctness: 0.35,
//! });
//!
//! assert_eq!(log.len(), 1);
//! assert_eq!(log.events_for_node(NodeId(3)).len(), 1);
//! ```

use crate::models::ids::{JobId, NodeId};
use serde::Serialize;

/// Simulation event capturing a state change.
///
/// All events include a tick number for temporal ordering.
/// Events are logged in the order they occur within a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Node reserved a job with a provisional correctness weight
    WorkStarted {
        tick: u64,
        node: NodeId,
        job: JobId,
        correctness: f64,
    },

    /// Node's result was accepted into the job's consensus state
    ResultSubmitted {
        tick: u64,
        node: NodeId,
        job: JobId,
        hash: u64,
        correctness: f64,
    },

    /// Node finished after the job was already done
    LateSubmission { tick: u64, node: NodeId, job: JobId },

    /// Node received trust for corroborating the winning hash
    TrustCredited {
        tick: u64,
        node: NodeId,
        job: JobId,
        amount: f64,
    },

    /// Some hash reached the completion threshold
    JobCompleted {
        tick: u64,
        job: JobId,
        winning_hash: u64,
        best_correctness: f64,
        num_results: usize,
    },

    /// Inactive job moved into the working set
    JobActivated { tick: u64, job: JobId },

    /// Node stopped taking work after its deadline
    NodeRetired { tick: u64, node: NodeId },
}

impl Event {
    /// Get the tick when this event occurred
    pub fn tick(&self) -> u64 {
        match self {
            Event::WorkStarted { tick, .. } => *tick,
            Event::ResultSubmitted { tick, .. } => *tick,
            Event::LateSubmission { tick, .. } => *tick,
            Event::TrustCredited { tick, .. } => *tick,
            Event::JobCompleted { tick, .. } => *tick,
            Event::JobActivated { tick, .. } => *tick,
            Event::NodeRetired { tick, .. } => *tick,
        }
    }

    /// Node involved in the event, if any
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Event::WorkStarted { node, .. }
            | Event::ResultSubmitted { node, .. }
            | Event::LateSubmission { node, .. }
            | Event::TrustCredited { node, .. }
            | Event::NodeRetired { node, .. } => Some(*node),
            Event::JobCompleted { .. } | Event::JobActivated { .. } => None,
        }
    }

    /// Job involved in the event, if any
    pub fn job(&self) -> Option<JobId> {
        match self {
            Event::WorkStarted { job, .. }
            | Event::ResultSubmitted { job, .. }
            | Event::LateSubmission { job, .. }
            | Event::TrustCredited { job, .. }
            | Event::JobCompleted { job, .. }
            | Event::JobActivated { job, .. } => Some(*job),
            Event::NodeRetired { .. } => None,
        }
    }

    /// Short name of the variant (for filtering and display)
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::WorkStarted { .. } => "WorkStarted",
            Event::ResultSubmitted { .. } => "ResultSubmitted",
            Event::LateSubmission { .. } => "LateSubmission",
            Event::TrustCredited { .. } => "TrustCredited",
            Event::JobCompleted { .. } => "JobCompleted",
            Event::JobActivated { .. } => "JobActivated",
            Event::NodeRetired { .. } => "NodeRetired",
        }
    }
}

/// Event log for recording simulation events.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self::default()
    }

    /// Log an event
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get events at a specific tick
    pub fn events_at_tick(&self, tick: u64) -> Vec<&Event> {
        self.events.iter().filter(|e| e.tick() == tick).collect()
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events involving a node
    pub fn events_for_node(&self, node: NodeId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.node() == Some(node))
            .collect()
    }

    /// Get events involving a job
    pub fn events_for_job(&self, job: JobId) -> Vec<&Event> {
        self.events.iter().filter(|e| e.job() == Some(job)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> EventLog {
        let mut log = EventLog::new();
        log.log(Event::WorkStarted {
            tick: 1,
            node: NodeId(0),
            job: JobId(0),
            correctness: 0.1,
        });
        log.log(Event::ResultSubmitted {
            tick: 102,
            node: NodeId(0),
            job: JobId(0),
            hash: 0,
            correctness: 0.1,
        });
        log.log(Event::JobActivated {
            tick: 102,
            job: JobId(5),
        });
        log.log(Event::NodeRetired {
            tick: 300,
            node: NodeId(1),
        });
        log
    }

    #[test]
    fn test_filters() {
        let log = sample_log();

        assert_eq!(log.len(), 4);
        assert_eq!(log.events_at_tick(102).len(), 2);
        assert_eq!(log.events_of_type("NodeRetired").len(), 1);
        assert_eq!(log.events_for_node(NodeId(0)).len(), 2);
        assert_eq!(log.events_for_job(JobId(5)).len(), 1);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = Event::JobActivated {
            tick: 7,
            job: JobId(2),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "JobActivated");
        assert_eq!(json["tick"], 7);
        assert_eq!(json["job"], 2);
    }
}
