//! Stable entity handles
//!
//! Jobs and nodes live in arenas owned by `SimulationState`. A handle is the
//! entity's creation sequence number, which doubles as the tie-break key in
//! the scheduler's ordered collections, so ordering never depends on memory
//! layout.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a job in the job arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u32);

/// Handle of a node in the node arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl JobId {
    /// Position in the job arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl NodeId {
    /// Position in the node arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job_{:06}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{:04}", self.0)
    }
}
