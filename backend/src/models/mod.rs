//! Domain models for the trust simulator

pub mod event;
pub mod ids;
pub mod job;
pub mod node;
pub mod state;

// Re-exports
pub use event::{Event, EventLog};
pub use ids::{JobId, NodeId};
pub use job::{
    ConsensusError, FinalizeOutcome, Job, Reservation, TrustPayout, WorkResult,
    ASSUMED_CORRECTNESS_EPSILON, CANONICAL_HASH, COMPLETION_THRESHOLD,
};
pub use node::{Node, DELAY_SCALE};
pub use state::{FinishReport, SimulationState};
