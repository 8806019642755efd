//! Time management for the simulation
//!
//! The simulation operates in discrete logical ticks. Nodes are due when
//! their `next_action_time` is at or before the current tick.

use serde::{Deserialize, Serialize};

/// Logical tick counter driving the discrete-event loop
///
/// # Example
/// ```
/// use trust_simulator_core_rs::TimeManager;
///
/// let mut time = TimeManager::new();
/// assert_eq!(time.current_tick(), 0);
///
/// time.advance_tick();
/// assert_eq!(time.current_tick(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeManager {
    /// Total ticks elapsed since simulation start
    current_tick: u64,
}

impl TimeManager {
    /// Create a clock positioned at tick 0
    pub fn new() -> Self {
        Self { current_tick: 0 }
    }

    /// Advance time by one tick
    pub fn advance_tick(&mut self) {
        self.current_tick += 1;
    }

    /// Get the current tick (total ticks since start)
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_starts_at_zero() {
        let mut time = TimeManager::default();
        assert_eq!(time.current_tick(), 0);

        for _ in 0..5 {
            time.advance_tick();
        }
        assert_eq!(time.current_tick(), 5);
    }
}
