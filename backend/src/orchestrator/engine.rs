//! Simulation engine
//!
//! # Architecture
//!
//! The simulation is event driven on a discrete clock. Each tick:
//!
//! 1. **Drain**: every node due at this tick leaves the node order
//! 2. **Finish**: busy nodes submit their result; completed jobs pay out
//!    trust and pull a new job into the working set
//! 3. **Retire**: idle nodes past their deadline leave the simulation
//! 4. **Assign**: remaining nodes ask the scheduler for work
//! 5. **Reinsert**: processed nodes go back into the node order
//! 6. **Telemetry**: tracked nodes report their trust
//! 7. **Terminate**: stalled or completed runs stop; otherwise the clock
//!    advances
//!
//! # Example
//!
//! ```rust
//! use trust_simulator_core_rs::orchestrator::{
//!     JobConfig, NodeConfig, RunOutcome, Simulation, SimulationConfig,
//! };
//!
//! let config = SimulationConfig::new(12345)
//!     .with_nodes(vec![NodeConfig::honest(0.5); 30])
//!     .with_jobs(vec![JobConfig::new(1.0).active()]);
//!
//! let mut sim = Simulation::new(config).unwrap();
//! match sim.run().unwrap() {
//!     RunOutcome::Completed(summary) => assert_eq!(summary.jobs_completed, 1),
//!     RunOutcome::Stalled(summary) => panic!("stalled at {}", summary.final_tick),
//! }
//! ```

use crate::core::time::TimeManager;
use crate::models::{
    ConsensusError, Event, EventLog, FinalizeOutcome, JobId, NodeId, SimulationState,
};
use crate::orchestrator::config::SimulationConfig;
use crate::rng::{RandomSource, RngManager};
use crate::scheduler::Project;
use crate::telemetry::{NullTelemetry, TelemetrySink};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Half-width of the noise added to a node's trust score to get the
/// correctness weight of a new reservation
pub const CORRECTNESS_NOISE: f64 = 0.1;

/// Upper bound of a single reservation's correctness weight
pub const MAX_RESERVATION_CORRECTNESS: f64 = 0.99;

// ============================================================================
// Errors
// ============================================================================

/// Simulation error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// Configuration validation error
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Internal consistency check failed
    #[error("Invariant violation: {0}")]
    InvariantViolation(ConsensusError),

    /// The trust mechanism accepted a fabricated result
    #[error("Protocol failure: {0}")]
    ProtocolFailure(ConsensusError),
}

impl From<ConsensusError> for SimulationError {
    fn from(err: ConsensusError) -> Self {
        if err.is_protocol_failure() {
            SimulationError::ProtocolFailure(err)
        } else {
            SimulationError::InvariantViolation(err)
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Running,
    /// Every job reached consensus
    Completed,
    /// No node received work for longer than the stall threshold
    Stalled,
    /// A tick returned an error; the state is kept for inspection
    Failed,
}

/// Result of a single tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickResult {
    /// Tick number
    pub tick: u64,

    /// Nodes drained from the event queue this tick
    pub nodes_processed: usize,

    /// New reservations this tick
    pub assignments: usize,

    /// Finalized submissions this tick (late ones included)
    pub results_submitted: usize,

    /// Jobs that reached consensus this tick
    pub jobs_completed: usize,

    /// Nodes that retired this tick
    pub nodes_retired: usize,

    /// Run status after this tick
    pub status: RunStatus,
}

impl TickResult {
    fn empty(tick: u64, nodes_processed: usize) -> Self {
        Self {
            tick,
            nodes_processed,
            assignments: 0,
            results_submitted: 0,
            jobs_completed: 0,
            nodes_retired: 0,
            status: RunStatus::Running,
        }
    }
}

/// Aggregate counters of a finished run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Last tick that was processed
    pub final_tick: u64,
    pub jobs_completed: usize,
    pub jobs_total: usize,

    /// Every finalize, late submissions included
    pub results_sent: usize,
    pub late_submissions: usize,

    /// `results_sent / jobs_completed`, if any job completed
    pub redundancy_ratio: Option<f64>,
    pub retired_nodes: usize,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunOutcome {
    Completed(RunSummary),
    Stalled(RunSummary),
}

impl RunOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::Completed(summary) | RunOutcome::Stalled(summary) => summary,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// Tick driver for the trust model
///
/// Generic over the telemetry sink and the random source; the defaults
/// discard telemetry and draw from a seeded [`RngManager`].
pub struct Simulation<S: TelemetrySink = NullTelemetry, R: RandomSource = RngManager> {
    state: SimulationState,
    project: Project,
    time: TimeManager,
    rng: R,
    event_log: EventLog,
    sink: S,

    tracked_nodes: Vec<NodeId>,
    stall_threshold: u64,

    /// Consecutive ticks without any assignment
    idle_ticks: u64,
    jobs_completed: usize,
    results_sent: usize,
    late_submissions: usize,
    retired_nodes: usize,
    status: RunStatus,

    /// Error that ended the run, replayed by later ticks
    failure: Option<SimulationError>,
}

impl Simulation<NullTelemetry> {
    /// Create a simulation that discards telemetry
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        Self::with_sink(config, NullTelemetry)
    }
}

impl<S: TelemetrySink> Simulation<S> {
    /// Create a simulation reporting trust trajectories to `sink`
    pub fn with_sink(config: SimulationConfig, sink: S) -> Result<Self, SimulationError> {
        let rng = RngManager::new(config.rng_seed);
        Simulation::with_rng(config, sink, rng)
    }
}

impl<S: TelemetrySink, R: RandomSource> Simulation<S, R> {
    /// Create a simulation drawing from `rng` instead of a seeded
    /// [`RngManager`]; `config.rng_seed` is only logged
    pub fn with_rng(config: SimulationConfig, sink: S, rng: R) -> Result<Self, SimulationError> {
        config.validate()?;

        let nodes = config
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| node.build(NodeId(index as u32)))
            .collect();
        let jobs = config
            .jobs
            .iter()
            .enumerate()
            .map(|(index, job)| job.build(JobId(index as u32)))
            .collect();
        let state = SimulationState::new(nodes, jobs);

        let mut project = Project::new();
        for job in state.jobs() {
            project.insert_job(job);
        }
        for node in state.nodes() {
            project.insert_node(node);
        }

        info!(
            seed = config.rng_seed,
            nodes = state.num_nodes(),
            jobs = state.num_jobs(),
            active_jobs = project.active_jobs(),
            "simulation initialised"
        );

        Ok(Self {
            state,
            project,
            time: TimeManager::new(),
            rng,
            event_log: EventLog::new(),
            sink,
            tracked_nodes: config.tracked_nodes.iter().map(|&id| NodeId(id)).collect(),
            stall_threshold: config.stall_threshold,
            idle_ticks: 0,
            jobs_completed: 0,
            results_sent: 0,
            late_submissions: 0,
            retired_nodes: 0,
            status: RunStatus::Running,
            failure: None,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn current_tick(&self) -> u64 {
        self.time.current_tick()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn jobs_completed(&self) -> usize {
        self.jobs_completed
    }

    pub fn results_sent(&self) -> usize {
        self.results_sent
    }

    pub fn idle_ticks(&self) -> u64 {
        self.idle_ticks
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Counters so far
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            final_tick: self.time.current_tick(),
            jobs_completed: self.jobs_completed,
            jobs_total: self.state.num_jobs(),
            results_sent: self.results_sent,
            late_submissions: self.late_submissions,
            redundancy_ratio: self.redundancy_ratio(),
            retired_nodes: self.retired_nodes,
        }
    }

    fn redundancy_ratio(&self) -> Option<f64> {
        (self.jobs_completed > 0).then(|| self.results_sent as f64 / self.jobs_completed as f64)
    }

    // ========================================================================
    // Main loop
    // ========================================================================

    /// Run ticks until the simulation completes or stalls
    ///
    /// # Errors
    /// - `ProtocolFailure` when a fabricated hash wins a job
    /// - `InvariantViolation` on internal inconsistency
    pub fn run(&mut self) -> Result<RunOutcome, SimulationError> {
        loop {
            match self.tick()?.status {
                RunStatus::Completed => return Ok(RunOutcome::Completed(self.summary())),
                RunStatus::Stalled => return Ok(RunOutcome::Stalled(self.summary())),
                RunStatus::Running | RunStatus::Failed => {}
            }
        }
    }

    /// Execute one tick
    ///
    /// Once the run has completed or stalled this is a no-op reporting the
    /// final status; after a failure it returns the same error again. The
    /// clock only advances while the run continues, so after the run ends
    /// `current_tick()` is the last processed tick.
    pub fn tick(&mut self) -> Result<TickResult, SimulationError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let tick = self.time.current_tick();
        if self.status != RunStatus::Running {
            let mut result = TickResult::empty(tick, 0);
            result.status = self.status;
            return Ok(result);
        }

        let due = self.project.drain_due_nodes(tick);
        let mut result = TickResult::empty(tick, due.len());

        let mut reinsert = Vec::with_capacity(due.len());
        for node_id in due {
            match self.process_node(node_id, tick, &mut result) {
                Ok(true) => reinsert.push(node_id),
                Ok(false) => {}
                Err(err) => return Err(self.fail(err)),
            }
        }

        for node_id in reinsert {
            self.project.insert_node(self.state.node(node_id));
        }

        if let Err(err) = self.emit_telemetry(tick) {
            return Err(self.fail(err));
        }

        if result.nodes_processed > 0 {
            info!(tick, jobs_completed = self.jobs_completed, "progress");
        }

        if result.assignments > 0 {
            self.idle_ticks = 0;
        } else {
            self.idle_ticks += 1;
        }

        if self.idle_ticks > self.stall_threshold {
            self.status = RunStatus::Stalled;
            warn!(
                tick,
                idle_ticks = self.idle_ticks,
                jobs_completed = self.jobs_completed,
                jobs_total = self.state.num_jobs(),
                "no jobs assigned, stopping"
            );
        } else if self.state.num_jobs() > 0 && self.jobs_completed >= self.state.num_jobs() {
            self.status = RunStatus::Completed;
            info!(
                tick,
                jobs_completed = self.jobs_completed,
                results_sent = self.results_sent,
                redundancy_ratio = ?self.redundancy_ratio(),
                "all jobs completed"
            );
        } else {
            self.time.advance_tick();
        }

        result.status = self.status;
        Ok(result)
    }

    fn fail(&mut self, err: SimulationError) -> SimulationError {
        self.status = RunStatus::Failed;
        self.failure = Some(err.clone());
        err
    }

    /// Handle one due node; returns whether it stays scheduled
    fn process_node(
        &mut self,
        node_id: NodeId,
        tick: u64,
        result: &mut TickResult,
    ) -> Result<bool, SimulationError> {
        if !self.state.node(node_id).is_idle() {
            self.finish_node_work(node_id, tick, result)?;
        }

        if self.state.node(node_id).deadline_passed(tick) {
            self.retired_nodes += 1;
            result.nodes_retired += 1;
            self.event_log.log(Event::NodeRetired {
                tick,
                node: node_id,
            });
            debug!(tick, node = %node_id, "node retired");
            return Ok(false);
        }

        self.assign_work(node_id, tick, result)?;
        Ok(true)
    }

    fn finish_node_work(
        &mut self,
        node_id: NodeId,
        tick: u64,
        result: &mut TickResult,
    ) -> Result<(), SimulationError> {
        let job_id = self
            .state
            .node(node_id)
            .current_reservation()
            .map(|reservation| reservation.job)
            .ok_or(ConsensusError::NoReservation { node: node_id })?;

        // The finalize changes the job's correctness, so it leaves the order
        // for the duration
        self.project.remove_job(job_id);
        let finished = self.state.finish_work(node_id, &mut self.rng);
        self.project.insert_job(self.state.job(job_id));

        for contributor in self.state.job(job_id).contributors() {
            self.project.record_trust(self.state.node(contributor));
        }

        let report = match finished {
            Ok(report) => report,
            Err(err) => {
                if let ConsensusError::WrongConsensus {
                    job,
                    hash,
                    correctness,
                } = &err
                {
                    error!(tick, job = %job, hash, correctness, "job completed with a fabricated hash");
                }
                return Err(err.into());
            }
        };

        self.results_sent += 1;
        result.results_submitted += 1;

        match report.outcome {
            FinalizeOutcome::Late => {
                self.late_submissions += 1;
                self.event_log.log(Event::LateSubmission {
                    tick,
                    node: node_id,
                    job: job_id,
                });
            }
            FinalizeOutcome::Accepted(submitted) => {
                self.event_log.log(Event::ResultSubmitted {
                    tick,
                    node: node_id,
                    job: job_id,
                    hash: submitted.hash,
                    correctness: submitted.correctness,
                });
            }
            FinalizeOutcome::Completed {
                result: submitted,
                winning_hash,
                payouts,
            } => {
                self.event_log.log(Event::ResultSubmitted {
                    tick,
                    node: node_id,
                    job: job_id,
                    hash: submitted.hash,
                    correctness: submitted.correctness,
                });
                for payout in &payouts {
                    self.event_log.log(Event::TrustCredited {
                        tick,
                        node: payout.node,
                        job: job_id,
                        amount: payout.amount,
                    });
                }

                let job = self.state.job(job_id);
                self.event_log.log(Event::JobCompleted {
                    tick,
                    job: job_id,
                    winning_hash,
                    best_correctness: job.best_correctness(),
                    num_results: job.result_count(),
                });
                self.jobs_completed += 1;
                result.jobs_completed += 1;

                if let Some(activated) = self.project.activate_job(self.state.jobs_mut()) {
                    self.event_log.log(Event::JobActivated {
                        tick,
                        job: activated,
                    });
                }
            }
        }

        Ok(())
    }

    fn assign_work(
        &mut self,
        node_id: NodeId,
        tick: u64,
        result: &mut TickResult,
    ) -> Result<(), SimulationError> {
        let found =
            self.project
                .find_job_for_node(self.state.node(node_id), self.state.jobs(), &mut self.rng)?;

        let Some(job_id) = found else {
            self.state.node_mut(node_id).set_next_action_time(tick);
            return Ok(());
        };

        let score = self.project.trust_score(self.state.node(node_id))?;
        let correctness = (score + self.rng.uniform(-CORRECTNESS_NOISE, CORRECTNESS_NOISE))
            .clamp(0.0, MAX_RESERVATION_CORRECTNESS);

        let started = self.state.start_work(node_id, job_id, correctness, tick);
        // The job was taken out of the order by the scheduler
        self.project.insert_job(self.state.job(job_id));
        started?;

        self.event_log.log(Event::WorkStarted {
            tick,
            node: node_id,
            job: job_id,
            correctness,
        });
        result.assignments += 1;

        if self.tracked_nodes.contains(&node_id) {
            self.sink.on_assignment(node_id, tick, score);
        }
        Ok(())
    }

    fn emit_telemetry(&mut self, tick: u64) -> Result<(), SimulationError> {
        for &node_id in &self.tracked_nodes {
            let node = self.state.node(node_id);
            let score = self.project.trust_score(node)?;
            self.sink.on_trust_sample(node_id, tick, score, node.trust());
        }

        if let Some(ratio) = self.redundancy_ratio() {
            self.sink.on_redundancy_sample(tick, ratio);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{JobConfig, NodeConfig};
    use crate::telemetry::TrustRecorder;
    use tracing_test::traced_test;

    fn single_job(nodes: Vec<NodeConfig>) -> SimulationConfig {
        SimulationConfig::new(7)
            .with_nodes(nodes)
            .with_jobs(vec![JobConfig::new(1.0).active()])
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Simulation::new(SimulationConfig::new(1)).err().unwrap();
        assert!(matches!(err, SimulationError::InvalidConfig(_)));
    }

    #[test]
    fn test_error_routing() {
        let wrong = ConsensusError::WrongConsensus {
            job: JobId(0),
            hash: 3,
            correctness: 1.2,
        };
        assert!(matches!(
            SimulationError::from(wrong),
            SimulationError::ProtocolFailure(_)
        ));

        let busy = ConsensusError::NoReservation { node: NodeId(0) };
        assert!(matches!(
            SimulationError::from(busy),
            SimulationError::InvariantViolation(_)
        ));
    }

    #[test]
    fn test_first_tick_assigns_every_node() {
        let mut sim = Simulation::new(single_job(vec![NodeConfig::honest(0.0); 3])).unwrap();

        let result = sim.tick().unwrap();
        assert_eq!(result.tick, 0);
        assert_eq!(result.nodes_processed, 3);
        assert_eq!(result.assignments, 3);
        assert_eq!(sim.state().job(JobId(0)).reservation_count(), 3);
        assert_eq!(sim.current_tick(), 1);
        assert_eq!(sim.project().scheduled_nodes(), 3);
    }

    #[test]
    fn test_tick_after_finish_is_noop() {
        let config = single_job(vec![NodeConfig::honest(1.0); 30]);
        let mut sim = Simulation::new(config).unwrap();
        let outcome = sim.run().unwrap();
        assert!(outcome.is_completed());

        let final_tick = sim.current_tick();
        let result = sim.tick().unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.nodes_processed, 0);
        assert_eq!(sim.current_tick(), final_tick);
    }

    #[test]
    fn test_tracked_nodes_sampled_every_tick() {
        let config = single_job(vec![NodeConfig::honest(0.5); 3]).with_tracked_nodes(vec![0]);
        let mut sim = Simulation::with_sink(config, TrustRecorder::new()).unwrap();
        for _ in 0..5 {
            sim.tick().unwrap();
        }

        let recorder = sim.into_sink();
        let series = recorder.series(NodeId(0)).unwrap();
        assert_eq!(series.trust_score.len(), 5);
        assert_eq!(series.assignments.len(), 1);
        assert!(recorder.series(NodeId(1)).is_none());
    }

    #[test]
    #[traced_test]
    fn test_progress_logged_at_info() {
        let config = SimulationConfig::new(4)
            .with_nodes(vec![NodeConfig::honest(1.0); 30])
            .with_jobs(vec![JobConfig::new(1.0).active()]);
        let mut sim = Simulation::new(config).unwrap();
        sim.tick().unwrap();

        logs_assert(|lines: &[&str]| {
            let found = lines.iter().any(|line| {
                line.contains("INFO") && line.contains("progress") && line.contains("tick=0")
            });
            if found {
                Ok(())
            } else {
                Err("no progress line at info level".to_string())
            }
        });
    }
}
