//! Tests for the Project scheduler
//!
//! Job selection, ordering maintenance, activation and trust scores.

use trust_simulator_core_rs::models::{Job, JobId, Node, NodeId};
use trust_simulator_core_rs::scheduler::{TARGET_RANGE, TRUST_FLOOR};
use trust_simulator_core_rs::{ConsensusError, Project, RandomSource, RngManager};

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

fn active_job(id: u32, correctness: f64) -> Job {
    let mut job = Job::new(JobId(id), 1.0).with_active(true);
    if correctness > 0.0 {
        job.reserve(NodeId(10_000 + id), correctness).unwrap();
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
fn test_target_range_constants() {
    assert_eq!(TRUST_FLOOR, 0.1);
    assert_eq!(TARGET_RANGE, (1.0, 1.3));
}

#[test]
fn test_trusted_node_prefers_less_corroborated_jobs() {
    // A node at the best trust scores 1.0; Fixed(0.5) => target 1.15 - 1.0 = 0.15
    let jobs = vec![
        active_job(0, 0.8),
        active_job(1, 0.4),
        active_job(2, 0.1),
        active_job(3, 0.0),
    ];
    let mut project = project_with(&jobs);

    let mut node = Node::new(NodeId(0), 0.0, 0.0);
    node.credit_trust(3.0);
    project.record_trust(&node);
    assert_eq!(project.trust_score(&node).unwrap(), 1.0);

    let found = project
        .find_job_for_node(&node, &jobs, &mut Fixed(0.5))
        .unwrap();
    assert_eq!(found, Some(JobId(2)));
}

#[test]
fn test_ties_at_target_are_included() {
    // Fixed(0.0) with no trust => target exactly 0.9
    let jobs = vec![active_job(0, 0.95), active_job(1, 0.9), active_job(2, 0.9)];
    let mut project = project_with(&jobs);
    let node = Node::new(NodeId(0), 0.0, 0.0);

    let found = project
        .find_job_for_node(&node, &jobs, &mut Fixed(0.0))
        .unwrap();
    // Equal correctness falls back to the lower handle
    assert_eq!(found, Some(JobId(1)));
}

#[test]
fn test_submitted_jobs_are_skipped() {
    let mut jobs = vec![active_job(0, 0.0), active_job(1, 0.0)];
    let mut node = Node::new(NodeId(0), 0.0, 0.0);
    let mut rng = RngManager::new(1);

    // The node already submitted to job 0
    node.start_work(&mut jobs[0], 0.2, 0).unwrap();
    node.finish_work(&mut jobs[0], &mut rng).unwrap();

    let mut project = project_with(&jobs);
    let found = project
        .find_job_for_node(&node, &jobs, &mut Fixed(0.0))
        .unwrap();
    assert_eq!(found, Some(JobId(1)));
}

#[test]
fn test_saturated_jobs_yield_nothing() {
    let jobs = vec![active_job(0, 1.0), active_job(1, 1.2)];
    let mut project = project_with(&jobs);
    let node = Node::new(NodeId(0), 0.0, 0.0);

    let found = project
        .find_job_for_node(&node, &jobs, &mut Fixed(0.9))
        .unwrap();
    assert_eq!(found, None);
    assert_eq!(project.queued_jobs(), 2);
}

#[test]
fn test_selected_job_must_be_reinserted() {
    let mut jobs = vec![active_job(0, 0.0)];
    let mut project = project_with(&jobs);
    let mut node = Node::new(NodeId(0), 0.0, 0.0);

    let job = project
        .find_job_for_node(&node, &jobs, &mut Fixed(0.0))
        .unwrap()
        .unwrap();
    assert!(!project.contains_job(job));

    node.start_work(&mut jobs[job.index()], 0.3, 0).unwrap();
    project.insert_job(&jobs[job.index()]);
    assert!(project.contains_job(job));
    assert_eq!(project.queued_jobs(), 1);
}

#[test]
fn test_activate_job_grows_active_set_by_one() {
    let mut jobs: Vec<Job> = (0..5)
        .map(|i| Job::new(JobId(i), 1.0).with_active(i == 0))
        .collect();
    let mut project = project_with(&jobs);

    for expected in 1..5 {
        let before = project.active_jobs();
        let activated = project.activate_job(&mut jobs).unwrap();
        assert_eq!(activated, JobId(expected));
        assert_eq!(project.active_jobs(), before + 1);
    }
    assert_eq!(project.activate_job(&mut jobs), None);
}

#[test]
fn test_node_queue_two_phase_drain() {
    let mut nodes: Vec<Node> = (0..5).map(|i| Node::new(NodeId(i), 0.0, 0.0)).collect();
    for (node, due) in nodes.iter_mut().zip([3, 0, 3, 1, 8]) {
        node.set_next_action_time(due);
    }

    let mut project = Project::new();
    for node in &nodes {
        project.insert_node(node);
    }

    let due = project.drain_due_nodes(3);
    assert_eq!(due, vec![NodeId(1), NodeId(3), NodeId(0), NodeId(2)]);

    // Reschedule while drained, then reinsert
    for id in &due {
        nodes[id.index()].set_next_action_time(10);
        project.insert_node(&nodes[id.index()]);
    }
    assert_eq!(project.scheduled_nodes(), 5);
    assert_eq!(project.drain_due_nodes(9), vec![NodeId(4)]);
}

#[test]
fn test_trust_score_bounds() {
    let mut project = Project::new();
    let mut nodes: Vec<Node> = (0..4).map(|i| Node::new(NodeId(i), 0.0, 0.0)).collect();
    for (node, trust) in nodes.iter_mut().zip([0.0, 0.5, 2.0, 4.0]) {
        node.credit_trust(trust);
        project.record_trust(node);
    }

    let scores: Vec<f64> = nodes
        .iter()
        .map(|node| project.trust_score(node).unwrap())
        .collect();
    assert_eq!(scores[0], TRUST_FLOOR);
    assert!((scores[1] - 0.225).abs() < 1e-12);
    assert!((scores[2] - 0.6).abs() < 1e-12);
    assert_eq!(scores[3], 1.0);
    assert!(scores.iter().all(|s| (TRUST_FLOOR..=1.0).contains(s)));
}

#[test]
fn test_stale_best_trust_is_reported() {
    let mut project = Project::new();
    let mut node = Node::new(NodeId(2), 0.0, 0.0);
    node.credit_trust(1.0);
    project.record_trust(&node);
    node.credit_trust(0.5);

    assert!(matches!(
        project.trust_score(&node),
        Err(ConsensusError::TrustAboveMaximum { .. })
    ));
}
