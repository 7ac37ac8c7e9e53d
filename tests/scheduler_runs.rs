// tests/scheduler_runs.rs

mod common;

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use dagline::dag::{NodeState, Scheduler};
use dagline::engine::{PipelineOutcome, TaskOutcome};
use dagline::types::TriggerRule;

use crate::common::builders::{PipelineBuilder, TaskConfigBuilder};
use crate::common::{drive, drive_scripted, init_tracing, medallion_pipeline, names};

#[test]
fn failing_test_stage_routes_to_failure_branch_and_reaches_end() {
    init_tracing();
    let mut scheduler = Scheduler::from_config(&medallion_pipeline()).unwrap();

    let executed = drive(&mut scheduler, &["test"]);

    assert_eq!(scheduler.state_of("test"), Some(NodeState::Failed));
    assert_eq!(scheduler.state_of("docs"), Some(NodeState::UpstreamFailed));
    assert_eq!(scheduler.state_of("output"), Some(NodeState::UpstreamFailed));
    assert_eq!(scheduler.state_of("notify_failure"), Some(NodeState::Succeeded));
    assert_eq!(scheduler.state_of("notify_success"), Some(NodeState::Skipped));
    assert_eq!(scheduler.state_of("end"), Some(NodeState::Succeeded));

    let ran = names(&executed);
    assert_eq!(
        ran,
        vec!["start", "validate", "run", "test", "notify_failure", "end"]
    );

    let report = scheduler.report("scv_dbt_pipeline");
    assert_eq!(report.outcome, PipelineOutcome::Failure);
    assert_eq!(report.nodes.len(), 9);
    assert_eq!(report.failed_nodes().len(), 1);
}

#[test]
fn clean_run_skips_failure_branch_and_succeeds() {
    let mut scheduler = Scheduler::from_config(&medallion_pipeline()).unwrap();

    let executed = drive(&mut scheduler, &[]);

    assert_eq!(scheduler.state_of("notify_success"), Some(NodeState::Succeeded));
    assert_eq!(scheduler.state_of("notify_failure"), Some(NodeState::Skipped));
    assert_eq!(scheduler.state_of("end"), Some(NodeState::Succeeded));
    assert!(!names(&executed).contains(&"notify_failure"));

    let report = scheduler.report("scv_dbt_pipeline");
    assert!(report.is_success());
    assert_eq!(report.count(NodeState::Succeeded), 8);
    assert_eq!(report.count(NodeState::Skipped), 1);
}

#[test]
fn all_success_node_with_one_failed_predecessor_never_succeeds() {
    let cfg = PipelineBuilder::new()
        .with_task("a", TaskConfigBuilder::new().build())
        .with_task("b", TaskConfigBuilder::new().build())
        .with_task("join", TaskConfigBuilder::new().after("a").after("b").build())
        .build();
    let mut scheduler = Scheduler::from_config(&cfg).unwrap();

    let executed = drive(&mut scheduler, &["b"]);

    assert_eq!(scheduler.state_of("a"), Some(NodeState::Succeeded));
    assert_eq!(scheduler.state_of("join"), Some(NodeState::UpstreamFailed));
    assert!(!names(&executed).contains(&"join"));
}

#[test]
fn upstream_failure_marks_only_the_direct_successor() {
    let cfg = PipelineBuilder::new()
        .with_task("a", TaskConfigBuilder::new().build())
        .with_task("b", TaskConfigBuilder::new().after("a").build())
        .with_task("c", TaskConfigBuilder::new().after("b").build())
        .with_task(
            "join",
            TaskConfigBuilder::new().after("c").rule(TriggerRule::NoneFailed).build(),
        )
        .build();
    let mut scheduler = Scheduler::from_config(&cfg).unwrap();

    let executed = drive(&mut scheduler, &["a"]);

    assert_eq!(scheduler.state_of("b"), Some(NodeState::UpstreamFailed));
    assert_eq!(scheduler.state_of("c"), Some(NodeState::Skipped));
    assert_eq!(scheduler.state_of("join"), Some(NodeState::Succeeded));
    assert_eq!(names(&executed), vec!["a", "join"]);
}

#[test]
fn retries_rerun_until_success_within_budget() {
    let cfg = PipelineBuilder::new()
        .with_task("flaky", TaskConfigBuilder::new().retries(2).build())
        .with_task("after", TaskConfigBuilder::new().after("flaky").build())
        .build();
    let mut scheduler = Scheduler::from_config(&cfg).unwrap();

    let script = HashMap::from([(
        "flaky",
        VecDeque::from(vec![TaskOutcome::failed("transient"), TaskOutcome::failed("again")]),
    )]);
    let executed = drive_scripted(&mut scheduler, script);

    assert_eq!(
        executed,
        vec![
            ("flaky".to_string(), 1),
            ("flaky".to_string(), 2),
            ("flaky".to_string(), 3),
            ("after".to_string(), 1),
        ]
    );
    assert_eq!(scheduler.state_of("flaky"), Some(NodeState::Succeeded));
    assert_eq!(scheduler.attempts_of("flaky"), Some(3));

    let report = scheduler.report("p");
    assert!(report.is_success());
    assert_eq!(report.nodes["flaky"].attempts, 3);
    assert_eq!(report.nodes["flaky"].error, None);
    assert!(!report.summary().contains("again"));
}

#[test]
fn exhausted_retry_budget_finalizes_failed() {
    let cfg = PipelineBuilder::new()
        .default_retries(1)
        .with_task("broken", TaskConfigBuilder::new().build())
        .build();
    let mut scheduler = Scheduler::from_config(&cfg).unwrap();

    let executed = drive(&mut scheduler, &["broken"]);

    assert_eq!(executed.len(), 2);
    assert_eq!(scheduler.state_of("broken"), Some(NodeState::Failed));
    assert_eq!(scheduler.attempts_of("broken"), Some(2));
}

#[test]
fn timeouts_count_as_failures() {
    let cfg = PipelineBuilder::new()
        .with_task("slow", TaskConfigBuilder::new().build())
        .with_task(
            "on_fail",
            TaskConfigBuilder::new().after("slow").rule(TriggerRule::OneFailed).build(),
        )
        .build();
    let mut scheduler = Scheduler::from_config(&cfg).unwrap();

    let script = HashMap::from([(
        "slow",
        VecDeque::from(vec![TaskOutcome::TimedOut(Duration::from_secs(1))]),
    )]);
    drive_scripted(&mut scheduler, script);

    assert_eq!(scheduler.state_of("slow"), Some(NodeState::Failed));
    assert_eq!(scheduler.state_of("on_fail"), Some(NodeState::Succeeded));
}

#[test]
fn cancel_skips_pending_and_lets_running_nodes_finish() {
    let cfg = PipelineBuilder::new()
        .with_task("a", TaskConfigBuilder::new().build())
        .with_task("b", TaskConfigBuilder::new().after("a").build())
        .with_task("c", TaskConfigBuilder::new().after("b").build())
        .build();
    let mut scheduler = Scheduler::from_config(&cfg).unwrap();

    let first = scheduler.start();
    assert_eq!(first.newly_scheduled.len(), 1);

    let cancel = scheduler.cancel();
    assert!(scheduler.is_cancelled());
    assert_eq!(cancel.newly_skipped.len(), 2);
    assert!(!cancel.run_just_finished);
    assert_eq!(scheduler.state_of("a"), Some(NodeState::Running));

    let done = scheduler.step_completion("a", TaskOutcome::Success, Duration::from_millis(5));
    assert!(done.newly_scheduled.is_empty());
    assert!(done.run_just_finished);
    assert_eq!(scheduler.state_of("a"), Some(NodeState::Succeeded));
    assert_eq!(scheduler.state_of("b"), Some(NodeState::Skipped));
    assert_eq!(scheduler.state_of("c"), Some(NodeState::Skipped));
}

#[test]
fn no_retries_after_cancellation() {
    let cfg = PipelineBuilder::new()
        .with_task("a", TaskConfigBuilder::new().retries(3).build())
        .build();
    let mut scheduler = Scheduler::from_config(&cfg).unwrap();

    scheduler.start();
    scheduler.cancel();
    let step = scheduler.step_completion("a", TaskOutcome::failed("x"), Duration::ZERO);

    assert!(step.newly_scheduled.is_empty());
    assert_eq!(scheduler.state_of("a"), Some(NodeState::Failed));
    assert!(scheduler.is_finished());
}

#[test]
fn undispatched_tasks_are_finalized_on_abort() {
    let cfg = PipelineBuilder::new()
        .with_task("first", TaskConfigBuilder::new().build())
        .with_task("retry", TaskConfigBuilder::new().retries(1).build())
        .build();
    let mut scheduler = Scheduler::from_config(&cfg).unwrap();

    let start = scheduler.start();
    let first = start.newly_scheduled[0].clone();
    assert_eq!(first.node.as_str(), "first");

    // "retry" fails once and gets a second attempt scheduled.
    let step = scheduler.step_completion("retry", TaskOutcome::failed("x"), Duration::ZERO);
    let second_attempt = step.newly_scheduled[0].clone();
    assert_eq!(second_attempt.attempt, 2);

    scheduler.cancel();
    scheduler.abort_unstarted(&first);
    scheduler.abort_unstarted(&second_attempt);

    assert_eq!(scheduler.state_of("first"), Some(NodeState::Skipped));
    assert_eq!(scheduler.attempts_of("first"), Some(0));
    assert_eq!(scheduler.state_of("retry"), Some(NodeState::Failed));
    assert_eq!(scheduler.attempts_of("retry"), Some(1));
    assert!(scheduler.is_finished());
}

#[test]
fn stray_and_duplicate_completions_are_ignored() {
    let cfg = PipelineBuilder::new()
        .with_task("a", TaskConfigBuilder::new().build())
        .with_task("b", TaskConfigBuilder::new().after("a").build())
        .build();
    let mut scheduler = Scheduler::from_config(&cfg).unwrap();
    scheduler.start();

    // b has not started yet.
    let stray = scheduler.step_completion("b", TaskOutcome::Success, Duration::ZERO);
    assert!(stray.newly_scheduled.is_empty());
    assert_eq!(scheduler.state_of("b"), Some(NodeState::Pending));

    let done = scheduler.step_completion("a", TaskOutcome::Success, Duration::ZERO);
    assert_eq!(done.newly_scheduled.len(), 1);

    // A second completion for a must not finalize it again.
    let dup = scheduler.step_completion("a", TaskOutcome::failed("late"), Duration::ZERO);
    assert!(dup.newly_failed.is_empty());
    assert_eq!(scheduler.state_of("a"), Some(NodeState::Succeeded));

    let unknown = scheduler.step_completion("nope", TaskOutcome::Success, Duration::ZERO);
    assert!(unknown.newly_scheduled.is_empty());
}

#[test]
fn readiness_requires_all_predecessors_terminal() {
    let cfg = PipelineBuilder::new()
        .with_task("a", TaskConfigBuilder::new().build())
        .with_task("b", TaskConfigBuilder::new().build())
        .with_task("c", TaskConfigBuilder::new().after("a").after("b").build())
        .build();
    let mut scheduler = Scheduler::from_config(&cfg).unwrap();
    scheduler.start();

    scheduler.step_completion("a", TaskOutcome::Success, Duration::ZERO);
    assert_eq!(scheduler.state_of("c"), Some(NodeState::Pending));
    assert!(!scheduler.is_ready(&"c".into()));

    let step = scheduler.step_completion("b", TaskOutcome::Success, Duration::ZERO);
    let scheduled: Vec<&str> = step.newly_scheduled.iter().map(|t| t.node.as_str()).collect();
    assert_eq!(scheduled, vec!["c"]);
}

#[test]
fn durations_accumulate_over_attempts() {
    let cfg = PipelineBuilder::new()
        .with_task("a", TaskConfigBuilder::new().retries(1).build())
        .build();
    let mut scheduler = Scheduler::from_config(&cfg).unwrap();
    scheduler.start();

    scheduler.step_completion("a", TaskOutcome::failed("x"), Duration::from_millis(30));
    scheduler.step_completion("a", TaskOutcome::Success, Duration::from_millis(12));

    let report = scheduler.report("p");
    assert_eq!(report.nodes["a"].duration_ms, 42);
    assert_eq!(report.nodes["a"].attempts, 2);
}
