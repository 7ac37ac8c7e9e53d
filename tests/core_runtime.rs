// tests/core_runtime.rs

mod common;

use std::time::Duration;

use dagline::dag::{NodeState, ScheduledTask, Scheduler};
use dagline::engine::{CancelReason, CoreCommand, CoreRuntime, CoreStep, RuntimeEvent, TaskOutcome};

use crate::common::builders::{PipelineBuilder, TaskConfigBuilder};
use crate::common::init_tracing;

fn fan_out(width: usize) -> Scheduler {
    let mut builder = PipelineBuilder::new().with_task("root", TaskConfigBuilder::new().build());
    for i in 0..width {
        builder = builder.with_task(
            &format!("leaf_{i}"),
            TaskConfigBuilder::new().after("root").build(),
        );
    }
    Scheduler::from_config(&builder.build()).unwrap()
}

fn dispatched(step: &CoreStep) -> Vec<ScheduledTask> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::DispatchTasks(tasks) => Some(tasks.clone()),
            CoreCommand::RunFinished => None,
        })
        .flatten()
        .collect()
}

fn finished(step: &CoreStep) -> bool {
    step.commands.contains(&CoreCommand::RunFinished)
}

fn complete(node: &ScheduledTask, outcome: TaskOutcome) -> RuntimeEvent {
    RuntimeEvent::TaskCompleted {
        node: node.node.clone(),
        attempt: node.attempt,
        outcome,
        elapsed: Duration::from_millis(1),
    }
}

#[test]
fn dispatch_never_exceeds_max_parallel() {
    init_tracing();
    let mut core = CoreRuntime::new(fan_out(5), "p", 2);

    let start = core.start();
    let root = dispatched(&start);
    assert_eq!(root.len(), 1);

    let step = core.step(complete(&root[0], TaskOutcome::Success));
    let mut in_flight = dispatched(&step);
    assert_eq!(in_flight.len(), 2);
    assert_eq!(core.in_flight(), 2);

    let mut ran = 1;
    while let Some(task) = in_flight.pop() {
        ran += 1;
        let step = core.step(complete(&task, TaskOutcome::Success));
        in_flight.extend(dispatched(&step));
        assert!(core.in_flight() <= 2);
        if in_flight.is_empty() {
            assert!(finished(&step));
            assert!(!step.keep_running);
        }
    }

    assert_eq!(ran, 6);
    assert!(core.is_finished());
    assert!(core.report().is_success());
}

#[test]
fn freed_slots_are_filled_in_backlog_order() {
    let mut core = CoreRuntime::new(fan_out(3), "p", 1);
    let root = dispatched(&core.start());

    let first = dispatched(&core.step(complete(&root[0], TaskOutcome::Success)));
    assert_eq!(first[0].node.as_str(), "leaf_0");
    let second = dispatched(&core.step(complete(&first[0], TaskOutcome::Success)));
    assert_eq!(second[0].node.as_str(), "leaf_1");
    let third = dispatched(&core.step(complete(&second[0], TaskOutcome::Success)));
    assert_eq!(third[0].node.as_str(), "leaf_2");
}

#[test]
fn cancel_drains_in_flight_and_skips_backlog() {
    let mut core = CoreRuntime::new(fan_out(3), "p", 1);
    let root = dispatched(&core.start());
    let running = dispatched(&core.step(complete(&root[0], TaskOutcome::Success)));
    assert_eq!(running.len(), 1);

    let cancel = core.step(RuntimeEvent::CancelRequested);
    assert!(dispatched(&cancel).is_empty());
    assert!(cancel.keep_running, "in-flight body must be drained");
    assert!(core.is_cancelled());

    let last = core.step(complete(&running[0], TaskOutcome::Success));
    assert!(finished(&last));
    assert!(!last.keep_running);

    let report = core.report();
    assert_eq!(report.cancelled, Some(CancelReason::Requested));
    assert_eq!(report.state_of("leaf_0"), Some(NodeState::Succeeded));
    assert_eq!(report.state_of("leaf_1"), Some(NodeState::Skipped));
    assert_eq!(report.state_of("leaf_2"), Some(NodeState::Skipped));
    // Skipped-by-cancellation nodes never ran.
    assert_eq!(report.nodes["leaf_1"].attempts, 0);
    assert!(report.is_success());
}

#[test]
fn deadline_uses_the_cancellation_path() {
    let mut core = CoreRuntime::new(fan_out(1), "p", 4);
    let root = dispatched(&core.start());

    let step = core.step(RuntimeEvent::DeadlineExpired);
    assert!(step.keep_running);

    let last = core.step(complete(&root[0], TaskOutcome::Success));
    assert!(!last.keep_running);

    let report = core.report();
    assert_eq!(report.cancelled, Some(CancelReason::Timeout));
    assert_eq!(report.state_of("leaf_0"), Some(NodeState::Skipped));
}

#[test]
fn completions_for_nodes_not_in_flight_are_ignored() {
    let mut core = CoreRuntime::new(fan_out(2), "p", 4);
    let root = dispatched(&core.start());

    let bogus = ScheduledTask {
        node: "leaf_0".into(),
        attempt: 1,
        timeout: None,
    };
    let step = core.step(complete(&bogus, TaskOutcome::failed("not yet started")));
    assert!(step.commands.is_empty());
    assert!(step.keep_running);
    assert_eq!(core.scheduler().state_of("leaf_0"), Some(NodeState::Pending));

    let step = core.step(complete(&root[0], TaskOutcome::Success));
    assert_eq!(dispatched(&step).len(), 2);
}

#[test]
fn abandoning_in_flight_work_finalizes_every_node() {
    let mut core = CoreRuntime::new(fan_out(2), "p", 4);
    dispatched(&core.start());

    let step = core.abandon_in_flight("executor went away");
    assert!(!step.keep_running);
    assert!(finished(&step));

    let report = core.report();
    assert_eq!(report.state_of("root"), Some(NodeState::Failed));
    assert_eq!(report.nodes["root"].error.as_deref(), Some("executor went away"));
    assert_eq!(report.state_of("leaf_0"), Some(NodeState::Skipped));
    assert!(!report.is_success());
}

#[test]
fn retries_go_back_through_the_queue() {
    let cfg = PipelineBuilder::new()
        .with_task("flaky", TaskConfigBuilder::new().retries(1).build())
        .build();
    let mut core = CoreRuntime::new(Scheduler::from_config(&cfg).unwrap(), "p", 1);

    let first = dispatched(&core.start());
    let retry = dispatched(&core.step(complete(&first[0], TaskOutcome::failed("x"))));
    assert_eq!(retry.len(), 1);
    assert_eq!(retry[0].attempt, 2);

    let done = core.step(complete(&retry[0], TaskOutcome::Success));
    assert!(!done.keep_running);
    assert_eq!(core.report().nodes["flaky"].attempts, 2);
}
