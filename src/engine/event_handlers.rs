// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep};
use crate::engine::queue::DispatchQueue;
use crate::engine::{CancelReason, TaskOutcome};
use crate::types::NodeId;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Every node is terminal; the shell should stop and report.
    RunFinished,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Seed the run: evaluate roots and dispatch the first batch.
pub fn handle_start(scheduler: &mut Scheduler, queue: &mut DispatchQueue) -> CoreStep {
    let step = scheduler.start();
    finish_step(scheduler, queue, step)
}

/// Handle completion of one task body attempt.
///
/// Frees the node's slot, records the outcome (which may schedule a retry
/// or unblock dependents), and dispatches whatever fits in the freed slots.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    queue: &mut DispatchQueue,
    node: NodeId,
    attempt: u32,
    outcome: TaskOutcome,
    elapsed: Duration,
) -> CoreStep {
    if !queue.complete(&node) {
        warn!(node = %node, attempt, "ignoring completion for node not in flight");
        return CoreStep {
            commands: Vec::new(),
            keep_running: !scheduler.is_finished(),
        };
    }

    info!(
        node = %node,
        attempt,
        elapsed_ms = elapsed.as_millis() as u64,
        outcome = %outcome,
        "task body finished"
    );

    let step = scheduler.step_completion(node.as_str(), outcome, elapsed);
    finish_step(scheduler, queue, step)
}

/// Handle cancellation (explicit request or expired deadline).
///
/// Pending nodes are skipped, undispatched tasks are finalized without
/// running, and in-flight bodies are left to finish.
pub fn handle_cancel(
    scheduler: &mut Scheduler,
    queue: &mut DispatchQueue,
    reason: CancelReason,
) -> CoreStep {
    info!(
        ?reason,
        in_flight = queue.in_flight(),
        "cancelling run; draining in-flight tasks"
    );

    let mut step = scheduler.cancel();
    for task in queue.drain_backlog() {
        let aborted = scheduler.abort_unstarted(&task);
        merge(&mut step, aborted);
    }
    finish_step(scheduler, queue, step)
}

/// Finalize every in-flight node as failed; used when their completions can
/// no longer arrive.
pub fn handle_abandon(scheduler: &mut Scheduler, queue: &mut DispatchQueue, reason: &str) -> CoreStep {
    let mut step = scheduler.cancel();
    for task in queue.drain_backlog() {
        merge(&mut step, scheduler.abort_unstarted(&task));
    }
    for node in queue.drain_in_flight() {
        merge(&mut step, scheduler.abandon(node.as_str(), reason));
    }
    finish_step(scheduler, queue, step)
}

/// Feed newly scheduled tasks through the dispatch queue and decide whether
/// the run is over.
fn finish_step(scheduler: &mut Scheduler, queue: &mut DispatchQueue, step: SchedulerStep) -> CoreStep {
    let mut commands = Vec::new();

    queue.enqueue(step.newly_scheduled);
    let batch = queue.next_batch();
    if !batch.is_empty() {
        commands.push(CoreCommand::DispatchTasks(batch));
    }

    if !scheduler.is_finished() && queue.is_idle() {
        // Nothing running and nothing queued, yet some node is not terminal.
        // Finalize what is left rather than waiting forever.
        error!("scheduler stalled with no work in flight; finalizing remaining nodes");
        scheduler.cancel();
        for node in scheduler.running_nodes() {
            scheduler.abandon(node.as_str(), "scheduler stalled");
        }
    }

    let finished = scheduler.is_finished();
    if finished {
        commands.push(CoreCommand::RunFinished);
    }

    CoreStep {
        commands,
        keep_running: !finished,
    }
}

fn merge(into: &mut SchedulerStep, other: SchedulerStep) {
    into.newly_scheduled.extend(other.newly_scheduled);
    into.newly_failed.extend(other.newly_failed);
    into.newly_skipped.extend(other.newly_skipped);
    into.newly_upstream_failed.extend(other.newly_upstream_failed);
    into.run_just_finished = other.run_just_finished;
}
