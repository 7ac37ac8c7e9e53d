// src/exec/task_runner.rs

//! Runs one attempt of a task body and reports back to the runtime.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::body::{TaskBody, TaskContext};

/// Run `body` for `task`, enforcing the per-attempt timeout, and emit exactly
/// one `TaskCompleted` event.
///
/// On timeout the body's future is dropped, which kills any child process
/// it spawned.
pub async fn run_task(
    task: ScheduledTask,
    body: Arc<dyn TaskBody>,
    pipeline: String,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let ctx = TaskContext {
        node: task.node.clone(),
        attempt: task.attempt,
        pipeline,
    };

    let started = Instant::now();
    let outcome = match task.timeout {
        Some(limit) => match tokio::time::timeout(limit, body.run(&ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(node = %task.node, attempt = task.attempt, ?limit, "task attempt timed out");
                TaskOutcome::TimedOut(limit)
            }
        },
        None => body.run(&ctx).await,
    };
    let elapsed = started.elapsed();

    debug!(node = %task.node, attempt = task.attempt, %outcome, "attempt finished");

    let event = RuntimeEvent::TaskCompleted {
        node: task.node,
        attempt: task.attempt,
        outcome,
        elapsed,
    };
    if runtime_tx.send(event).await.is_err() {
        warn!("runtime went away before task completion could be reported");
    }
}
