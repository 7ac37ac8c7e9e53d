// src/exec/executor_loop.rs

//! Main executor loop that spawns task body attempts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::registry::TaskRegistry;
use crate::exec::task_runner::run_task;
use crate::types::NodeId;

/// Spawn the background executor loop.
///
/// The returned sender is what `RealExecutorBackend` forwards scheduled
/// tasks into. Each attempt runs in its own Tokio task; the bound on how
/// many run at once is enforced upstream by the dispatch queue.
///
/// An attempt number is only ever started once per node, so a duplicated
/// dispatch can't finalize a node twice.
pub fn spawn_executor(
    registry: Arc<TaskRegistry>,
    pipeline: String,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        // Highest attempt started per node.
        let mut started: HashMap<NodeId, u32> = HashMap::new();

        while let Some(task) = rx.recv().await {
            handle_scheduled_task(task, &registry, &pipeline, &mut started, &runtime_tx).await;
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

async fn handle_scheduled_task(
    task: ScheduledTask,
    registry: &TaskRegistry,
    pipeline: &str,
    started: &mut HashMap<NodeId, u32>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    if let Some(&last) = started.get(&task.node) {
        if task.attempt <= last {
            warn!(
                node = %task.node,
                attempt = task.attempt,
                last_started = last,
                "attempt already started; ignoring duplicate dispatch"
            );
            return;
        }
    }
    started.insert(task.node.clone(), task.attempt);

    let Some(body) = registry.get(task.node.as_str()) else {
        error!(node = %task.node, "no task body registered");
        let _ = runtime_tx
            .send(RuntimeEvent::TaskCompleted {
                node: task.node.clone(),
                attempt: task.attempt,
                outcome: TaskOutcome::failed("no task body registered"),
                elapsed: Duration::ZERO,
            })
            .await;
        return;
    };

    debug!(node = %task.node, attempt = task.attempt, "spawning task attempt");
    let rt_tx = runtime_tx.clone();
    let pipeline = pipeline.to_string();
    tokio::spawn(run_task(task, body, pipeline, rt_tx));
}
