use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dagline::dag::ScheduledTask;
use dagline::engine::{RuntimeEvent, TaskOutcome};
use dagline::errors::Result;
use dagline::exec::ExecutorBackend;
use dagline::types::NodeId;
use tokio::sync::mpsc;

/// `(node, attempt)` pairs in dispatch order.
pub type ExecutionLog = Arc<Mutex<Vec<(String, u32)>>>;

/// A fake executor that:
/// - records which attempts were "run"
/// - reports a scripted outcome for each attempt (success by default)
///   after an optional per-node delay.
///
/// Completions are sent from spawned tasks, so dispatching never blocks on
/// the runtime's event channel.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    scripted: HashMap<NodeId, VecDeque<TaskOutcome>>,
    failing: HashSet<NodeId>,
    delays: HashMap<NodeId, Duration>,
    executed: ExecutionLog,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            scripted: HashMap::new(),
            failing: HashSet::new(),
            delays: HashMap::new(),
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every attempt of `node` fails.
    pub fn fail(mut self, node: &str) -> Self {
        self.failing.insert(NodeId::from(node));
        self
    }

    /// Outcomes for successive attempts of `node`; once exhausted, attempts
    /// succeed (or fail if `node` was marked with [`FakeExecutor::fail`]).
    pub fn outcomes(mut self, node: &str, outcomes: Vec<TaskOutcome>) -> Self {
        self.scripted.insert(NodeId::from(node), outcomes.into());
        self
    }

    pub fn delay(mut self, node: &str, delay: Duration) -> Self {
        self.delays.insert(NodeId::from(node), delay);
        self
    }

    pub fn log(&self) -> ExecutionLog {
        Arc::clone(&self.executed)
    }

    fn next_outcome(&mut self, node: &NodeId) -> TaskOutcome {
        if let Some(outcome) = self.scripted.get_mut(node).and_then(|q| q.pop_front()) {
            return outcome;
        }
        if self.failing.contains(node) {
            TaskOutcome::failed(format!("{node} failed"))
        } else {
            TaskOutcome::Success
        }
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for task in tasks {
                self.executed
                    .lock()
                    .unwrap()
                    .push((task.node.to_string(), task.attempt));

                let outcome = self.next_outcome(&task.node);
                let delay = self.delays.get(&task.node).copied().unwrap_or_default();
                let tx = self.runtime_tx.clone();

                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let _ = tx
                        .send(RuntimeEvent::TaskCompleted {
                            node: task.node,
                            attempt: task.attempt,
                            outcome,
                            elapsed: delay,
                        })
                        .await;
                });
            }
            Ok(())
        })
    }
}

/// Node names from a log, in dispatch order.
pub fn executed_nodes(log: &ExecutionLog) -> Vec<String> {
    log.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
}
