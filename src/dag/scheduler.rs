// src/dag/scheduler.rs

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::model::PipelineFile;
use crate::dag::graph::GraphModel;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{NodeState, ScheduledTask, TaskInfo, TaskPolicy};
use crate::engine::TaskOutcome;
use crate::engine::{NodeReport, RunReport};
use crate::errors::Result;
use crate::types::NodeId;

/// Scheduler holds the immutable graph plus the mutable state of one run.
///
/// It is responsible for:
/// - evaluating trigger rules once a node's predecessors are terminal
/// - marking nodes running / succeeded / failed / skipped / upstream_failed
/// - re-scheduling failed nodes while their retry budget lasts
/// - draining the run on cancellation
///
/// It performs no IO and never looks at the clock; durations arrive with
/// completion events.
#[derive(Debug)]
pub struct Scheduler {
    graph: GraphModel,
    tasks: BTreeMap<NodeId, TaskInfo>,
    started: bool,
    cancelled: bool,
}

impl Scheduler {
    /// Build a scheduler over `graph`. Nodes missing from `policies` get the
    /// default policy (`all_success`, no retries).
    pub fn new(graph: GraphModel, mut policies: HashMap<NodeId, TaskPolicy>) -> Self {
        let tasks = graph
            .ids()
            .map(|id| {
                let policy = policies.remove(id).unwrap_or_default();
                (id.clone(), TaskInfo::new(id.clone(), policy))
            })
            .collect();

        for id in policies.keys() {
            warn!(node = %id, "policy given for node not in graph; ignoring");
        }

        Self {
            graph,
            tasks,
            started: false,
            cancelled: false,
        }
    }

    /// Construct a scheduler from a validated [`PipelineFile`]. The scheduler
    /// builds and owns its own graph instance.
    pub fn from_config(cfg: &PipelineFile) -> Result<Self> {
        let graph = cfg.build_graph()?;
        let mut policies = HashMap::new();
        for (name, task) in cfg.task.iter() {
            policies.insert(
                NodeId::from(name.as_str()),
                TaskPolicy::from_config(task, &cfg.pipeline)?,
            );
        }
        Ok(Self::new(graph, policies))
    }

    pub fn graph(&self) -> &GraphModel {
        &self.graph
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Every node has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.tasks.values().all(|info| info.state.is_terminal())
    }

    pub fn state_of(&self, node: &str) -> Option<NodeState> {
        self.tasks.get(node).map(|info| info.state)
    }

    pub fn attempts_of(&self, node: &str) -> Option<u32> {
        self.tasks.get(node).map(|info| info.attempts)
    }

    /// `true` if `node` is pending and all its predecessors are terminal,
    /// i.e. the next sweep would evaluate it.
    pub fn is_ready(&self, node: &NodeId) -> bool {
        ReadOnlyStateManager::new(&self.graph, &self.tasks).is_ready(node)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.tasks.keys()
    }

    pub fn running_nodes(&self) -> Vec<NodeId> {
        self.tasks
            .values()
            .filter(|info| info.state == NodeState::Running)
            .map(|info| info.id.clone())
            .collect()
    }

    /// Start the run: evaluate the roots (and anything they unblock).
    pub fn start(&mut self) -> SchedulerStep {
        if self.started {
            warn!("scheduler already started; ignoring");
            return SchedulerStep::default();
        }
        self.started = true;
        info!(nodes = self.tasks.len(), "scheduler: starting run");
        self.advance(SchedulerStep::default())
    }

    /// Record the outcome of one attempt of `node`'s body.
    pub fn step_completion(
        &mut self,
        node: &str,
        outcome: TaskOutcome,
        elapsed: Duration,
    ) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        let cancelled = self.cancelled;

        let Some(info) = self.tasks.get_mut(node) else {
            warn!(node = %node, "completion for unknown node; ignoring");
            return step;
        };

        if info.state != NodeState::Running {
            // Guards against a second completion finalizing the node twice.
            warn!(
                node = %node,
                state = %info.state,
                "completion for node that is not running; ignoring"
            );
            return step;
        }

        info.elapsed += elapsed;

        match outcome {
            TaskOutcome::Success => {
                info.state = NodeState::Succeeded;
                info.last_error = None;
                debug!(node = %node, attempt = info.attempts, "node succeeded");
            }
            failure => {
                let message = failure.to_string();
                info.last_error = Some(message.clone());

                if info.retry_budget_left() && !cancelled {
                    info.attempts += 1;
                    warn!(
                        node = %node,
                        attempt = info.attempts,
                        retries = info.policy.retries,
                        error = %message,
                        "attempt failed; retrying"
                    );
                    step.newly_scheduled.push(ScheduledTask::from_task_info(info));
                } else {
                    info.state = NodeState::Failed;
                    warn!(
                        node = %node,
                        attempts = info.attempts,
                        error = %message,
                        "node failed"
                    );
                    step.newly_failed.push(info.id.clone());
                }
            }
        }

        self.advance(step)
    }

    /// Stop evaluating new nodes. Pending nodes become `skipped`; nodes that
    /// are running keep running and are recorded when they complete.
    pub fn cancel(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.cancelled {
            return step;
        }
        self.cancelled = true;
        info!("scheduler: run cancelled; no new nodes will start");

        let mut manager = StateManager::new(&self.graph, &mut self.tasks);
        step.newly_skipped = manager.skip_all_pending();
        step.run_just_finished = manager.all_terminal();
        step
    }

    /// Finalize a node that was scheduled but whose body never started
    /// because the run was cancelled first. A first attempt becomes
    /// `skipped`; a pending retry keeps the failure it already had.
    pub fn abort_unstarted(&mut self, task: &ScheduledTask) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if let Some(info) = self.tasks.get_mut(&task.node) {
            if info.state == NodeState::Running {
                info.attempts = task.attempt.saturating_sub(1);
                if task.attempt > 1 {
                    info.state = NodeState::Failed;
                    step.newly_failed.push(info.id.clone());
                } else {
                    info.state = NodeState::Skipped;
                    step.newly_skipped.push(info.id.clone());
                }
                debug!(node = %info.id, state = %info.state, "scheduled node never started");
            }
        }
        self.advance(step)
    }

    /// Finalize a running node whose completion can no longer arrive.
    pub fn abandon(&mut self, node: &str, reason: &str) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if let Some(info) = self.tasks.get_mut(node) {
            if info.state == NodeState::Running {
                info.state = NodeState::Failed;
                info.last_error = Some(reason.to_string());
                warn!(node = %node, reason, "running node abandoned");
                step.newly_failed.push(info.id.clone());
            }
        }
        self.advance(step)
    }

    /// Build the report for the current state of the run.
    pub fn report(&self, pipeline: &str) -> RunReport {
        let nodes = self
            .tasks
            .values()
            .map(|info| {
                (
                    info.id.clone(),
                    NodeReport {
                        state: info.state,
                        attempts: info.attempts,
                        duration_ms: info.elapsed.as_millis() as u64,
                        error: info.last_error.clone(),
                    },
                )
            })
            .collect();
        RunReport::new(pipeline, nodes)
    }

    /// Run a readiness sweep (unless cancelled) and fill in the remaining
    /// fields of `step`.
    fn advance(&mut self, mut step: SchedulerStep) -> SchedulerStep {
        let mut manager = StateManager::new(&self.graph, &mut self.tasks);

        if !self.cancelled {
            let sweep = manager.collect_ready();
            step.newly_scheduled.extend(sweep.scheduled);
            step.newly_skipped.extend(sweep.skipped);
            step.newly_upstream_failed.extend(sweep.upstream_failed);
        }

        step.run_just_finished = manager.all_terminal();
        if step.run_just_finished {
            info!("scheduler: all nodes terminal; run finished");
        }
        step
    }
}
