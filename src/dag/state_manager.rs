// src/dag/state_manager.rs

//! Per-run state transitions (the ExecutionState of one run).

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::dag::graph::GraphModel;
use crate::dag::task_info::{NodeState, ScheduledTask, TaskInfo};
use crate::dag::trigger::{self, TriggerDecision};
use crate::types::NodeId;

/// Nodes that changed state during one readiness sweep.
#[derive(Debug, Default)]
pub struct ReadySweep {
    pub scheduled: Vec<ScheduledTask>,
    pub skipped: Vec<NodeId>,
    pub upstream_failed: Vec<NodeId>,
}

/// Mutable view over the run state, borrowing the immutable graph.
pub struct StateManager<'a> {
    graph: &'a GraphModel,
    tasks: &'a mut BTreeMap<NodeId, TaskInfo>,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a GraphModel, tasks: &'a mut BTreeMap<NodeId, TaskInfo>) -> Self {
        Self { graph, tasks }
    }

    /// Evaluate every `Pending` node whose predecessors are all terminal.
    ///
    /// Nodes that run are marked `Running` and returned; nodes the trigger
    /// rule rejects are finalized immediately, which may in turn make their
    /// dependents evaluable, so the sweep repeats until nothing changes.
    pub fn collect_ready(&mut self) -> ReadySweep {
        let mut sweep = ReadySweep::default();

        loop {
            let ro = ReadOnlyStateManager::new(self.graph, self.tasks);
            // BTreeMap iteration keeps candidates in id order.
            let candidates: Vec<(NodeId, TriggerDecision)> = self
                .tasks
                .values()
                .filter(|info| info.state == NodeState::Pending)
                .filter_map(|info| {
                    let upstream = ro.upstream_states(&info.id)?;
                    Some((info.id.clone(), trigger::evaluate(info.policy.trigger_rule, &upstream)))
                })
                .collect();

            if candidates.is_empty() {
                break;
            }

            for (id, decision) in candidates {
                let Some(info) = self.tasks.get_mut(&id) else {
                    continue;
                };

                match decision.skip_state() {
                    None => {
                        info.state = NodeState::Running;
                        info.attempts = 1;
                        info!(
                            node = %info.id,
                            rule = %info.policy.trigger_rule,
                            "predecessors terminal; scheduling node"
                        );
                        sweep.scheduled.push(ScheduledTask::from_task_info(info));
                    }
                    Some(state) => {
                        info.state = state;
                        debug!(
                            node = %info.id,
                            rule = %info.policy.trigger_rule,
                            %state,
                            "trigger rule not met; body not invoked"
                        );
                        match state {
                            NodeState::UpstreamFailed => sweep.upstream_failed.push(id),
                            _ => sweep.skipped.push(id),
                        }
                    }
                }
            }
        }

        sweep
    }

    /// Finalize every still-`Pending` node as `Skipped` (cancellation).
    pub fn skip_all_pending(&mut self) -> Vec<NodeId> {
        let mut skipped = Vec::new();
        for info in self.tasks.values_mut() {
            if info.state == NodeState::Pending {
                info.state = NodeState::Skipped;
                skipped.push(info.id.clone());
            }
        }
        if !skipped.is_empty() {
            debug!(count = skipped.len(), "pending nodes skipped after cancellation");
        }
        skipped
    }

    pub fn all_terminal(&self) -> bool {
        self.tasks.values().all(|info| info.state.is_terminal())
    }
}

/// Read-only queries over the run state.
pub struct ReadOnlyStateManager<'a> {
    graph: &'a GraphModel,
    tasks: &'a BTreeMap<NodeId, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(graph: &'a GraphModel, tasks: &'a BTreeMap<NodeId, TaskInfo>) -> Self {
        Self { graph, tasks }
    }

    /// Terminal states of all direct predecessors of `id`, or `None` while
    /// any of them is still pending or running.
    pub fn upstream_states(&self, id: &NodeId) -> Option<Vec<NodeState>> {
        self.graph
            .predecessors(id.as_str())
            .iter()
            .map(|dep| {
                self.tasks
                    .get(dep)
                    .map(|d| d.state)
                    .filter(|s| s.is_terminal())
            })
            .collect()
    }

    pub fn is_ready(&self, id: &NodeId) -> bool {
        self.tasks
            .get(id)
            .is_some_and(|info| info.state == NodeState::Pending)
            && self.upstream_states(id).is_some()
    }
}
