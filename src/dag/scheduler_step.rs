// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task_info::ScheduledTask;
use crate::types::NodeId;

/// Structured result of a single scheduler "step".
///
/// Useful for tests that want to manually step the graph and make
/// assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Bodies to invoke now: newly ready nodes and retries.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Nodes finalized as `failed` in this step.
    pub newly_failed: Vec<NodeId>,
    /// Nodes finalized as `skipped` in this step.
    pub newly_skipped: Vec<NodeId>,
    /// Nodes finalized as `upstream_failed` in this step.
    pub newly_upstream_failed: Vec<NodeId>,
    /// Whether this step brought every node to a terminal state.
    pub run_just_finished: bool,
}
