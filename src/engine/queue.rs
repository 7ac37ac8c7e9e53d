// src/engine/queue.rs

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, warn};

use crate::dag::ScheduledTask;
use crate::types::NodeId;

/// Bounded dispatch queue between the scheduler and the executor.
///
/// Semantics:
/// - Tasks the scheduler marks ready are appended to a FIFO backlog.
/// - At most `max_parallel` tasks are handed to the executor at once; a
///   slot is freed when the task's completion arrives.
/// - A node is never in flight twice, so a stray duplicate completion can
///   be detected and dropped.
#[derive(Debug)]
pub struct DispatchQueue {
    max_parallel: usize,
    in_flight: BTreeSet<NodeId>,
    backlog: VecDeque<ScheduledTask>,
}

impl DispatchQueue {
    /// `max_parallel` is clamped to at least 1; a zero-width pool would
    /// never make progress.
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            in_flight: BTreeSet::new(),
            backlog: VecDeque::new(),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn in_flight_nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.in_flight.iter()
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// No task is running or waiting for a slot.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty() && self.backlog.is_empty()
    }

    pub fn enqueue(&mut self, tasks: impl IntoIterator<Item = ScheduledTask>) {
        for task in tasks {
            debug!(node = %task.node, attempt = task.attempt, "queued for dispatch");
            self.backlog.push_back(task);
        }
    }

    /// Take as many backlog entries as there are free slots and mark them in
    /// flight.
    pub fn next_batch(&mut self) -> Vec<ScheduledTask> {
        let mut batch = Vec::new();
        while self.in_flight.len() < self.max_parallel {
            let Some(task) = self.backlog.pop_front() else {
                break;
            };
            self.in_flight.insert(task.node.clone());
            batch.push(task);
        }
        batch
    }

    /// Free the slot held by `node`. Returns `false` if `node` was not in
    /// flight.
    pub fn complete(&mut self, node: &NodeId) -> bool {
        let removed = self.in_flight.remove(node);
        if !removed {
            warn!(node = %node, "completion for node that is not in flight");
        }
        removed
    }

    /// Remove every task still waiting for a slot.
    pub fn drain_backlog(&mut self) -> Vec<ScheduledTask> {
        let drained: Vec<ScheduledTask> = self.backlog.drain(..).collect();
        if !drained.is_empty() {
            debug!(drained = drained.len(), "dropped undispatched tasks");
        }
        drained
    }

    /// Forget all in-flight nodes, returning them.
    pub fn drain_in_flight(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.in_flight).into_iter().collect()
    }
}
