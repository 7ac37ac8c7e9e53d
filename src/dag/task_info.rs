// src/dag/task_info.rs

//! Per-node policy and per-run state.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::config::model::{PipelineSection, TaskConfig};
use crate::errors::{DaglineError, Result};
use crate::types::{NodeId, TriggerRule, parse_duration};

/// Execution state of one node within a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
    UpstreamFailed,
}

impl NodeState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NodeState::Pending | NodeState::Running)
    }

    /// `failed` or `upstream_failed`: the states that make a run fail.
    pub fn is_failure(&self) -> bool {
        matches!(self, NodeState::Failed | NodeState::UpstreamFailed)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Pending => "pending",
            NodeState::Running => "running",
            NodeState::Succeeded => "succeeded",
            NodeState::Failed => "failed",
            NodeState::Skipped => "skipped",
            NodeState::UpstreamFailed => "upstream_failed",
        };
        f.write_str(s)
    }
}

/// Static scheduling policy of a node, fixed when the scheduler is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskPolicy {
    pub trigger_rule: TriggerRule,
    /// Extra attempts after the first failed one.
    pub retries: u32,
    /// Per-attempt execution timeout enforced by the executor.
    pub timeout: Option<Duration>,
}

impl TaskPolicy {
    pub fn from_config(cfg: &TaskConfig, pipeline: &PipelineSection) -> Result<Self> {
        let timeout = cfg
            .timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(DaglineError::ConfigError)?;

        Ok(Self {
            trigger_rule: cfg.trigger_rule,
            retries: cfg.effective_retries(pipeline.default_retries),
            timeout,
        })
    }

    pub fn with_rule(trigger_rule: TriggerRule) -> Self {
        Self {
            trigger_rule,
            ..Self::default()
        }
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// Policy plus mutable per-run bookkeeping for one node.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: NodeId,
    pub policy: TaskPolicy,
    pub state: NodeState,
    /// Number of times the body has been handed to the executor.
    pub attempts: u32,
    /// Wall-clock time spent in the body, summed over attempts.
    pub elapsed: Duration,
    /// Message of the most recent failed attempt; cleared once an attempt
    /// succeeds.
    pub last_error: Option<String>,
}

impl TaskInfo {
    pub fn new(id: NodeId, policy: TaskPolicy) -> Self {
        Self {
            id,
            policy,
            state: NodeState::Pending,
            attempts: 0,
            elapsed: Duration::ZERO,
            last_error: None,
        }
    }

    pub fn retry_budget_left(&self) -> bool {
        self.attempts <= self.policy.retries
    }
}

/// A node the scheduler wants the executor to run now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub node: NodeId,
    /// 1 for the first attempt, incremented on every retry.
    pub attempt: u32,
    pub timeout: Option<Duration>,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo) -> Self {
        Self {
            node: info.id.clone(),
            attempt: info.attempts,
            timeout: info.policy.timeout,
        }
    }
}
