// src/engine/report.rs

//! Run report: per-node terminal state, attempts and duration plus the
//! overall outcome.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::dag::NodeState;
use crate::engine::CancelReason;
use crate::errors::Result;
use crate::types::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub state: NodeState,
    pub attempts: u32,
    /// Time spent in the task body over all attempts.
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    pub outcome: PipelineOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<CancelReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration_ms: Option<u64>,
    pub nodes: BTreeMap<NodeId, NodeReport>,
}

impl RunReport {
    /// The outcome is `success` iff no node is `failed` or `upstream_failed`.
    pub fn new(pipeline: &str, nodes: BTreeMap<NodeId, NodeReport>) -> Self {
        let outcome = if nodes.values().any(|n| n.state.is_failure()) {
            PipelineOutcome::Failure
        } else {
            PipelineOutcome::Success
        };

        Self {
            pipeline: pipeline.to_string(),
            outcome,
            cancelled: None,
            total_duration_ms: None,
            nodes,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == PipelineOutcome::Success
    }

    pub fn state_of(&self, node: &str) -> Option<NodeState> {
        self.nodes.get(node).map(|n| n.state)
    }

    /// Nodes whose own body failed (not `upstream_failed`).
    pub fn failed_nodes(&self) -> Vec<&NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.state == NodeState::Failed)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn count(&self, state: NodeState) -> usize {
        self.nodes.values().filter(|n| n.state == state).count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable summary table.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let outcome = match self.outcome {
            PipelineOutcome::Success => "SUCCESS",
            PipelineOutcome::Failure => "FAILURE",
        };
        let _ = writeln!(out, "pipeline '{}': {}", self.pipeline, outcome);
        if let Some(reason) = self.cancelled {
            let _ = writeln!(out, "  cancelled: {:?}", reason);
        }

        let width = self
            .nodes
            .keys()
            .map(|id| id.as_str().len())
            .max()
            .unwrap_or(4)
            .max(4);
        for (id, node) in &self.nodes {
            let _ = write!(
                out,
                "  {:<width$}  {:<16} attempts={} {}ms",
                id.as_str(),
                node.state.to_string(),
                node.attempts,
                node.duration_ms,
                width = width
            );
            if let Some(ref err) = node.error {
                let _ = write!(out, "  ({err})");
            }
            out.push('\n');
        }
        out
    }
}
