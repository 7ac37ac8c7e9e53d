// src/dag/trigger.rs

//! Trigger-rule evaluation.
//!
//! A node is only evaluated once every direct predecessor is terminal; the
//! evaluator then maps the rule plus those terminal states to a decision.
//! It is a pure function: same inputs, same decision.
//!
//! | rule          | run when                                   | otherwise                      |
//! |---------------|--------------------------------------------|--------------------------------|
//! | `all_success` | every predecessor `succeeded`              | `upstream_failed` if one `failed`, else `skipped` |
//! | `one_failed`  | some predecessor `failed`/`upstream_failed`| `skipped`                      |
//! | `none_failed` | no predecessor `failed`/`upstream_failed`  | `upstream_failed`              |
//! | `all_done`    | always                                     | -                              |

use crate::dag::task_info::NodeState;
use crate::types::TriggerRule;

/// What to do with a node whose predecessors are all terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Invoke the task body.
    Run,
    /// Finalize as `upstream_failed` without invoking the body.
    SkipUpstreamFailed,
    /// Finalize as `skipped` without invoking the body.
    SkipNotMet,
}

impl TriggerDecision {
    /// Terminal state assigned when the body is not invoked.
    pub fn skip_state(&self) -> Option<NodeState> {
        match self {
            TriggerDecision::Run => None,
            TriggerDecision::SkipUpstreamFailed => Some(NodeState::UpstreamFailed),
            TriggerDecision::SkipNotMet => Some(NodeState::Skipped),
        }
    }
}

/// Evaluate `rule` against the terminal states of a node's direct
/// predecessors. Nodes without predecessors see an empty slice.
pub fn evaluate(rule: TriggerRule, upstream: &[NodeState]) -> TriggerDecision {
    debug_assert!(upstream.iter().all(|s| s.is_terminal()));

    let any_failed = upstream.iter().any(|s| *s == NodeState::Failed);
    let any_failure = upstream.iter().any(|s| s.is_failure());

    match rule {
        TriggerRule::AllSuccess => {
            if upstream.iter().all(|s| *s == NodeState::Succeeded) {
                TriggerDecision::Run
            } else if any_failed {
                TriggerDecision::SkipUpstreamFailed
            } else {
                // Upstream was skipped or only transitively failed; the
                // failure is already recorded further up. Marking this node
                // upstream_failed instead would block a `none_failed` join
                // behind it: with `dbt_test` failed, `output` is
                // upstream_failed and `notify_success` must end skipped so
                // that `end` still runs.
                TriggerDecision::SkipNotMet
            }
        }
        TriggerRule::OneFailed => {
            if any_failure {
                TriggerDecision::Run
            } else {
                TriggerDecision::SkipNotMet
            }
        }
        TriggerRule::NoneFailed => {
            if any_failure {
                TriggerDecision::SkipUpstreamFailed
            } else {
                TriggerDecision::Run
            }
        }
        TriggerRule::AllDone => TriggerDecision::Run,
    }
}
