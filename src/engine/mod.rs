// src/engine/mod.rs

//! Orchestration engine for dagline.
//!
//! This module ties together:
//! - the pure scheduler (`dag::Scheduler`)
//! - the dispatch queue bounding how many task bodies run at once
//! - the runtime event loop that reacts to:
//!   - task completion events
//!   - cancellation requests (Ctrl-C)
//!   - expiry of the run's wall-clock budget
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::types::NodeId;

/// Outcome of one attempt of a task body.
///
/// Every non-success outcome is treated the same by trigger rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(String),
    TimedOut(Duration),
}

impl TaskOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        TaskOutcome::Failed(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Success => f.write_str("success"),
            TaskOutcome::Failed(msg) => write!(f, "failed: {msg}"),
            TaskOutcome::TimedOut(after) => write!(f, "timed out after {after:?}"),
        }
    }
}

/// Why a run stopped starting new nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The caller asked for cancellation (e.g. Ctrl-C).
    Requested,
    /// The run's wall-clock budget expired.
    Timeout,
}

/// Events flowing into the runtime from executors and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task body attempt finished.
    TaskCompleted {
        node: NodeId,
        attempt: u32,
        outcome: TaskOutcome,
        elapsed: Duration,
    },
    /// Pipeline-wide cancellation requested.
    CancelRequested,
    /// The run deadline passed.
    DeadlineExpired,
}

pub mod core;
pub mod event_handlers;
pub mod notify;
pub mod queue;
pub mod report;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use notify::{CommandNotifier, LogNotifier, Notifier};
pub use queue::DispatchQueue;
pub use report::{NodeReport, PipelineOutcome, RunReport};
pub use runtime::Runtime;
