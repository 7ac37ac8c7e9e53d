// src/dag/mod.rs

//! Graph representation and scheduling.
//!
//! - [`graph`] holds the validated, immutable dependency graph.
//! - [`trigger`] maps a trigger rule and predecessor states to a decision.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which nodes run, retry, or are skipped.
//! - [`task_info`] provides node policies, run states and scheduled tasks.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;
pub mod trigger;

pub use graph::{ConstructionError, Edge, GraphBuilder, GraphModel, Node};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{NodeState, ScheduledTask, TaskPolicy};
pub use trigger::TriggerDecision;
