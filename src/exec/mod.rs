// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`body`] defines the `TaskBody` capability and the no-op marker body.
//! - [`command`] runs shell commands with `tokio::process::Command`.
//! - [`registry`] maps node ids to bodies and checks coverage of the graph.
//! - [`executor_loop`] owns the loop that spawns one Tokio task per attempt.
//! - [`task_runner`] runs a single attempt under its timeout and reports
//!   the outcome as a `RuntimeEvent`.
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`; tests replace it with a fake.

pub mod backend;
pub mod body;
pub mod command;
pub mod executor_loop;
pub mod registry;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use body::{NoopBody, TaskBody, TaskContext};
pub use command::CommandBody;
pub use executor_loop::spawn_executor;
pub use registry::TaskRegistry;
