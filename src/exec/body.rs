// src/exec/body.rs

//! The capability every task body implements.

use std::future::Future;
use std::pin::Pin;

use crate::engine::TaskOutcome;
use crate::types::NodeId;

/// What a body learns about the attempt it is running.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub node: NodeId,
    /// 1-based attempt number.
    pub attempt: u32,
    pub pipeline: String,
}

/// A unit of work bound to one node.
///
/// Bodies report failure as a [`TaskOutcome`], never by panicking or
/// returning an error; the scheduler treats every non-success outcome the
/// same way.
pub trait TaskBody: Send + Sync {
    fn run<'a>(
        &'a self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>>;

    /// Short description for dry-run output.
    fn describe(&self) -> String;
}

/// Body of a marker task (e.g. `start`, `end`): always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBody;

impl TaskBody for NoopBody {
    fn run<'a>(
        &'a self,
        _ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>> {
        Box::pin(async { TaskOutcome::Success })
    }

    fn describe(&self) -> String {
        "noop".to_string()
    }
}
