// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) is responsible for reading
//! events from channels, handing `ScheduledTask`s to the executor, and
//! watching the clock. The core itself never touches Tokio.

use tracing::info;

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    CoreStep, handle_abandon, handle_cancel, handle_start, handle_task_completion,
};
use crate::engine::queue::DispatchQueue;
use crate::engine::report::RunReport;
use crate::engine::{CancelReason, RuntimeEvent};

/// Pure core runtime state.
///
/// This owns the scheduler, the bounded dispatch queue and the reason the
/// run was cancelled (if it was).
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    pipeline: String,
    queue: DispatchQueue,
    cancel_reason: Option<CancelReason>,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, pipeline: impl Into<String>, max_parallel: usize) -> Self {
        Self {
            scheduler,
            pipeline: pipeline.into(),
            queue: DispatchQueue::new(max_parallel),
            cancel_reason: None,
        }
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Number of task bodies currently handed to the executor.
    pub fn in_flight(&self) -> usize {
        self.queue.in_flight()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_reason.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    /// Begin the run, returning the first batch of dispatches.
    pub fn start(&mut self) -> CoreStep {
        info!(
            pipeline = %self.pipeline,
            max_parallel = self.queue.max_parallel(),
            "core: starting pipeline"
        );
        handle_start(&mut self.scheduler, &mut self.queue)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskCompleted {
                node,
                attempt,
                outcome,
                elapsed,
            } => handle_task_completion(
                &mut self.scheduler,
                &mut self.queue,
                node,
                attempt,
                outcome,
                elapsed,
            ),
            RuntimeEvent::CancelRequested => self.cancel(CancelReason::Requested),
            RuntimeEvent::DeadlineExpired => self.cancel(CancelReason::Timeout),
        }
    }

    /// Completions for the in-flight nodes will never arrive; finalize them
    /// as failed with `reason`.
    pub fn abandon_in_flight(&mut self, reason: &str) -> CoreStep {
        self.cancel_reason.get_or_insert(CancelReason::Requested);
        handle_abandon(&mut self.scheduler, &mut self.queue, reason)
    }

    /// Snapshot of the run as a report.
    pub fn report(&self) -> RunReport {
        let mut report = self.scheduler.report(&self.pipeline);
        report.cancelled = self.cancel_reason;
        report
    }

    fn cancel(&mut self, reason: CancelReason) -> CoreStep {
        if self.cancel_reason.is_none() {
            self.cancel_reason = Some(reason);
        }
        handle_cancel(&mut self.scheduler, &mut self.queue, reason)
    }
}
