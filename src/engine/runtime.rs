// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::notify::Notifier;
use super::report::RunReport;
use super::{CoreCommand, CoreStep, RuntimeEvent};

/// Drives the scheduler in response to `RuntimeEvent`s and delegates task
/// execution to an `ExecutorBackend`.
///
/// This is an IO shell around `CoreRuntime`, which holds all run semantics.
/// The shell owns the clock: if a run timeout is set, a `DeadlineExpired`
/// event is injected once it passes.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    timeout: Option<Duration>,
    notifiers: Vec<Box<dyn Notifier>>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("timeout", &self.timeout)
            .field("notifiers", &self.notifiers.len())
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
            timeout: None,
            notifiers: Vec::new(),
        }
    }

    /// Wall-clock budget for the whole run.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.push(Box::new(notifier));
        self
    }

    /// Main event loop.
    ///
    /// - Starts the core and dispatches the first batch.
    /// - Feeds events from `event_rx` (and the deadline) into the core.
    /// - Executes commands returned by the core until every node is terminal.
    ///
    /// Returns the final report; a failed pipeline is still `Ok`.
    pub async fn run(mut self) -> Result<RunReport> {
        info!(pipeline = %self.core.pipeline(), "dagline runtime started");

        let started = Instant::now();
        let deadline = self.timeout.map(|t| started + t);
        let mut deadline_fired = false;

        let first = self.core.start();
        let mut keep_running = self.apply(first).await;

        while keep_running {
            let event = tokio::select! {
                event = self.event_rx.recv() => event,
                _ = wait_for(deadline), if !deadline_fired => {
                    deadline_fired = true;
                    warn!(timeout = ?self.timeout, "run deadline expired");
                    Some(RuntimeEvent::DeadlineExpired)
                }
            };

            let step = match event {
                Some(event) => {
                    debug!(?event, "runtime received event");
                    self.core.step(event)
                }
                None => {
                    error!(
                        in_flight = self.core.in_flight(),
                        "runtime event channel closed before run finished"
                    );
                    self.core.abandon_in_flight("executor went away")
                }
            };

            keep_running = self.apply(step).await;
        }

        let mut report = self.core.report();
        report.total_duration_ms = Some(started.elapsed().as_millis() as u64);
        info!(
            pipeline = %report.pipeline,
            outcome = ?report.outcome,
            duration_ms = report.total_duration_ms,
            "runtime exiting"
        );

        for notifier in &self.notifiers {
            if let Err(err) = notifier.notify(&report).await {
                error!(error = %err, "notifier failed");
            }
        }

        Ok(report)
    }

    /// Execute the commands of one core step. Returns whether the loop should
    /// keep running.
    async fn apply(&mut self, step: CoreStep) -> bool {
        for command in step.commands {
            match command {
                CoreCommand::DispatchTasks(tasks) => {
                    if let Err(err) = self.dispatch(tasks).await {
                        error!(error = %err, "failed to hand tasks to executor");
                        let step = self.core.abandon_in_flight("dispatch failed");
                        return step.keep_running;
                    }
                }
                CoreCommand::RunFinished => {
                    debug!("core reported run finished");
                }
            }
        }
        step.keep_running
    }

    async fn dispatch(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let nodes: Vec<_> = tasks.iter().map(|t| t.node.as_str()).collect();
        debug!(?nodes, "dispatching ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}

/// Resolves at `deadline`, or never if there is none.
async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
