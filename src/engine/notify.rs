// src/engine/notify.rs

//! Notification hooks fired once a run has finished.
//!
//! Notification failures are logged by the runtime and never change the
//! pipeline outcome.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, bail};
use tracing::{info, warn};

use crate::engine::report::{PipelineOutcome, RunReport};
use crate::exec::command::shell_command;

/// Something to tell about a finished run.
pub trait Notifier: Send + Sync {
    fn notify<'a>(
        &'a self,
        report: &'a RunReport,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// Writes the outcome into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify<'a>(
        &'a self,
        report: &'a RunReport,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            match report.outcome {
                PipelineOutcome::Success => {
                    info!(pipeline = %report.pipeline, "pipeline succeeded");
                }
                PipelineOutcome::Failure => {
                    let failed: Vec<&str> =
                        report.failed_nodes().into_iter().map(|id| id.as_str()).collect();
                    warn!(pipeline = %report.pipeline, ?failed, "pipeline failed");
                }
            }
            Ok(())
        })
    }
}

/// Runs a shell command per outcome (`[notify] on_success` / `on_failure`).
///
/// The command sees `DAGLINE_PIPELINE` and `DAGLINE_OUTCOME` in its
/// environment.
#[derive(Debug, Clone, Default)]
pub struct CommandNotifier {
    on_success: Option<String>,
    on_failure: Option<String>,
}

impl CommandNotifier {
    pub fn new(on_success: Option<String>, on_failure: Option<String>) -> Self {
        Self {
            on_success,
            on_failure,
        }
    }

    /// The command that would run for `outcome`, if any.
    pub fn command_for(&self, outcome: PipelineOutcome) -> Option<&str> {
        match outcome {
            PipelineOutcome::Success => self.on_success.as_deref(),
            PipelineOutcome::Failure => self.on_failure.as_deref(),
        }
    }
}

impl Notifier for CommandNotifier {
    fn notify<'a>(
        &'a self,
        report: &'a RunReport,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let Some(cmd) = self.command_for(report.outcome) else {
                return Ok(());
            };
            let outcome = match report.outcome {
                PipelineOutcome::Success => "success",
                PipelineOutcome::Failure => "failure",
            };

            info!(cmd = %cmd, outcome, "running notification command");
            let status = shell_command(cmd, None)
                .env("DAGLINE_PIPELINE", &report.pipeline)
                .env("DAGLINE_OUTCOME", outcome)
                .stdout(Stdio::null())
                .status()
                .await
                .with_context(|| format!("spawning notification command '{cmd}'"))?;

            if !status.success() {
                bail!(
                    "notification command '{cmd}' exited with code {}",
                    status.code().unwrap_or(-1)
                );
            }
            Ok(())
        })
    }
}
