// src/exec/command.rs

//! Shell command bodies.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::engine::TaskOutcome;
use crate::exec::body::{TaskBody, TaskContext};

/// Build a shell command appropriate for the platform.
///
/// The child is killed if the returned command's future is dropped, which
/// is how per-attempt timeouts stop a body.
pub fn shell_command(cmd: &str, cwd: Option<&str>) -> Command {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command.kill_on_drop(true);
    command
}

/// Run `cmd` to completion and return its stdout. A non-zero exit is an
/// error carrying the exit code.
pub async fn capture_stdout(cmd: &str, cwd: Option<&str>) -> Result<String> {
    let output = shell_command(cmd, cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("spawning '{cmd}'"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "'{cmd}' exited with code {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Body that runs a shell command; exit code 0 is success.
#[derive(Debug, Clone)]
pub struct CommandBody {
    cmd: String,
    cwd: Option<String>,
}

impl CommandBody {
    pub fn new(cmd: impl Into<String>, cwd: Option<String>) -> Self {
        Self {
            cmd: cmd.into(),
            cwd,
        }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<TaskOutcome> {
        info!(
            node = %ctx.node,
            attempt = ctx.attempt,
            cmd = %self.cmd,
            "starting task process"
        );

        let mut child = shell_command(&self.cmd, self.cwd.as_deref())
            .env("DAGLINE_PIPELINE", &ctx.pipeline)
            .env("DAGLINE_NODE", ctx.node.as_str())
            .env("DAGLINE_ATTEMPT", ctx.attempt.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning process for node '{}'", ctx.node))?;

        // Drain both pipes so the child never blocks on a full buffer.
        if let Some(stdout) = child.stdout.take() {
            let node = ctx.node.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(node = %node, "stdout: {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let node = ctx.node.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(node = %node, "stderr: {}", line);
                }
            });
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of node '{}'", ctx.node))?;

        let code = status.code().unwrap_or(-1);
        info!(
            node = %ctx.node,
            attempt = ctx.attempt,
            exit_code = code,
            success = status.success(),
            "task process exited"
        );

        Ok(if status.success() {
            TaskOutcome::Success
        } else {
            TaskOutcome::Failed(format!("exit code {code}"))
        })
    }
}

impl TaskBody for CommandBody {
    fn run<'a>(
        &'a self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>> {
        Box::pin(async move {
            match self.execute(ctx).await {
                Ok(outcome) => outcome,
                Err(err) => TaskOutcome::Failed(format!("{err:#}")),
            }
        })
    }

    fn describe(&self) -> String {
        match self.cwd {
            Some(ref cwd) => format!("cmd: {} (in {cwd})", self.cmd),
            None => format!("cmd: {}", self.cmd),
        }
    }
}
