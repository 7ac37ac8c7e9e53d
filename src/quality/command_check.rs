// src/quality/command_check.rs

use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, anyhow};

use crate::config::model::CheckConfig;
use crate::errors::Result;
use crate::exec::command::capture_stdout;
use crate::quality::{CheckPolicy, Measurement, ValidationCheck};

/// A check whose measurement is printed by a shell command as
/// `<observed> [<total>]` on the first line of stdout.
#[derive(Debug, Clone)]
pub struct CommandCheck {
    name: String,
    cmd: String,
    cwd: Option<String>,
    policy: CheckPolicy,
}

impl CommandCheck {
    pub fn new(
        name: impl Into<String>,
        cmd: impl Into<String>,
        cwd: Option<String>,
        policy: CheckPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            cwd,
            policy,
        }
    }

    pub fn from_config(cfg: &CheckConfig, cwd: Option<&str>) -> Result<Self> {
        Ok(Self::new(
            cfg.name.clone(),
            cfg.cmd.clone(),
            cwd.map(str::to_string),
            CheckPolicy::from_config(cfg)?,
        ))
    }
}

impl ValidationCheck for CommandCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> &CheckPolicy {
        &self.policy
    }

    fn measure<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Measurement>> + Send + 'a>> {
        Box::pin(async move {
            let stdout = capture_stdout(&self.cmd, self.cwd.as_deref())
                .await
                .with_context(|| format!("running check '{}'", self.name))?;
            parse_measurement(&stdout)
                .map_err(|e| anyhow!("check '{}': {e}", self.name))
        })
    }
}

/// Parse `<observed> [<total>]` from the first non-empty line.
pub fn parse_measurement(output: &str) -> std::result::Result<Measurement, String> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| "check printed nothing".to_string())?;

    let mut fields = line.split_whitespace();
    let observed = parse_count(fields.next(), line)?;
    let total = match fields.next() {
        Some(raw) => Some(parse_count(Some(raw), line)?),
        None => None,
    };
    if fields.next().is_some() {
        return Err(format!("expected '<observed> [<total>]', got '{line}'"));
    }

    Ok(Measurement { observed, total })
}

fn parse_count(raw: Option<&str>, line: &str) -> std::result::Result<u64, String> {
    raw.ok_or_else(|| format!("expected a count, got '{line}'"))?
        .parse::<u64>()
        .map_err(|e| format!("invalid count in '{line}': {e}"))
}
