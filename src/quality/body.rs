// src/quality/body.rs

use std::future::Future;
use std::pin::Pin;

use tracing::{info, warn};

use crate::config::model::CheckConfig;
use crate::engine::TaskOutcome;
use crate::errors::Result;
use crate::exec::body::{TaskBody, TaskContext};
use crate::quality::command_check::CommandCheck;
use crate::quality::{CheckVerdict, ValidationCheck, judge, miss};

/// Task body running a list of validation checks.
///
/// Every check runs. Soft misses are logged; the body fails if any hard
/// check missed its threshold or could not be measured.
pub struct ValidationBody {
    checks: Vec<Box<dyn ValidationCheck>>,
}

impl ValidationBody {
    pub fn new(checks: Vec<Box<dyn ValidationCheck>>) -> Self {
        Self { checks }
    }

    pub fn from_configs(configs: &[CheckConfig], cwd: Option<&str>) -> Result<Self> {
        let mut checks: Vec<Box<dyn ValidationCheck>> = Vec::with_capacity(configs.len());
        for cfg in configs {
            checks.push(Box::new(CommandCheck::from_config(cfg, cwd)?));
        }
        Ok(Self::new(checks))
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check and collect the verdicts in order.
    pub async fn evaluate(&self, ctx: &TaskContext) -> Vec<CheckVerdict> {
        let mut verdicts = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let verdict = match check.measure().await {
                Ok(measurement) => {
                    info!(node = %ctx.node, check = check.name(), %measurement, "check measured");
                    judge(check.name(), check.policy(), &measurement)
                }
                Err(err) => miss(
                    check.policy().severity,
                    format!("{}: could not measure: {err:#}", check.name()),
                ),
            };
            if let CheckVerdict::Warned(ref msg) = verdict {
                warn!(node = %ctx.node, check = check.name(), "{msg}");
            }
            verdicts.push(verdict);
        }
        verdicts
    }
}

impl TaskBody for ValidationBody {
    fn run<'a>(
        &'a self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>> {
        Box::pin(async move {
            let failures: Vec<String> = self
                .evaluate(ctx)
                .await
                .into_iter()
                .filter_map(|v| match v {
                    CheckVerdict::Failed(msg) => Some(msg),
                    _ => None,
                })
                .collect();

            if failures.is_empty() {
                TaskOutcome::Success
            } else {
                TaskOutcome::Failed(failures.join("; "))
            }
        })
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self.checks.iter().map(|c| c.name()).collect();
        format!("checks: {}", names.join(", "))
    }
}
