// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{PipelineFile, RawPipelineFile, TaskConfig, build_task_graph};
use crate::errors::{DaglineError, Result};
use crate::quality::CheckPolicy;
use crate::types::parse_duration;

impl TryFrom<RawPipelineFile> for PipelineFile {
    type Error = crate::errors::DaglineError;

    fn try_from(raw: RawPipelineFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(PipelineFile::new_unchecked(raw.pipeline, raw.notify, raw.task))
    }
}

/// Validate a raw pipeline definition without converting it.
pub fn validate_config(cfg: &RawPipelineFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawPipelineFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_pipeline_section(cfg)?;
    for (name, task) in cfg.task.iter() {
        validate_task(name, task)?;
    }
    validate_graph(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawPipelineFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(DaglineError::ConfigError(
            "config must contain at least one [task.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_pipeline_section(cfg: &RawPipelineFile) -> Result<()> {
    if cfg.pipeline.max_parallel == 0 {
        return Err(DaglineError::ConfigError(
            "[pipeline].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }

    cfg.pipeline.timeout_duration()?;
    Ok(())
}

fn validate_task(name: &str, task: &TaskConfig) -> Result<()> {
    if task.cmd.is_some() && !task.check.is_empty() {
        return Err(DaglineError::ConfigError(format!(
            "task '{}' has both `cmd` and `check`; a task has exactly one body",
            name
        )));
    }

    if let Some(ref timeout) = task.timeout {
        parse_duration(timeout).map_err(|e| {
            DaglineError::ConfigError(format!("task '{}' has invalid timeout: {}", name, e))
        })?;
    }

    let mut seen = HashSet::new();
    for check in task.check.iter() {
        if !seen.insert(check.name.as_str()) {
            return Err(DaglineError::ConfigError(format!(
                "task '{}' has duplicate check '{}'",
                name, check.name
            )));
        }

        CheckPolicy::from_config(check).map_err(|e| {
            DaglineError::ConfigError(format!("task '{}': {}", name, config_message(e)))
        })?;
    }

    Ok(())
}

/// Unknown `after` references, duplicates and cycles all surface as
/// construction errors from the graph builder.
fn validate_graph(cfg: &RawPipelineFile) -> Result<()> {
    build_task_graph(&cfg.task)?;
    Ok(())
}

fn config_message(err: DaglineError) -> String {
    match err {
        DaglineError::ConfigError(msg) => msg,
        other => other.to_string(),
    }
}
