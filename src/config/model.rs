// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::graph::{GraphBuilder, GraphModel, Node};
use crate::errors::{DaglineError, Result};
use crate::types::{Severity, TriggerRule, parse_duration};

/// Pipeline definition as read from a TOML file, before validation.
///
/// ```toml
/// [pipeline]
/// name = "scv_dbt_pipeline"
/// max_parallel = 4
/// timeout = "2h"
/// default_retries = 2
///
/// [task.run_dbt_models]
/// cmd = "dbt run"
/// after = ["load_seed_data"]
///
/// [task.notify_failure]
/// after = ["run_dbt_models"]
/// trigger_rule = "one_failed"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPipelineFile {
    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub notify: NotifySection,

    /// All tasks from `[task.<id>]`, keyed by task id.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated pipeline definition. Only obtainable through
/// `PipelineFile::try_from(RawPipelineFile)` (see `config::validate`).
#[derive(Debug, Clone)]
pub struct PipelineFile {
    pub pipeline: PipelineSection,
    pub notify: NotifySection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl PipelineFile {
    pub(crate) fn new_unchecked(
        pipeline: PipelineSection,
        notify: NotifySection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            pipeline,
            notify,
            task,
        }
    }

    /// Build a fresh task graph from the `after` declarations.
    pub fn build_graph(&self) -> Result<GraphModel> {
        build_task_graph(&self.task)
    }
}

pub(crate) fn build_task_graph(tasks: &BTreeMap<String, TaskConfig>) -> Result<GraphModel> {
    let mut builder = GraphBuilder::new();
    for (name, task) in tasks.iter() {
        builder.add_node(Node::task(name.as_str()));
        for dep in task.after.iter() {
            builder.add_dependency(name.as_str(), dep.as_str());
        }
    }
    Ok(builder.build()?)
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_name")]
    pub name: String,

    /// Maximum number of task bodies running at once.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Wall-clock budget for the whole run (e.g. `"2h"`).
    #[serde(default)]
    pub timeout: Option<String>,

    /// Retry budget for tasks that don't set `retries`.
    #[serde(default)]
    pub default_retries: u32,
}

fn default_name() -> String {
    "pipeline".to_string()
}

fn default_max_parallel() -> usize {
    4
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_parallel: default_max_parallel(),
            timeout: None,
            default_retries: 0,
        }
    }
}

impl PipelineSection {
    pub fn timeout_duration(&self) -> Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(DaglineError::ConfigError)
    }
}

/// `[notify]` section: optional shell commands run once the pipeline ends.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotifySection {
    #[serde(default)]
    pub on_success: Option<String>,

    #[serde(default)]
    pub on_failure: Option<String>,
}

/// `[task.<id>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    /// Shell command forming the task body. A task with neither `cmd` nor
    /// `check` is a marker task that always succeeds.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Working directory for `cmd` and check commands.
    #[serde(default)]
    pub cwd: Option<String>,

    /// Direct predecessors: this task is evaluated once all of them are
    /// terminal.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub trigger_rule: TriggerRule,

    /// Per-task retry budget; falls back to `pipeline.default_retries`.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Per-attempt execution timeout (e.g. `"30m"`).
    #[serde(default)]
    pub timeout: Option<String>,

    /// Validation checks forming the task body (`[[task.<id>.check]]`).
    #[serde(default)]
    pub check: Vec<CheckConfig>,
}

impl TaskConfig {
    pub fn effective_retries(&self, default_retries: u32) -> u32 {
        self.retries.unwrap_or(default_retries)
    }
}

/// `[[task.<id>.check]]` entry.
///
/// The command prints `<observed> [<total>]` on its first stdout line.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    pub name: String,

    pub cmd: String,

    /// Pass when `observed >= min_count`.
    #[serde(default)]
    pub min_count: Option<u64>,

    /// Pass when `observed / total >= min_ratio`.
    #[serde(default)]
    pub min_ratio: Option<f64>,

    #[serde(default)]
    pub severity: Severity,
}
