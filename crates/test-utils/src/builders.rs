#![allow(dead_code)]

use std::collections::BTreeMap;

use dagline::config::{
    CheckConfig, NotifySection, PipelineFile, PipelineSection, RawPipelineFile, TaskConfig,
};
use dagline::types::{Severity, TriggerRule};

/// Builder for `PipelineFile` to simplify test setup.
pub struct PipelineBuilder {
    config: RawPipelineFile,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: RawPipelineFile {
                pipeline: PipelineSection::default(),
                notify: NotifySection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.pipeline.name = name.to_string();
        self
    }

    pub fn max_parallel(mut self, n: usize) -> Self {
        self.config.pipeline.max_parallel = n;
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.config.pipeline.timeout = Some(duration.to_string());
        self
    }

    pub fn default_retries(mut self, n: u32) -> Self {
        self.config.pipeline.default_retries = n;
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    /// The raw definition, for validation tests.
    pub fn raw(self) -> RawPipelineFile {
        self.config
    }

    pub fn build(self) -> PipelineFile {
        PipelineFile::try_from(self.config).expect("Failed to build valid pipeline from builder")
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`. `new()` gives a marker task with no body.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn cmd(cmd: &str) -> Self {
        Self::new().command(cmd)
    }

    pub fn command(mut self, cmd: &str) -> Self {
        self.task.cmd = Some(cmd.to_string());
        self
    }

    pub fn cwd(mut self, dir: &str) -> Self {
        self.task.cwd = Some(dir.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn rule(mut self, rule: TriggerRule) -> Self {
        self.task.trigger_rule = rule;
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.task.retries = Some(n);
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.task.timeout = Some(duration.to_string());
        self
    }

    pub fn min_count_check(mut self, name: &str, cmd: &str, min: u64, severity: Severity) -> Self {
        self.task.check.push(CheckConfig {
            name: name.to_string(),
            cmd: cmd.to_string(),
            min_count: Some(min),
            min_ratio: None,
            severity,
        });
        self
    }

    pub fn min_ratio_check(mut self, name: &str, cmd: &str, min: f64, severity: Severity) -> Self {
        self.task.check.push(CheckConfig {
            name: name.to_string(),
            cmd: cmd.to_string(),
            min_count: None,
            min_ratio: Some(min),
            severity,
        });
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

impl Default for TaskConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
