// src/exec/registry.rs

//! Node id → task body lookup, checked against the graph before a run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::model::PipelineFile;
use crate::dag::GraphModel;
use crate::errors::{DaglineError, Result};
use crate::exec::body::{NoopBody, TaskBody};
use crate::exec::command::CommandBody;
use crate::quality::ValidationBody;
use crate::types::NodeId;

#[derive(Default, Clone)]
pub struct TaskRegistry {
    bodies: BTreeMap<NodeId, Arc<dyn TaskBody>>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("nodes", &self.bodies.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One body per `[task.<id>]`: `cmd` → [`CommandBody`], `check` entries
    /// → [`ValidationBody`], neither → [`NoopBody`].
    pub fn from_config(cfg: &PipelineFile) -> Result<Self> {
        let mut registry = Self::new();
        for (name, task) in cfg.task.iter() {
            let body: Arc<dyn TaskBody> = if let Some(ref cmd) = task.cmd {
                Arc::new(CommandBody::new(cmd.clone(), task.cwd.clone()))
            } else if !task.check.is_empty() {
                Arc::new(ValidationBody::from_configs(&task.check, task.cwd.as_deref())?)
            } else {
                Arc::new(NoopBody)
            };
            registry.bodies.insert(NodeId::from(name.as_str()), body);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, node: impl Into<NodeId>, body: impl TaskBody + 'static) {
        self.bodies.insert(node.into(), Arc::new(body));
    }

    pub fn get(&self, node: &str) -> Option<Arc<dyn TaskBody>> {
        self.bodies.get(node).cloned()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Every node of `graph` must have a body.
    pub fn ensure_covers(&self, graph: &GraphModel) -> Result<()> {
        let missing: Vec<&str> = graph
            .ids()
            .filter(|id| !self.bodies.contains_key(*id))
            .map(|id| id.as_str())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DaglineError::ConfigError(format!(
                "no task body registered for node(s): {}",
                missing.join(", ")
            )))
        }
    }
}
