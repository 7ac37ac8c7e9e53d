#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

pub use dagline_test_utils::builders;
pub use dagline_test_utils::{init_tracing, with_timeout};

use dagline::config::PipelineFile;
use dagline::dag::{ScheduledTask, Scheduler};
use dagline::engine::TaskOutcome;
use dagline::types::TriggerRule;

use self::builders::{PipelineBuilder, TaskConfigBuilder};

/// The five-stage bronze/silver/gold pipeline:
///
/// ```text
/// start -> validate -> run -> test -> {docs, output}, docs -> output
/// output -> notify_success -> end
/// {run, test, output} -> notify_failure -> end
/// ```
pub fn medallion_pipeline() -> PipelineFile {
    PipelineBuilder::new()
        .name("scv_dbt_pipeline")
        .with_task("start", TaskConfigBuilder::new().build())
        .with_task("validate", TaskConfigBuilder::cmd("true").after("start").build())
        .with_task("run", TaskConfigBuilder::cmd("true").after("validate").build())
        .with_task("test", TaskConfigBuilder::cmd("true").after("run").build())
        .with_task("docs", TaskConfigBuilder::cmd("true").after("test").build())
        .with_task(
            "output",
            TaskConfigBuilder::cmd("true").after("test").after("docs").build(),
        )
        .with_task(
            "notify_success",
            TaskConfigBuilder::new().after("output").build(),
        )
        .with_task(
            "notify_failure",
            TaskConfigBuilder::new()
                .after("run")
                .after("test")
                .after("output")
                .rule(TriggerRule::OneFailed)
                .build(),
        )
        .with_task(
            "end",
            TaskConfigBuilder::new()
                .after("notify_success")
                .after("notify_failure")
                .rule(TriggerRule::NoneFailed)
                .build(),
        )
        .build()
}

/// Drive a scheduler synchronously to the end of its run, completing
/// scheduled attempts in FIFO order. Nodes in `failing` fail every attempt.
///
/// Returns the `(node, attempt)` pairs in execution order.
pub fn drive(scheduler: &mut Scheduler, failing: &[&str]) -> Vec<(String, u32)> {
    let failing: HashSet<&str> = failing.iter().copied().collect();
    let mut queue: VecDeque<ScheduledTask> = scheduler.start().newly_scheduled.into();
    let mut executed = Vec::new();

    while let Some(task) = queue.pop_front() {
        executed.push((task.node.to_string(), task.attempt));
        let outcome = if failing.contains(task.node.as_str()) {
            TaskOutcome::failed("boom")
        } else {
            TaskOutcome::Success
        };
        let step = scheduler.step_completion(task.node.as_str(), outcome, Duration::from_millis(1));
        queue.extend(step.newly_scheduled);
    }

    executed
}

/// Like [`drive`], but with a scripted outcome per attempt.
pub fn drive_scripted(
    scheduler: &mut Scheduler,
    mut script: HashMap<&str, VecDeque<TaskOutcome>>,
) -> Vec<(String, u32)> {
    let mut queue: VecDeque<ScheduledTask> = scheduler.start().newly_scheduled.into();
    let mut executed = Vec::new();

    while let Some(task) = queue.pop_front() {
        executed.push((task.node.to_string(), task.attempt));
        let outcome = script
            .get_mut(task.node.as_str())
            .and_then(|q| q.pop_front())
            .unwrap_or(TaskOutcome::Success);
        let step = scheduler.step_completion(task.node.as_str(), outcome, Duration::ZERO);
        queue.extend(step.newly_scheduled);
    }

    executed
}

pub fn names(executed: &[(String, u32)]) -> Vec<&str> {
    executed.iter().map(|(n, _)| n.as_str()).collect()
}

/// A small bronze/silver/gold manifest: two sources, four models, two
/// tests, one seed and a macro dependency that lineage ignores.
pub const SCV_MANIFEST: &str = r#"{
  "metadata": { "dbt_version": "1.7.0" },
  "nodes": {
    "model.scv.bronze_customers": {
      "resource_type": "model",
      "name": "bronze_customers",
      "config": { "materialized": "view" },
      "depends_on": { "nodes": ["source.scv.raw.customers"] }
    },
    "model.scv.bronze_orders": {
      "resource_type": "model",
      "name": "bronze_orders",
      "config": { "materialized": "view" },
      "depends_on": { "nodes": ["source.scv.raw.orders"] }
    },
    "model.scv.silver_customers": {
      "resource_type": "model",
      "name": "silver_customers",
      "config": { "materialized": "table" },
      "depends_on": {
        "macros": ["macro.dbt.current_timestamp"],
        "nodes": ["model.scv.bronze_customers"]
      }
    },
    "model.scv.gold_customer_360": {
      "resource_type": "model",
      "name": "gold_customer_360",
      "config": { "materialized": "table" },
      "depends_on": {
        "nodes": ["model.scv.silver_customers", "model.scv.bronze_orders"]
      }
    },
    "test.scv.not_null_silver_customers_id": {
      "resource_type": "test",
      "name": "not_null_silver_customers_id",
      "depends_on": { "nodes": ["model.scv.silver_customers"] }
    },
    "test.scv.unique_silver_customers_id": {
      "resource_type": "test",
      "name": "unique_silver_customers_id",
      "depends_on": { "nodes": ["model.scv.silver_customers"] }
    },
    "seed.scv.country_codes": {
      "resource_type": "seed",
      "name": "country_codes"
    }
  },
  "sources": {
    "source.scv.raw.customers": {
      "name": "customers",
      "source_name": "raw",
      "database": "warehouse",
      "schema": "raw"
    },
    "source.scv.raw.orders": {
      "name": "orders",
      "source_name": "raw"
    }
  }
}"#;
