// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod lineage;
pub mod logging;
pub mod quality;
pub mod types;

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command, LineageArgs, MatrixArgs, RunArgs};
use crate::config::loader::load_and_validate;
use crate::config::model::PipelineFile;
use crate::dag::Scheduler;
use crate::engine::{
    CommandNotifier, CoreRuntime, LogNotifier, RunReport, Runtime, RuntimeEvent,
};
use crate::exec::{RealExecutorBackend, TaskRegistry};
use crate::fs::{FileSystem, RealFileSystem};
use crate::lineage::{DependencyMatrix, analyze, load_manifest, render_report};
use crate::types::parse_duration;

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Run(run_args) => run_pipeline(run_args).await,
        Command::Lineage(lineage_args) => {
            let text = run_lineage(&RealFileSystem, &lineage_args)?;
            print!("{text}");
            Ok(())
        }
        Command::Matrix(matrix_args) => {
            let text = run_matrix(&RealFileSystem, &matrix_args)?;
            print!("{text}");
            Ok(())
        }
    }
}

/// Load, validate and execute a pipeline file.
///
/// This wires together:
/// - config loading and CLI overrides
/// - scheduler / dispatch queue / runtime
/// - executor and task bodies
/// - notifiers and Ctrl-C handling
///
/// A pipeline that ends in failure is reported as an error so the process
/// exits non-zero.
pub async fn run_pipeline(args: RunArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading pipeline {:?}", args.config))?;

    let max_parallel = args.max_parallel.unwrap_or(cfg.pipeline.max_parallel);
    if max_parallel == 0 {
        bail!("--max-parallel must be >= 1");
    }
    let timeout = match args.timeout {
        Some(ref raw) => Some(parse_duration(raw).map_err(anyhow::Error::msg)?),
        None => cfg.pipeline.timeout_duration()?,
    };

    let scheduler = Scheduler::from_config(&cfg)?;
    let registry = TaskRegistry::from_config(&cfg)?;
    registry.ensure_covers(scheduler.graph())?;

    if args.dry_run {
        print!("{}", dry_run_plan(&cfg, &scheduler, &registry, max_parallel, timeout));
        debug!("dry-run complete (no execution)");
        return Ok(());
    }

    let pipeline = cfg.pipeline.name.clone();
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = RealExecutorBackend::new(Arc::new(registry), pipeline.clone(), rt_tx.clone());

    // Ctrl-C → graceful drain.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            let _ = tx.send(RuntimeEvent::CancelRequested).await;
        });
    }
    drop(rt_tx);

    let core = CoreRuntime::new(scheduler, pipeline, max_parallel);
    let runtime = Runtime::new(core, rt_rx, executor)
        .with_timeout(timeout)
        .with_notifier(LogNotifier)
        .with_notifier(CommandNotifier::new(
            cfg.notify.on_success.clone(),
            cfg.notify.on_failure.clone(),
        ));
    let report = runtime.run().await?;

    print!("{}", report.summary());
    if let Some(ref path) = args.report {
        write_report(&RealFileSystem, path, &report)?;
    }

    if !report.is_success() {
        let failed: Vec<&str> = report.failed_nodes().into_iter().map(|id| id.as_str()).collect();
        bail!(
            "pipeline '{}' failed (failed nodes: {})",
            report.pipeline,
            if failed.is_empty() { "none".to_string() } else { failed.join(", ") }
        );
    }
    Ok(())
}

/// Serialize `report` as JSON to `path`.
pub fn write_report(fs: &dyn FileSystem, path: &Path, report: &RunReport) -> Result<()> {
    let json = report.to_json()?;
    fs.write(path, json.as_bytes())
        .with_context(|| format!("writing run report to {:?}", path))?;
    info!(path = ?path, "wrote run report");
    Ok(())
}

/// Lineage analysis of a manifest, rendered as text. Writes the DOT graph
/// when asked to.
pub fn run_lineage(fs: &dyn FileSystem, args: &LineageArgs) -> Result<String> {
    let manifest = load_manifest(fs, &args.manifest)?;
    let graph = manifest.to_graph()?;
    let report = analyze(&graph, &manifest, args.root.as_deref())?;

    if let Some(ref path) = args.dot {
        fs.write(path, graph.to_dot().as_bytes())
            .with_context(|| format!("writing DOT graph to {:?}", path))?;
    }
    Ok(render_report(&report))
}

/// Dependency matrix of a manifest's models, rendered as a text grid.
pub fn run_matrix(fs: &dyn FileSystem, args: &MatrixArgs) -> Result<String> {
    let manifest = load_manifest(fs, &args.manifest)?;
    let graph = manifest.to_graph()?;
    Ok(DependencyMatrix::build(&graph).render())
}

/// Execution plan: levels in dependency order with each task's policy and
/// body.
pub fn dry_run_plan(
    cfg: &PipelineFile,
    scheduler: &Scheduler,
    registry: &TaskRegistry,
    max_parallel: usize,
    timeout: Option<Duration>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "dagline dry-run: pipeline '{}'", cfg.pipeline.name);
    let _ = writeln!(out, "  max_parallel = {max_parallel}");
    match timeout {
        Some(t) => {
            let _ = writeln!(out, "  timeout = {t:?}");
        }
        None => {
            let _ = writeln!(out, "  timeout = none");
        }
    }
    out.push('\n');

    let graph = scheduler.graph();
    for (level, ids) in graph.topological_levels().iter().enumerate() {
        let _ = writeln!(out, "level {level}:");
        for id in ids {
            let _ = writeln!(out, "  - {id}");
            if let Some(task) = cfg.task.get(id.as_str()) {
                let _ = writeln!(out, "      trigger_rule: {}", task.trigger_rule);
                let retries = task.effective_retries(cfg.pipeline.default_retries);
                if retries > 0 {
                    let _ = writeln!(out, "      retries: {retries}");
                }
                if let Some(ref t) = task.timeout {
                    let _ = writeln!(out, "      timeout: {t}");
                }
            }
            let after = graph.predecessors(id.as_str());
            if !after.is_empty() {
                let names: Vec<&str> = after.iter().map(|a| a.as_str()).collect();
                let _ = writeln!(out, "      after: {}", names.join(", "));
            }
            if let Some(body) = registry.get(id.as_str()) {
                let _ = writeln!(out, "      body: {}", body.describe());
            }
        }
    }
    out
}
