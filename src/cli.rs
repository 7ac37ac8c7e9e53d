// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `dagline`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dagline",
    version,
    about = "Run task pipelines with trigger rules and analyze build manifest lineage.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGLINE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Execute a pipeline definition.
    Run(RunArgs),
    /// Analyze layers, dependency counts and lineage of a manifest.
    Lineage(LineageArgs),
    /// Print the model dependency matrix of a manifest.
    Matrix(MatrixArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Path to the pipeline file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Pipeline.toml")]
    pub config: PathBuf,

    /// Parse + validate, print the execution plan, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Override `[pipeline].max_parallel`.
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Override `[pipeline].timeout` (e.g. "90s", "2h").
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Write the run report as JSON to this path.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct LineageArgs {
    #[arg(long, value_name = "PATH", default_value = "target/manifest.json")]
    pub manifest: PathBuf,

    /// Node to trace, by unique id or name. Defaults to the first gold model.
    #[arg(long, value_name = "NODE")]
    pub root: Option<String>,

    /// Also write the lineage graph in Graphviz DOT format.
    #[arg(long, value_name = "PATH")]
    pub dot: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct MatrixArgs {
    #[arg(long, value_name = "PATH", default_value = "target/manifest.json")]
    pub manifest: PathBuf,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
