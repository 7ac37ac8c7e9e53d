// src/lineage/mod.rs

//! Offline lineage analysis over a build manifest.
//!
//! Nothing here executes anything: a [`Manifest`] is mapped onto a
//! [`crate::dag::GraphModel`], which the analyzer and the dependency matrix
//! read.

pub mod analyzer;
pub mod manifest;
pub mod matrix;
pub mod render;

pub use analyzer::{
    LineageReport, LineageTree, ModelSummary, SourceSummary, analyze, resolve_root, trace_lineage,
};
pub use manifest::{Manifest, load_manifest};
pub use matrix::DependencyMatrix;
pub use render::{render_report, render_tree};
