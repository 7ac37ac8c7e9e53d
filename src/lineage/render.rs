// src/lineage/render.rs

//! Plain-text rendering of a [`LineageReport`].

use std::fmt::Write as _;

use crate::lineage::analyzer::{LineageReport, LineageTree};
use crate::types::Layer;

const RULE: &str = "----------------------------------------";

pub fn render_report(report: &LineageReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "DATA SOURCES ({}):", report.sources.len());
    let _ = writeln!(out, "{RULE}");
    for source in &report.sources {
        let _ = writeln!(out, "* {} ({})", source.name, source.source_name);
        let _ = writeln!(
            out,
            "  - Database: {}",
            source.database.as_deref().unwrap_or("N/A")
        );
        let _ = writeln!(
            out,
            "  - Schema: {}",
            source.schema.as_deref().unwrap_or("N/A")
        );
    }

    for layer in [Layer::Bronze, Layer::Silver, Layer::Gold, Layer::None] {
        let count = report.layer_counts.get(&layer).copied().unwrap_or(0);
        if layer == Layer::None && count == 0 {
            continue;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{} LAYER ({count} models):", layer.label().to_uppercase());
        let _ = writeln!(out, "{RULE}");
        for model in report.models_in(layer) {
            let _ = writeln!(out, "* {}", model.name);
            let _ = writeln!(out, "  - Materialization: {}", model.materialization);
            let _ = writeln!(out, "  - Dependencies: {}", model.dependency_count);
            for dep in &model.dependencies {
                let _ = writeln!(out, "    - {dep}");
            }
        }
    }

    if let Some(ref tree) = report.trace {
        let _ = writeln!(out);
        let _ = writeln!(out, "LINEAGE OF {}:", tree.name);
        let _ = writeln!(out, "{RULE}");
        out.push_str(&render_tree(tree));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "SUMMARY:");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Total Models: {}", report.model_count());
    for layer in [Layer::Bronze, Layer::Silver, Layer::Gold] {
        let count = report.layer_counts.get(&layer).copied().unwrap_or(0);
        let _ = writeln!(out, "{} Models: {count}", capitalize(layer.label()));
    }
    let _ = writeln!(out, "Maximum Dependencies: {}", report.max_dependencies);
    let _ = writeln!(out, "Data Quality Tests: {}", report.test_count);
    out
}

/// One line per tree node, indented two spaces per level.
pub fn render_tree(tree: &LineageTree) -> String {
    let mut out = String::new();
    write_tree(&mut out, tree, 0);
    out
}

fn write_tree(out: &mut String, tree: &LineageTree, level: usize) {
    let indent = "  ".repeat(level);
    match tree.materialization {
        Some(mat) => {
            let _ = writeln!(out, "{indent}└─ {} ({mat})", tree.name);
        }
        None => {
            let _ = writeln!(out, "{indent}└─ {}", tree.name);
        }
    }
    for child in &tree.children {
        write_tree(out, child, level + 1);
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
