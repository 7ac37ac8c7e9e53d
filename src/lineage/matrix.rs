// src/lineage/matrix.rs

use std::fmt::Write as _;

use crate::dag::graph::GraphModel;
use crate::types::{NodeId, NodeKind};

const LABEL_WIDTH: usize = 25;
const CELL_WIDTH: usize = 10;

/// Direct-dependency adjacency between model nodes, for human inspection.
///
/// Rows and columns are the model ids in ascending order; cell `(i, j)` is
/// true iff model `j` directly depends on model `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyMatrix {
    ids: Vec<NodeId>,
    labels: Vec<String>,
    cells: Vec<Vec<bool>>,
}

impl DependencyMatrix {
    /// A dependency of `j` matches row `i` if it equals `i`'s id or ends in
    /// `.<name of i>`, so qualified and bare references both count.
    pub fn build(graph: &GraphModel) -> Self {
        let models: Vec<_> = graph
            .nodes()
            .filter(|n| n.kind == NodeKind::Model)
            .collect();

        let ids: Vec<NodeId> = models.iter().map(|n| n.id.clone()).collect();
        let labels: Vec<String> = models.iter().map(|n| n.name.clone()).collect();

        let cells = models
            .iter()
            .map(|row| {
                let suffix = format!(".{}", row.name);
                models
                    .iter()
                    .map(|col| {
                        graph
                            .predecessors(col.id.as_str())
                            .iter()
                            .any(|dep| *dep == row.id || dep.as_str().ends_with(&suffix))
                    })
                    .collect()
            })
            .collect();

        Self { ids, labels, cells }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn get(&self, row: usize, col: usize) -> Option<bool> {
        self.cells.get(row)?.get(col).copied()
    }

    /// `true` iff `dependent` directly depends on `dependency`.
    pub fn depends_on(&self, dependent: &str, dependency: &str) -> bool {
        let row = self.ids.iter().position(|id| id.as_str() == dependency);
        let col = self.ids.iter().position(|id| id.as_str() == dependent);
        match (row, col) {
            (Some(r), Some(c)) => self.cells[r][c],
            _ => false,
        }
    }

    pub fn true_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| **c).count()
    }

    /// Fixed-width grid; column headers are truncated to 8 characters.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "{:<w$}", "Model", w = LABEL_WIDTH);
        for label in &self.labels {
            let short: String = label.chars().take(8).collect();
            let _ = write!(out, "{:<w$}", short, w = CELL_WIDTH);
        }
        out.push('\n');
        out.push_str(&"-".repeat(LABEL_WIDTH + self.labels.len() * CELL_WIDTH));
        out.push('\n');

        for (label, row) in self.labels.iter().zip(&self.cells) {
            let _ = write!(out, "{:<w$}", label, w = LABEL_WIDTH);
            for cell in row {
                let mark = if *cell { "x" } else { "." };
                let _ = write!(out, "{:<w$}", mark, w = CELL_WIDTH);
            }
            out.push('\n');
        }
        out
    }
}
