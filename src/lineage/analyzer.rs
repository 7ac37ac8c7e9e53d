// src/lineage/analyzer.rs

use std::collections::BTreeMap;

use serde::Serialize;

use crate::dag::graph::{GraphModel, Node};
use crate::errors::{DaglineError, Result};
use crate::lineage::manifest::Manifest;
use crate::types::{Layer, Materialization, NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub id: NodeId,
    pub name: String,
    pub layer: Layer,
    pub materialization: Materialization,
    /// Length of the declared dependency list, so repeats and references
    /// that are not graph nodes count too.
    pub dependency_count: usize,
    /// Display names of the direct dependencies in the graph.
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub id: String,
    pub name: String,
    pub source_name: String,
    pub database: Option<String>,
    pub schema: Option<String>,
}

/// Recursive dependency tree of one node. Shared ancestors appear once per
/// path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineageTree {
    pub id: NodeId,
    pub name: String,
    pub materialization: Option<Materialization>,
    pub children: Vec<LineageTree>,
}

impl LineageTree {
    /// Edges on the longest root-to-leaf path; 0 for a lone root.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Nodes without children, not counting a lone root.
    pub fn leaf_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| {
                if child.children.is_empty() {
                    1
                } else {
                    child.leaf_count()
                }
            })
            .sum()
    }

    /// All nodes in the tree, root included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(LineageTree::size).sum::<usize>()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LineageReport {
    pub sources: Vec<SourceSummary>,
    /// Model summaries ordered by layer, then name.
    pub models: Vec<ModelSummary>,
    pub layer_counts: BTreeMap<Layer, usize>,
    pub max_dependencies: usize,
    pub test_count: usize,
    pub trace: Option<LineageTree>,
}

impl LineageReport {
    pub fn models_in(&self, layer: Layer) -> impl Iterator<Item = &ModelSummary> {
        self.models.iter().filter(move |m| m.layer == layer)
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}

/// Recursive descent from `root` through predecessors.
///
/// Terminates because the graph was checked for cycles when it was built.
pub fn trace_lineage(graph: &GraphModel, root: &str) -> Result<LineageTree> {
    let node = graph
        .node(root)
        .ok_or_else(|| DaglineError::NodeNotFound(root.to_string()))?;
    Ok(trace_from(graph, node))
}

fn trace_from(graph: &GraphModel, node: &Node) -> LineageTree {
    let children = graph
        .predecessors(node.id.as_str())
        .iter()
        .filter_map(|dep| graph.node(dep.as_str()))
        .map(|dep| trace_from(graph, dep))
        .collect();

    LineageTree {
        id: node.id.clone(),
        name: node.name.clone(),
        materialization: node.materialization,
        children,
    }
}

/// Pick the trace root: an exact id, else a unique node with that display
/// name. Without a query, the first gold model by name (if any).
pub fn resolve_root(graph: &GraphModel, query: Option<&str>) -> Result<Option<NodeId>> {
    let Some(query) = query else {
        let first_gold = graph
            .nodes()
            .filter(|n| n.kind == NodeKind::Model && n.layer == Layer::Gold)
            .min_by(|a, b| a.name.cmp(&b.name))
            .map(|n| n.id.clone());
        return Ok(first_gold);
    };

    if graph.contains(query) {
        return Ok(Some(NodeId::from(query)));
    }

    let matches: Vec<&Node> = graph.nodes().filter(|n| n.name == query).collect();
    match matches.as_slice() {
        [only] => Ok(Some(only.id.clone())),
        [] => Err(DaglineError::NodeNotFound(query.to_string())),
        many => {
            let ids: Vec<&str> = many.iter().map(|n| n.id.as_str()).collect();
            Err(DaglineError::NodeNotFound(format!(
                "'{query}' is ambiguous: {}",
                ids.join(", ")
            )))
        }
    }
}

/// Declared dependency count, or the graph in-degree for nodes the
/// manifest does not list.
fn dependency_count(graph: &GraphModel, manifest: &Manifest, id: &str) -> usize {
    manifest
        .declared_dependency_count(id)
        .unwrap_or_else(|| graph.predecessors(id).len())
}

/// Layer classification, dependency counts, aggregate stats and (when a
/// root resolves) the lineage trace.
pub fn analyze(graph: &GraphModel, manifest: &Manifest, root: Option<&str>) -> Result<LineageReport> {
    let mut models: Vec<ModelSummary> = graph
        .nodes()
        .filter(|n| n.kind == NodeKind::Model)
        .map(|n| {
            let preds = graph.predecessors(n.id.as_str());
            ModelSummary {
                id: n.id.clone(),
                name: n.name.clone(),
                layer: n.layer,
                materialization: n.materialization.unwrap_or_default(),
                dependency_count: dependency_count(graph, manifest, n.id.as_str()),
                dependencies: preds
                    .iter()
                    .filter_map(|p| graph.node(p.as_str()))
                    .map(|p| p.name.clone())
                    .collect(),
            }
        })
        .collect();
    models.sort_by(|a, b| a.layer.cmp(&b.layer).then_with(|| a.name.cmp(&b.name)));

    let mut layer_counts: BTreeMap<Layer, usize> = BTreeMap::new();
    for model in &models {
        *layer_counts.entry(model.layer).or_default() += 1;
    }

    let max_dependencies = graph
        .ids()
        .map(|id| dependency_count(graph, manifest, id.as_str()))
        .max()
        .unwrap_or(0);

    let sources = manifest
        .sources
        .iter()
        .map(|(id, s)| SourceSummary {
            id: id.clone(),
            name: s.name.clone(),
            source_name: s.source_name.clone(),
            database: s.database.clone(),
            schema: s.schema.clone(),
        })
        .collect();

    let trace = match resolve_root(graph, root)? {
        Some(id) => Some(trace_lineage(graph, id.as_str())?),
        None => None,
    };

    Ok(LineageReport {
        sources,
        models,
        layer_counts,
        max_dependencies,
        test_count: manifest.test_count(),
        trace,
    })
}
