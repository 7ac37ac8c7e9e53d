// src/lineage/manifest.rs

//! dbt-style `manifest.json` model and its mapping onto a [`GraphModel`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::dag::graph::{GraphBuilder, GraphModel, Node};
use crate::errors::{DaglineError, Result};
use crate::fs::FileSystem;
use crate::types::{Materialization, NodeKind};

/// The parts of a build manifest the analyzer reads. Unknown fields are
/// ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    /// Keyed by unique id (`model.<package>.<name>`, `seed.<...>`,
    /// `test.<...>`, ...).
    #[serde(default)]
    pub nodes: BTreeMap<String, ManifestNode>,

    /// Keyed by unique id (`source.<package>.<source>.<table>`).
    #[serde(default)]
    pub sources: BTreeMap<String, ManifestSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestNode {
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub config: NodeConfig,
    #[serde(default)]
    pub depends_on: DependsOn,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub materialized: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DependsOn {
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestSource {
    pub name: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
}

impl ManifestNode {
    pub fn is_model(&self) -> bool {
        self.resource_type == "model"
    }

    /// Graph kind for resources that take part in lineage. Tests,
    /// analyses and operations have none.
    pub fn lineage_kind(&self) -> Option<NodeKind> {
        match self.resource_type.as_str() {
            "model" => Some(NodeKind::Model),
            "seed" => Some(NodeKind::Seed),
            "snapshot" => Some(NodeKind::Snapshot),
            _ => None,
        }
    }

    /// `config.materialized`, defaulting to `view`.
    pub fn materialization(&self) -> Materialization {
        match self.config.materialized.as_deref() {
            Some("table") => Materialization::Table,
            Some("ephemeral") => Materialization::Ephemeral,
            Some("incremental") => Materialization::Incremental,
            _ => Materialization::View,
        }
    }
}

impl Manifest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Model entries of `nodes`, in unique-id order.
    pub fn models(&self) -> impl Iterator<Item = (&String, &ManifestNode)> {
        self.nodes.iter().filter(|(_, node)| node.is_model())
    }

    /// Length of the declared `depends_on.nodes` list of `id`, repeats and
    /// untracked references included.
    pub fn declared_dependency_count(&self, id: &str) -> Option<usize> {
        self.nodes.get(id).map(|node| node.depends_on.nodes.len())
    }

    /// Number of `test` resources (data quality tests).
    pub fn test_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|node| node.resource_type == "test")
            .count()
    }

    /// Build the lineage graph: models, seeds, snapshots and sources
    /// become nodes; edges run from each declared dependency to its
    /// dependent. Repeated dependencies collapse into one edge.
    ///
    /// A declared `model.`, `seed.`, `snapshot.` or `source.` dependency
    /// that is not in the manifest is a dangling edge. Other references
    /// (macros, metrics) are ignored.
    pub fn to_graph(&self) -> Result<GraphModel> {
        let lineage_nodes: Vec<(&String, &ManifestNode, NodeKind)> = self
            .nodes
            .iter()
            .filter_map(|(id, node)| node.lineage_kind().map(|kind| (id, node, kind)))
            .collect();

        let known: BTreeSet<&str> = lineage_nodes
            .iter()
            .map(|(id, _, _)| id.as_str())
            .chain(self.sources.keys().map(|id| id.as_str()))
            .collect();

        let mut builder = GraphBuilder::new();
        for (id, source) in self.sources.iter() {
            builder.add_node(Node::source(id.as_str(), source.name.as_str()));
        }

        for (id, node, kind) in lineage_nodes {
            let graph_node = match kind {
                NodeKind::Model => {
                    Node::model(id.as_str(), node.name.as_str(), node.materialization())
                }
                other => Node::artifact(id.as_str(), node.name.as_str(), other),
            };
            builder.add_node(graph_node);

            for dep in node.depends_on.nodes.iter() {
                if known.contains(dep.as_str()) || is_tracked_reference(dep) {
                    builder.add_dependency(id.as_str(), dep.as_str());
                } else {
                    debug!(node = %id, dependency = %dep, "ignoring untracked dependency");
                }
            }
        }

        let graph = builder.build()?;
        info!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            "built lineage graph from manifest"
        );
        Ok(graph)
    }
}

fn is_tracked_reference(dep: &str) -> bool {
    ["model.", "seed.", "snapshot.", "source."]
        .iter()
        .any(|prefix| dep.starts_with(prefix))
}

/// Read and parse a manifest.
pub fn load_manifest(fs: &dyn FileSystem, path: &Path) -> Result<Manifest> {
    let contents = fs.read_to_string(path).map_err(|e| {
        DaglineError::ManifestError(format!("{e:#} (run `dbt compile` to produce it)"))
    })?;
    Manifest::from_json(&contents)
}
