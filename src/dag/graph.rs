// src/dag/graph.rs

//! Immutable dependency graph shared by the scheduler and the lineage
//! analyzer.
//!
//! Edge direction is dependency -> dependent: for `[task.B] after = ["A"]`
//! (or a model B whose `depends_on` lists A) we store `A -> B`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::debug;

use crate::types::{Layer, Materialization, NodeId, NodeKind};

/// Fatal problems found while building a [`GraphModel`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("cycle detected involving {}", format_path(.path))]
    Cycle { path: Vec<NodeId> },

    #[error("duplicate node id '{0}'")]
    DuplicateNode(NodeId),

    #[error("edge {from} -> {to} references unknown node '{missing}'")]
    DanglingEdge {
        from: NodeId,
        to: NodeId,
        missing: NodeId,
    },
}

fn format_path(path: &[NodeId]) -> String {
    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// One vertex: a pipeline task or a manifest artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    /// Display name. Equal to the id for tasks; the short model name for
    /// manifest nodes.
    pub name: String,
    pub kind: NodeKind,
    pub layer: Layer,
    pub materialization: Option<Materialization>,
}

impl Node {
    pub fn task(id: impl Into<NodeId>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            kind: NodeKind::Task,
            layer: Layer::None,
            materialization: None,
        }
    }

    /// A model node; the layer is derived from `name`.
    pub fn model(
        id: impl Into<NodeId>,
        name: impl Into<String>,
        materialization: Materialization,
    ) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            layer: Layer::from_name(&name),
            name,
            kind: NodeKind::Model,
            materialization: Some(materialization),
        }
    }

    pub fn source(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self::artifact(id, name, NodeKind::Source)
    }

    /// A manifest node that is neither a model nor a task (source, seed,
    /// snapshot). It has no layer or materialization.
    pub fn artifact(id: impl Into<NodeId>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            layer: Layer::None,
            materialization: None,
        }
    }
}

/// Directed dependency: `to` depends on (must follow) `from`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

impl Edge {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Incremental collector of nodes and edges; [`GraphBuilder::build`] performs
/// all validation at once.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// Record that `dependent` must follow `dependency`.
    pub fn add_dependency(&mut self, dependent: impl Into<NodeId>, dependency: impl Into<NodeId>) {
        self.edges.push(Edge {
            from: dependency.into(),
            to: dependent.into(),
        });
    }

    pub fn depends_on(mut self, dependent: &str, dependency: &str) -> Self {
        self.add_dependency(dependent, dependency);
        self
    }

    pub fn build(self) -> Result<GraphModel, ConstructionError> {
        GraphModel::build(self.nodes, self.edges)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Validated, immutable DAG with precomputed adjacency and ordering.
#[derive(Debug, Clone)]
pub struct GraphModel {
    graph: DiGraph<Node, ()>,
    index: HashMap<NodeId, NodeIndex>,
    /// Sorted, de-duplicated direct dependencies per node.
    predecessors: HashMap<NodeId, Vec<NodeId>>,
    /// Sorted, de-duplicated direct dependents per node.
    successors: HashMap<NodeId, Vec<NodeId>>,
    /// Kahn batches; each batch sorted by id.
    levels: Vec<Vec<NodeId>>,
}

impl GraphModel {
    /// Validate and freeze a node/edge set.
    ///
    /// Fails on duplicate ids, edges naming unknown nodes, or any cycle
    /// (self-loops included). Nothing is returned on failure.
    pub fn build(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, ConstructionError> {
        let mut by_id: BTreeMap<NodeId, Node> = BTreeMap::new();
        for node in nodes {
            if by_id.contains_key(&node.id) {
                return Err(ConstructionError::DuplicateNode(node.id));
            }
            by_id.insert(node.id.clone(), node);
        }

        let mut preds: BTreeMap<NodeId, BTreeSet<NodeId>> =
            by_id.keys().map(|id| (id.clone(), BTreeSet::new())).collect();
        let mut succs = preds.clone();

        for edge in &edges {
            for end in [&edge.from, &edge.to] {
                if !by_id.contains_key(end) {
                    return Err(ConstructionError::DanglingEdge {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        missing: end.clone(),
                    });
                }
            }
            succs
                .entry(edge.from.clone())
                .or_default()
                .insert(edge.to.clone());
            preds
                .entry(edge.to.clone())
                .or_default()
                .insert(edge.from.clone());
        }

        detect_cycle(&succs)?;
        let levels = kahn_levels(&preds, &succs);

        let mut graph = DiGraph::with_capacity(by_id.len(), edges.len());
        let mut index = HashMap::with_capacity(by_id.len());
        for (id, node) in by_id {
            let ix = graph.add_node(node);
            index.insert(id, ix);
        }
        for (from, tos) in &succs {
            for to in tos {
                graph.add_edge(index[from], index[to], ());
            }
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            levels = levels.len(),
            "graph built"
        );

        Ok(Self {
            graph,
            index,
            predecessors: preds
                .into_iter()
                .map(|(k, v)| (k, v.into_iter().collect()))
                .collect(),
            successors: succs
                .into_iter()
                .map(|(k, v)| (k, v.into_iter().collect()))
                .collect(),
            levels,
        })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|ix| &self.graph[*ix])
    }

    /// All nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        // Nodes were inserted from a BTreeMap, so index order is id order.
        self.graph.node_indices().map(move |ix| &self.graph[ix])
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes().map(|n| &n.id)
    }

    /// Direct dependencies of `id`, sorted by id.
    pub fn predecessors(&self, id: &str) -> &[NodeId] {
        self.predecessors
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Direct dependents of `id`, sorted by id.
    pub fn successors(&self, id: &str) -> &[NodeId] {
        self.successors
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Nodes without dependencies.
    pub fn roots(&self) -> impl Iterator<Item = &NodeId> {
        self.ids().filter(|id| self.predecessors(id.as_str()).is_empty())
    }

    /// Deterministic topological order (Kahn, ready set sorted by id).
    pub fn topological_order(&self) -> Vec<&Node> {
        self.levels
            .iter()
            .flatten()
            .filter_map(|id| self.node(id.as_str()))
            .collect()
    }

    /// The Kahn batches: every node in batch `n` only depends on nodes in
    /// earlier batches.
    pub fn topological_levels(&self) -> &[Vec<NodeId>] {
        &self.levels
    }

    /// Graphviz rendering, labelled with node names.
    pub fn to_dot(&self) -> String {
        let labelled = self
            .graph
            .map(|_, node| node.name.clone(), |_, _| String::new());
        format!("{}", Dot::with_config(&labelled, &[Config::EdgeNoLabel]))
    }
}

/// Depth-first traversal with a three-colour marker over every node in id
/// order. Reaching an in-progress node means a back edge, i.e. a cycle.
fn detect_cycle(succs: &BTreeMap<NodeId, BTreeSet<NodeId>>) -> Result<(), ConstructionError> {
    let mut marks: HashMap<&NodeId, Mark> = succs.keys().map(|id| (id, Mark::Unvisited)).collect();

    for start in succs.keys() {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        // Explicit stack of (node, remaining children) keeps deep chains off
        // the call stack.
        let mut path: Vec<&NodeId> = vec![start];
        let mut stack: Vec<std::collections::btree_set::Iter<'_, NodeId>> = vec![succs[start].iter()];
        marks.insert(start, Mark::InProgress);

        while let Some(children) = stack.last_mut() {
            match children.next() {
                Some(child) => match marks[child] {
                    Mark::Unvisited => {
                        marks.insert(child, Mark::InProgress);
                        path.push(child);
                        stack.push(succs[child].iter());
                    }
                    Mark::InProgress => {
                        let pos = path.iter().position(|id| *id == child).unwrap_or(0);
                        let mut cycle: Vec<NodeId> =
                            path[pos..].iter().map(|id| (*id).clone()).collect();
                        cycle.push(child.clone());
                        return Err(ConstructionError::Cycle { path: cycle });
                    }
                    Mark::Done => {}
                },
                None => {
                    stack.pop();
                    if let Some(done) = path.pop() {
                        marks.insert(done, Mark::Done);
                    }
                }
            }
        }
    }

    Ok(())
}

fn kahn_levels(
    preds: &BTreeMap<NodeId, BTreeSet<NodeId>>,
    succs: &BTreeMap<NodeId, BTreeSet<NodeId>>,
) -> Vec<Vec<NodeId>> {
    let mut in_degree: BTreeMap<&NodeId, usize> =
        preds.iter().map(|(id, p)| (id, p.len())).collect();

    let mut ready: BTreeSet<&NodeId> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut levels = Vec::new();
    while !ready.is_empty() {
        let batch: Vec<&NodeId> = std::mem::take(&mut ready).into_iter().collect();
        for id in &batch {
            for next in &succs[*id] {
                if let Some(d) = in_degree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(next);
                    }
                }
            }
        }
        levels.push(batch.into_iter().cloned().collect());
    }

    levels
}
