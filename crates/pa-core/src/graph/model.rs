//! Process graph arena and its JSON description.

use pa_common::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of a flow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Gateway,
    Task,
    Event,
}

/// Serialized node of a graph description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeDescription {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Serialized sequence flow of a graph description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FlowDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
}

/// The definition payload a definition service hands out.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct GraphDescription {
    pub nodes: Vec<NodeDescription>,
    #[serde(default)]
    pub flows: Vec<FlowDescription>,
}

#[derive(Debug, Clone)]
pub struct FlowNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: Option<String>,
}

/// Immutable process graph: a petgraph arena plus an id index.
///
/// One edge is kept per sequence flow, so parallel flows between the same
/// pair of nodes count separately.
#[derive(Debug, Clone)]
pub struct ProcessGraph {
    graph: DiGraph<FlowNode, ()>,
    index: HashMap<String, NodeIndex>,
}

impl ProcessGraph {
    /// Build a graph from its description.
    ///
    /// Rejects empty ids, duplicate node ids and flows whose endpoints are
    /// not declared nodes.
    pub fn from_description(description: &GraphDescription) -> Result<Self> {
        let mut graph =
            DiGraph::with_capacity(description.nodes.len(), description.flows.len());
        let mut index = HashMap::with_capacity(description.nodes.len());

        for node in &description.nodes {
            if node.id.trim().is_empty() {
                return Err(Error::InvalidGraph("node with empty id".to_string()));
            }
            if index.contains_key(&node.id) {
                return Err(Error::InvalidGraph(format!("duplicate node id '{}'", node.id)));
            }
            let idx = graph.add_node(FlowNode {
                id: node.id.clone(),
                kind: node.kind,
                name: node.name.clone(),
            });
            index.insert(node.id.clone(), idx);
        }

        for flow in &description.flows {
            let lookup = |id: &str| {
                index.get(id).copied().ok_or_else(|| {
                    Error::InvalidGraph(format!(
                        "flow {} references unknown node '{}'",
                        flow.id.as_deref().unwrap_or("<unnamed>"),
                        id
                    ))
                })
            };
            let source = lookup(&flow.source)?;
            let target = lookup(&flow.target)?;
            graph.add_edge(source, target, ());
        }

        Ok(Self { graph, index })
    }

    /// Parse a JSON graph description.
    pub fn from_json(json: &str) -> Result<Self> {
        let description: GraphDescription = serde_json::from_str(json)
            .map_err(|e| Error::InvalidGraph(format!("malformed description: {e}")))?;
        Self::from_description(&description)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node(&self, idx: NodeIndex) -> &FlowNode {
        &self.graph[idx]
    }

    pub fn find(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Like [`find`](Self::find) but reports a missing id as
    /// `Error::UnknownFlowNode`.
    pub fn require(&self, id: &str) -> Result<NodeIndex> {
        self.find(id).ok_or_else(|| Error::UnknownFlowNode {
            node_id: id.to_string(),
        })
    }

    /// Targets of the outgoing flows of `idx`, in declaration order.
    pub fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut flows: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        flows.sort_unstable_by_key(|&(id, _)| id);
        flows.into_iter().map(|(_, target)| target).collect()
    }

    /// Number of incoming sequence flows, parallel flows included.
    pub fn incoming_count(&self, idx: NodeIndex) -> usize {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .count()
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }

    /// The underlying petgraph arena.
    pub fn digraph(&self) -> &DiGraph<FlowNode, ()> {
        &self.graph
    }
}
