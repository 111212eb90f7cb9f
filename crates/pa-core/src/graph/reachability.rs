//! Reachability over a [`ProcessGraph`].
//!
//! Traversal state lives in a caller-owned [`VisitedSet`]; the graph itself
//! is never mutated, so one graph can serve any number of queries.

use std::collections::HashSet;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Visitable};
use petgraph::Direction;

use super::model::{FlowNode, ProcessGraph};

type DiscoveredMap = <DiGraph<FlowNode, ()> as Visitable>::Map;

/// Reusable DFS state (stack and discovered map) for one graph.
#[derive(Debug, Clone)]
pub struct VisitedSet {
    dfs: Dfs<NodeIndex, DiscoveredMap>,
}

impl VisitedSet {
    pub fn for_graph(graph: &ProcessGraph) -> Self {
        Self {
            dfs: Dfs::empty(graph.digraph()),
        }
    }
}

/// Whether a path of at least one edge leads from `from` to `to`.
///
/// A node reaches itself only through a cycle, so the walk starts at the
/// successors of `from` rather than at `from`. `visited` is reset on entry.
pub fn is_reachable(
    graph: &ProcessGraph,
    from: NodeIndex,
    to: NodeIndex,
    visited: &mut VisitedSet,
) -> bool {
    let g = graph.digraph();
    let dfs = &mut visited.dfs;
    dfs.reset(g);
    dfs.stack
        .extend(g.neighbors_directed(from, Direction::Outgoing));

    while let Some(node) = dfs.next(g) {
        if node == to {
            return true;
        }
    }
    false
}

/// Incoming sequence flow count per node, indexed by `NodeIndex::index`.
pub fn incoming_edge_counts(graph: &ProcessGraph) -> Vec<usize> {
    graph
        .node_indices()
        .map(|idx| graph.incoming_count(idx))
        .collect()
}

/// Ids of nodes with more than one incoming flow.
pub fn merge_points(graph: &ProcessGraph) -> HashSet<&str> {
    graph
        .node_indices()
        .filter(|&idx| graph.incoming_count(idx) > 1)
        .map(|idx| graph.node(idx).id.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{FlowDescription, GraphDescription, NodeDescription, NodeKind};

    fn graph(nodes: &[&str], flows: &[(&str, &str)]) -> ProcessGraph {
        let description = GraphDescription {
            nodes: nodes
                .iter()
                .map(|id| NodeDescription {
                    id: id.to_string(),
                    kind: NodeKind::Task,
                    name: None,
                })
                .collect(),
            flows: flows
                .iter()
                .map(|(s, t)| FlowDescription {
                    id: None,
                    source: s.to_string(),
                    target: t.to_string(),
                })
                .collect(),
        };
        ProcessGraph::from_description(&description).unwrap()
    }

    fn reachable(g: &ProcessGraph, from: &str, to: &str) -> bool {
        let mut visited = VisitedSet::for_graph(g);
        is_reachable(g, g.find(from).unwrap(), g.find(to).unwrap(), &mut visited)
    }

    #[test]
    fn linear_chain() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        assert!(reachable(&g, "a", "c"));
        assert!(!reachable(&g, "c", "a"));
    }

    #[test]
    fn node_does_not_reach_itself_without_cycle() {
        let g = graph(&["a", "b"], &[("a", "b")]);
        assert!(!reachable(&g, "a", "a"));
    }

    #[test]
    fn cycles_terminate() {
        let g = graph(
            &["a", "b", "c", "d", "island"],
            &[("a", "b"), ("b", "c"), ("c", "a"), ("c", "d")],
        );
        assert!(reachable(&g, "b", "d"));
        assert!(reachable(&g, "a", "a"));
        assert!(!reachable(&g, "a", "island"));
    }

    #[test]
    fn visited_set_is_reusable() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        let mut visited = VisitedSet::for_graph(&g);
        let (a, c) = (g.find("a").unwrap(), g.find("c").unwrap());
        assert!(is_reachable(&g, a, c, &mut visited));
        assert!(!is_reachable(&g, c, a, &mut visited));
        assert!(is_reachable(&g, a, c, &mut visited));
    }

    #[test]
    fn self_loop_reaches_itself() {
        let g = graph(&["a", "b"], &[("a", "a"), ("a", "b")]);
        assert!(reachable(&g, "a", "a"));
        assert!(!reachable(&g, "b", "b"));
    }

    #[test]
    fn merge_points_have_multiple_incoming_flows() {
        let g = graph(
            &["gw", "a", "b", "join", "end"],
            &[
                ("gw", "a"),
                ("gw", "b"),
                ("a", "join"),
                ("b", "join"),
                ("join", "end"),
            ],
        );
        let counts = incoming_edge_counts(&g);
        assert_eq!(counts[g.find("join").unwrap().index()], 2);
        assert_eq!(counts[g.find("gw").unwrap().index()], 0);

        let merges = merge_points(&g);
        assert_eq!(merges.len(), 1);
        assert!(merges.contains("join"));
    }
}
