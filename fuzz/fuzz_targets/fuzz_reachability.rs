//! Structured fuzz target for reachability and merge point detection.
//!
//! Builds graphs from arbitrary edge lists, including self loops, parallel
//! flows and cycles, and checks traversal terminates with sane answers.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pa_core::graph::{
    is_reachable, merge_points, FlowDescription, GraphDescription, NodeDescription, NodeKind,
    ProcessGraph, VisitedSet,
};

#[derive(Debug, Arbitrary)]
struct Input {
    nodes: u8,
    edges: Vec<(u8, u8)>,
}

fuzz_target!(|input: Input| {
    let n = usize::from(input.nodes % 64) + 1;
    let description = GraphDescription {
        nodes: (0..n)
            .map(|i| NodeDescription {
                id: format!("n{i}"),
                kind: NodeKind::Task,
                name: None,
            })
            .collect(),
        flows: input
            .edges
            .iter()
            .map(|&(a, b)| FlowDescription {
                id: None,
                source: format!("n{}", usize::from(a) % n),
                target: format!("n{}", usize::from(b) % n),
            })
            .collect(),
    };
    let graph = ProcessGraph::from_description(&description).expect("declared endpoints");

    let merges = merge_points(&graph);
    for id in &merges {
        let idx = graph.find(id).expect("merge point is a node");
        assert!(graph.incoming_count(idx) > 1);
    }

    let mut visited = VisitedSet::for_graph(&graph);
    for from in graph.node_indices() {
        for next in graph.successors(from) {
            assert!(is_reachable(&graph, from, next, &mut visited));
        }
    }
});
