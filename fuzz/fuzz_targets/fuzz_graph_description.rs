//! Fuzz target for process graph description parsing.
//!
//! Malformed descriptions must come back as `InvalidGraph`, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pa_core::graph::{is_reachable, ProcessGraph, VisitedSet};

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(graph) = ProcessGraph::from_json(json) else {
        return;
    };
    // A parsed graph must support traversal between any two of its nodes.
    let mut visited = VisitedSet::for_graph(&graph);
    let nodes: Vec<_> = graph.node_indices().take(8).collect();
    for &from in &nodes {
        for &to in &nodes {
            let _ = is_reachable(&graph, from, to, &mut visited);
        }
    }
});
