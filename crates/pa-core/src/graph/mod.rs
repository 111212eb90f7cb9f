//! Process graphs: parsing and reachability.

pub mod model;
pub mod reachability;

pub use model::{
    FlowDescription, FlowNode, GraphDescription, NodeDescription, NodeKind, ProcessGraph,
};
pub use petgraph::graph::NodeIndex;
pub use reachability::{incoming_edge_counts, is_reachable, merge_points, VisitedSet};
