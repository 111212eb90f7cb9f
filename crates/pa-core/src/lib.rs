//! Process Analytics Core Library
//!
//! This library provides the two analysis engines and their support:
//! - Process graph resolution and reachability
//! - The instance query engine and composite aggregation scroller
//! - Branch divergence analysis
//! - Duration outlier detection (findings, histogram, variable terms)
//! - A reference in-memory instance store and definition service
//! - Structured logging, exit codes and JSON schema export for the CLI
//!
//! The binary entry point is in `main.rs`.

pub mod access;
pub mod branch;
pub mod context;
pub mod definition;
pub mod exit_codes;
pub mod graph;
pub mod logging;
pub mod outlier;
pub mod output;
pub mod query;
pub mod schema;
pub mod scroll;
pub mod store;
pub mod variables;

pub use access::{AccessPolicy, AllowAll, TenantAccessPolicy};
pub use branch::{BranchAnalysisRequest, BranchAnalyzer};
pub use context::{AnalysisServices, RequestContext};
pub use definition::{DefinitionService, DocumentDefinitionService, ProcessGraphResolver};
pub use outlier::{histogram_interval, FlowNodeOutlierRequest, OutlierAnalyzer, OutlierRequest};
pub use query::{InstanceQuery, InstanceQueryEngine};
pub use scroll::CompositePages;
pub use store::{Dataset, InMemoryInstanceStore, InstanceStore};
pub use variables::{StaticVariableNames, VariableNameService};
