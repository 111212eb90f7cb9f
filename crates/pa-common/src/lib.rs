//! Process analytics common types and errors.
//!
//! This crate provides the foundational types shared by the analysis engines:
//! - Process instance records and their flow node executions
//! - Definition scopes and per-definition-type field tables
//! - The instance filter tree and aggregation request/response contract
//! - Result types produced by branch and outlier analysis
//! - The unified error taxonomy and the `Clock` capability

pub mod aggregation;
pub mod clock;
pub mod error;
pub mod filter;
pub mod model;
pub mod results;
pub mod scope;

pub use aggregation::{
    Aggregation, AggregationRequest, AggregationResponse, BucketMetric, CompositeAggregation,
    CompositeBucket, CompositeKey, CompositePage, CompositeSource, FlowNodeSelector,
    HistogramBucket,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{format_error_human, Error, ErrorCategory, Result, StoreError, StructuredError};
pub use filter::{DurationRange, ExternalFilter, InstanceFilter};
pub use model::{FlowNodeExecution, InstanceState, ProcessInstanceRecord, VariableValue};
pub use results::{
    BranchAnalysisResult, BranchOutcome, DurationChartEntry, Finding, FindingsDto, FlowNodeStats,
    OutlierBounds, VariableTermDto,
};
pub use scope::{DefinitionFields, DefinitionScope, DefinitionType, VersionSelector};

/// Schema version stamped on serialized analysis results.
pub const SCHEMA_VERSION: &str = "1.0.0";
