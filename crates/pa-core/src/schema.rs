//! JSON Schema generation for request and result types.
//!
//! ```bash
//! # List available schema types
//! pa-core schema --list
//!
//! # Generate schema for a specific type
//! pa-core schema FindingsDto
//!
//! # Generate all schemas
//! pa-core schema --all
//! ```

use schemars::schema_for;
use serde_json::Value;
use std::collections::BTreeMap;

pub use crate::branch::BranchAnalysisRequest;
pub use crate::definition::DefinitionRecord;
pub use crate::graph::GraphDescription;
pub use crate::store::Dataset;
pub use crate::outlier::{FlowNodeOutlierRequest, OutlierRequest};
pub use pa_common::{
    BranchAnalysisResult, BranchOutcome, DefinitionScope, DurationChartEntry, ExternalFilter,
    Finding, FindingsDto, FlowNodeStats, OutlierBounds, ProcessInstanceRecord, VariableTermDto,
};
pub use pa_config::AnalysisConfig;

/// Available schema types with their descriptions.
pub fn available_schemas() -> Vec<(&'static str, &'static str)> {
    vec![
        // Results
        ("BranchAnalysisResult", "Branch divergence of one gateway"),
        ("BranchOutcome", "Counts for one outgoing branch"),
        ("FindingsDto", "Outlier findings of one flow node"),
        ("Finding", "Lower or higher outlier finding"),
        ("FlowNodeStats", "Duration statistics of a flow node"),
        ("OutlierBounds", "Outlier duration thresholds"),
        ("DurationChartEntry", "Duration histogram bucket"),
        (
            "VariableTermDto",
            "Variable term over-represented among outliers",
        ),
        // Requests
        ("BranchAnalysisRequest", "Input of a branch analysis"),
        ("OutlierRequest", "Input of the flow node outlier map"),
        (
            "FlowNodeOutlierRequest",
            "Input of the duration chart and variable terms",
        ),
        ("DefinitionScope", "Definition key, versions and tenants"),
        ("ExternalFilter", "Instance filter passed through to the store"),
        // Inputs
        ("GraphDescription", "Process graph definition payload"),
        ("DefinitionRecord", "Deployed definition in a dataset"),
        ("ProcessInstanceRecord", "Recorded process instance"),
        ("Dataset", "Definitions plus instances loaded by the CLI"),
        ("AnalysisConfig", "Analysis configuration file"),
    ]
}

/// Generate JSON Schema for a type by name.
///
/// Returns `None` if the type is unknown.
pub fn generate_schema(type_name: &str) -> Option<Value> {
    let schema = match type_name {
        "BranchAnalysisResult" => schema_for!(BranchAnalysisResult),
        "BranchOutcome" => schema_for!(BranchOutcome),
        "FindingsDto" => schema_for!(FindingsDto),
        "Finding" => schema_for!(Finding),
        "FlowNodeStats" => schema_for!(FlowNodeStats),
        "OutlierBounds" => schema_for!(OutlierBounds),
        "DurationChartEntry" => schema_for!(DurationChartEntry),
        "VariableTermDto" => schema_for!(VariableTermDto),
        "BranchAnalysisRequest" => schema_for!(BranchAnalysisRequest),
        "OutlierRequest" => schema_for!(OutlierRequest),
        "FlowNodeOutlierRequest" => schema_for!(FlowNodeOutlierRequest),
        "DefinitionScope" => schema_for!(DefinitionScope),
        "ExternalFilter" => schema_for!(ExternalFilter),
        "GraphDescription" => schema_for!(GraphDescription),
        "DefinitionRecord" => schema_for!(DefinitionRecord),
        "ProcessInstanceRecord" => schema_for!(ProcessInstanceRecord),
        "Dataset" => schema_for!(Dataset),
        "AnalysisConfig" => schema_for!(AnalysisConfig),
        _ => return None,
    };
    serde_json::to_value(schema).ok()
}

/// Generate all schemas as a map from type name to schema.
pub fn generate_all_schemas() -> BTreeMap<String, Value> {
    available_schemas()
        .into_iter()
        .filter_map(|(name, _)| generate_schema(name).map(|s| (name.to_string(), s)))
        .collect()
}
