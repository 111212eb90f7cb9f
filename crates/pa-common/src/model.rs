//! Process instance records as held by an instance store.
//!
//! Records are read-only to the analysis engines. The builder methods exist
//! for fixtures and dataset tooling.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state of a process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Running,
    Completed,
    Canceled,
}

/// A process variable value.
///
/// Term analysis compares values by their term string (`to_term`), so
/// `1` and `"1"` fall into the same bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum VariableValue {
    Boolean(bool),
    Long(i64),
    Double(f64),
    String(String),
}

impl VariableValue {
    /// The keyword form of the value used for term grouping.
    pub fn to_term(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Boolean(v) => write!(f, "{v}"),
            VariableValue::Long(v) => write!(f, "{v}"),
            VariableValue::Double(v) => write!(f, "{v}"),
            VariableValue::String(v) => f.write_str(v),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::String(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        VariableValue::String(value)
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        VariableValue::Long(value)
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        VariableValue::Boolean(value)
    }
}

/// One execution of a flow node inside an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowNodeExecution {
    pub activity_id: String,
    /// `None` while the flow node is still active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_millis: Option<u64>,
}

/// One recorded execution of a process definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessInstanceRecord {
    pub id: String,
    pub definition_key: String,
    pub definition_version: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub state: InstanceState,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub flow_nodes: Vec<FlowNodeExecution>,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableValue>,
}

impl ProcessInstanceRecord {
    /// A completed instance of version `1`, started at the Unix epoch.
    pub fn new(id: impl Into<String>, definition_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            definition_key: definition_key.into(),
            definition_version: "1".to_string(),
            tenant_id: None,
            state: InstanceState::Completed,
            start_date: DateTime::<Utc>::UNIX_EPOCH,
            end_date: None,
            flow_nodes: Vec::new(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.definition_version = version.into();
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_state(mut self, state: InstanceState) -> Self {
        self.state = state;
        self
    }

    pub fn started_at(mut self, start: DateTime<Utc>) -> Self {
        self.start_date = start;
        self
    }

    pub fn ended_at(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }

    /// Record a finished execution of `activity_id`.
    pub fn with_flow_node(mut self, activity_id: impl Into<String>, duration_millis: u64) -> Self {
        self.flow_nodes.push(FlowNodeExecution {
            activity_id: activity_id.into(),
            duration_millis: Some(duration_millis),
        });
        self
    }

    /// Record a sequence of finished executions with zero duration.
    pub fn with_trace<I, S>(mut self, activity_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in activity_ids {
            self = self.with_flow_node(id, 0);
        }
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<VariableValue>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Whether any execution of `activity_id` exists, at any position.
    pub fn executed(&self, activity_id: &str) -> bool {
        self.flow_nodes.iter().any(|n| n.activity_id == activity_id)
    }

    /// Finished durations recorded for `activity_id`.
    pub fn durations_of<'a>(&'a self, activity_id: &'a str) -> impl Iterator<Item = u64> + 'a {
        self.flow_nodes
            .iter()
            .filter(move |n| n.activity_id == activity_id)
            .filter_map(|n| n.duration_millis)
    }
}
