//! Instance filter tree.
//!
//! Filters select process instances. The engines build the structural parts
//! (scope, flow node containment, duration ranges) and pass
//! [`ExternalFilter`] fragments through untouched; only instance stores
//! interpret them.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::InstanceState;
use crate::scope::DefinitionScope;

/// Open interval on flow node durations (milliseconds).
///
/// Both ends are exclusive; an absent end is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct DurationRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
}

impl DurationRange {
    pub fn above(bound: f64) -> Self {
        Self {
            gt: Some(bound),
            lt: None,
        }
    }

    pub fn below(bound: f64) -> Self {
        Self {
            gt: None,
            lt: Some(bound),
        }
    }

    pub fn contains(&self, duration: f64) -> bool {
        self.gt.map_or(true, |gt| duration > gt) && self.lt.map_or(true, |lt| duration < lt)
    }
}

/// Caller-supplied filter fragments, opaque to the engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExternalFilter {
    /// Instance start date within `[from, to]`.
    StartDate {
        #[serde(default)]
        from: Option<DateTime<Utc>>,
        #[serde(default)]
        to: Option<DateTime<Utc>>,
    },
    /// Instance end date within `[from, to]`; unfinished instances never match.
    EndDate {
        #[serde(default)]
        from: Option<DateTime<Utc>>,
        #[serde(default)]
        to: Option<DateTime<Utc>>,
    },
    /// Started no earlier than `millis` before the store's current time.
    StartedWithinLast { millis: u64 },
    State { states: Vec<InstanceState> },
    /// Variable `name` holds one of the given terms.
    VariableIn { name: String, values: Vec<String> },
    /// Every listed flow node was executed.
    FlowNodeExecuted { activity_ids: Vec<String> },
}

/// Boolean filter over process instances.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InstanceFilter {
    #[default]
    All,
    And(Vec<InstanceFilter>),
    Or(Vec<InstanceFilter>),
    Not(Box<InstanceFilter>),
    Scope(DefinitionScope),
    /// The instance executed `activity_id` at any position of its trace.
    ContainsFlowNode(String),
    /// Some execution of `activity_id` has a duration inside `range`.
    FlowNodeDuration {
        activity_id: String,
        range: DurationRange,
    },
    External(ExternalFilter),
}

impl InstanceFilter {
    pub fn contains(activity_id: impl Into<String>) -> Self {
        InstanceFilter::ContainsFlowNode(activity_id.into())
    }

    pub fn negate(filter: InstanceFilter) -> Self {
        InstanceFilter::Not(Box::new(filter))
    }

    pub fn duration(activity_id: impl Into<String>, range: DurationRange) -> Self {
        InstanceFilter::FlowNodeDuration {
            activity_id: activity_id.into(),
            range,
        }
    }

    /// Conjunction that collapses trivial cases.
    pub fn all_of(mut filters: Vec<InstanceFilter>) -> Self {
        filters.retain(|f| *f != InstanceFilter::All);
        match filters.len() {
            0 => InstanceFilter::All,
            1 => filters.remove(0),
            _ => InstanceFilter::And(filters),
        }
    }

    /// Disjunction; an empty list matches nothing.
    pub fn any_of(mut filters: Vec<InstanceFilter>) -> Self {
        if filters.len() == 1 {
            return filters.remove(0);
        }
        InstanceFilter::Or(filters)
    }
}
