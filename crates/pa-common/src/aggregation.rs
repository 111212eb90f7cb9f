//! Aggregation request/response contract between the engines and an
//! instance store.
//!
//! Requests are addressed by definition type and key; the store derives the
//! index name from [`DefinitionFields::index_name`](crate::DefinitionFields::index_name)
//! and answers `StoreError::IndexNotFound` when nothing was ever imported for
//! that key.

use pa_math::ExtendedStats;
use serde::Serialize;

use crate::error::StoreError;
use crate::filter::{DurationRange, InstanceFilter};
use crate::scope::DefinitionType;

/// Which flow node executions feed an aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowNodeSelector {
    All,
    Only(String),
}

impl FlowNodeSelector {
    pub fn matches(&self, activity_id: &str) -> bool {
        match self {
            FlowNodeSelector::All => true,
            FlowNodeSelector::Only(id) => id == activity_id,
        }
    }
}

/// Metric computed per composite bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketMetric {
    /// Number of documents in the bucket.
    DocCount,
    /// Extended statistics over flow node durations in the bucket.
    DurationStats,
}

/// Grouping key source of a composite aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeSource {
    /// Group finished flow node executions by activity id.
    ActivityId { flow_nodes: FlowNodeSelector },
    /// Group instances by `(variable name, term)`.
    ///
    /// `terms`, when present, restricts buckets to exactly those pairs.
    VariableTerm {
        names: Vec<String>,
        terms: Option<Vec<(String, String)>>,
    },
}

/// Key of a composite bucket; buckets are returned in ascending key order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeKey {
    Activity(String),
    Term { name: String, value: String },
}

/// A composite (cursor-paginated) grouping aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeAggregation {
    pub source: CompositeSource,
    pub metric: BucketMetric,
    /// Maximum buckets per page.
    pub size: usize,
    /// Resume strictly after this key.
    pub after: Option<CompositeKey>,
}

/// Aggregation kinds supported by the store contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Extended statistics over durations of matching executions, optionally
    /// limited to a duration range.
    DurationStats {
        flow_nodes: FlowNodeSelector,
        range: Option<DurationRange>,
    },
    /// Duration histogram of one flow node with fixed bucket width, gap filled
    /// between the first and last non-empty bucket.
    DurationHistogram { activity_id: String, interval: u64 },
    Composite(CompositeAggregation),
}

/// One aggregation round-trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationRequest {
    pub definition_type: DefinitionType,
    pub definition_key: String,
    pub filter: InstanceFilter,
    pub aggregation: Aggregation,
    /// Per-request timeout handed to the store client.
    pub timeout_ms: Option<u64>,
}

/// One histogram bucket; `key` is the bucket's lower edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBucket {
    pub key: f64,
    pub doc_count: u64,
}

/// One bucket of a composite page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeBucket {
    pub key: CompositeKey,
    pub doc_count: u64,
    /// Present when the request asked for [`BucketMetric::DurationStats`].
    pub stats: Option<ExtendedStats>,
}

/// One page of composite buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositePage {
    /// Instances matched by the request filter.
    pub hits: u64,
    pub buckets: Vec<CompositeBucket>,
    /// Cursor for the next page; `None` once the store has nothing more.
    pub after_key: Option<CompositeKey>,
}

/// Store answer, shaped after the requested [`Aggregation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationResponse {
    Stats { hits: u64, stats: ExtendedStats },
    Histogram { hits: u64, buckets: Vec<HistogramBucket> },
    Composite(CompositePage),
}

impl AggregationResponse {
    pub fn into_stats(self) -> Result<ExtendedStats, StoreError> {
        match self {
            AggregationResponse::Stats { stats, .. } => Ok(stats),
            other => Err(unexpected("stats", &other)),
        }
    }

    pub fn into_histogram(self) -> Result<Vec<HistogramBucket>, StoreError> {
        match self {
            AggregationResponse::Histogram { buckets, .. } => Ok(buckets),
            other => Err(unexpected("histogram", &other)),
        }
    }

    pub fn into_page(self) -> Result<CompositePage, StoreError> {
        match self {
            AggregationResponse::Composite(page) => Ok(page),
            other => Err(unexpected("composite", &other)),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AggregationResponse::Stats { .. } => "stats",
            AggregationResponse::Histogram { .. } => "histogram",
            AggregationResponse::Composite(_) => "composite",
        }
    }
}

fn unexpected(expected: &str, got: &AggregationResponse) -> StoreError {
    StoreError::Query(format!(
        "expected {expected} aggregation response, got {}",
        got.kind()
    ))
}

/// Sort composite buckets into cursor order.
pub fn sort_buckets(buckets: &mut [CompositeBucket]) {
    buckets.sort_by(|a, b| a.key.cmp(&b.key));
}
