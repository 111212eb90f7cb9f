//! Duration outlier detection.
//!
//! Three read-only operations share one analyzer:
//! - [`OutlierAnalyzer::flow_node_outlier_map`]: per flow node findings with
//!   heat normalized across the process.
//! - [`OutlierAnalyzer::count_by_duration_chart`]: duration histogram of one
//!   node with outlier buckets tagged.
//! - [`OutlierAnalyzer::significant_outlier_variable_terms`]: variable terms
//!   over-represented among a node's outlier instances.
//!
//! A scope whose instance index does not exist yields empty results for all
//! three.

mod chart;
mod findings;
mod terms;

use pa_common::{
    Aggregation, DefinitionScope, DefinitionType, DurationRange, ExternalFilter, FlowNodeSelector,
    FlowNodeStats, InstanceFilter, OutlierBounds, Result,
};
use pa_config::AnalysisConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::context::{AnalysisServices, RequestContext};
use crate::query::{InstanceQuery, InstanceQueryEngine};

/// Input of the outlier map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutlierRequest {
    #[serde(default)]
    pub definition_type: DefinitionType,
    pub scope: DefinitionScope,
    #[serde(default)]
    pub filters: Vec<ExternalFilter>,
}

/// Input of the per flow node chart and term operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowNodeOutlierRequest {
    #[serde(default)]
    pub definition_type: DefinitionType,
    pub scope: DefinitionScope,
    #[serde(default)]
    pub filters: Vec<ExternalFilter>,
    pub flow_node_id: String,
    /// Overrides the computed lower bound.
    #[serde(default)]
    pub lower_bound: Option<f64>,
    /// Overrides the computed upper bound.
    #[serde(default)]
    pub higher_bound: Option<f64>,
}

impl FlowNodeOutlierRequest {
    pub fn new(scope: DefinitionScope, flow_node_id: impl Into<String>) -> Self {
        Self {
            definition_type: DefinitionType::Process,
            scope,
            filters: Vec::new(),
            flow_node_id: flow_node_id.into(),
            lower_bound: None,
            higher_bound: None,
        }
    }

    pub fn with_bounds(mut self, lower: Option<f64>, higher: Option<f64>) -> Self {
        self.lower_bound = lower;
        self.higher_bound = higher;
        self
    }

    fn query(&self) -> InstanceQuery {
        InstanceQuery::new(self.scope.clone()).with_external(&self.filters)
    }
}

pub struct OutlierAnalyzer<'a> {
    services: AnalysisServices<'a>,
    config: &'a AnalysisConfig,
}

impl<'a> OutlierAnalyzer<'a> {
    pub fn new(services: AnalysisServices<'a>, config: &'a AnalysisConfig) -> Self {
        Self { services, config }
    }

    fn engine<'c>(
        &self,
        ctx: &'c RequestContext,
        definition_type: DefinitionType,
    ) -> InstanceQueryEngine<'c>
    where
        'a: 'c,
    {
        InstanceQueryEngine::new(
            self.services.store,
            definition_type,
            self.config.scroll.clone(),
            &ctx.log,
        )
    }

    /// Duration statistics of one node; `None` when the node never finished
    /// inside the scope or the index is missing.
    fn node_stats(
        &self,
        engine: &InstanceQueryEngine<'_>,
        scope: &DefinitionScope,
        filter: InstanceFilter,
        activity_id: &str,
    ) -> Result<Option<FlowNodeStats>> {
        let request = engine.request(
            scope,
            filter,
            Aggregation::DurationStats {
                flow_nodes: FlowNodeSelector::Only(activity_id.to_string()),
                range: None,
            },
        );
        let Some(response) = engine.aggregate(&request)? else {
            return Ok(None);
        };
        let stats = response.into_stats()?;
        Ok((!stats.is_empty()).then(|| FlowNodeStats::from(&stats)))
    }

    /// Mean duration of a node's executions inside `range`; 0 when none.
    fn mean_within(
        &self,
        engine: &InstanceQueryEngine<'_>,
        scope: &DefinitionScope,
        base: &InstanceFilter,
        activity_id: &str,
        range: DurationRange,
    ) -> Result<f64> {
        let filter = InstanceFilter::all_of(vec![
            base.clone(),
            InstanceFilter::duration(activity_id, range),
        ]);
        let request = engine.request(
            scope,
            filter,
            Aggregation::DurationStats {
                flow_nodes: FlowNodeSelector::Only(activity_id.to_string()),
                range: Some(range),
            },
        );
        match engine.aggregate(&request)? {
            Some(response) => Ok(response.into_stats()?.mean()),
            None => Ok(0.0),
        }
    }

    /// Computed bounds with any explicit override applied per side.
    fn bounds(&self, stats: &FlowNodeStats, lower: Option<f64>, higher: Option<f64>) -> OutlierBounds {
        let computed = OutlierBounds::from_stats(stats, self.config.outlier.std_dev_multiplier);
        OutlierBounds {
            lower: lower.unwrap_or(computed.lower),
            upper: higher.unwrap_or(computed.upper),
        }
    }
}

/// Histogram bucket width aiming at `target_points` buckets over `[min, max]`.
///
/// Never 0: a degenerate range maps to 1.
pub fn histogram_interval(min: f64, max: f64, target_points: u32) -> u64 {
    let span = max - min;
    if !span.is_finite() || span <= 0.0 || target_points == 0 {
        return 1;
    }
    let interval = (span / f64::from(target_points)).ceil();
    if interval >= u64::MAX as f64 {
        u64::MAX
    } else {
        (interval as u64).max(1)
    }
}

/// `part / whole`, 0 when `whole` is 0.
pub(crate) fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
