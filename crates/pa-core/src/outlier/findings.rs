//! Per flow node outlier findings and heat.

use std::collections::BTreeMap;

use pa_common::{
    BucketMetric, CompositeKey, CompositeSource, DefinitionScope, DurationRange, Finding,
    FindingsDto, FlowNodeSelector, FlowNodeStats, InstanceFilter, OutlierBounds, Result,
};

use super::{ratio, OutlierAnalyzer, OutlierRequest};
use crate::context::RequestContext;
use crate::log_event;
use crate::logging::{event_names, Stage};
use crate::query::{InstanceQuery, InstanceQueryEngine};

/// Which side of the distribution a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Lower,
    Higher,
}

impl OutlierAnalyzer<'_> {
    /// Findings keyed by flow node id.
    ///
    /// Nodes with zero deviation, and nodes without any finding, are left
    /// out. Any store failure aborts the whole map.
    pub fn flow_node_outlier_map(
        &self,
        ctx: &RequestContext,
        request: &OutlierRequest,
    ) -> Result<BTreeMap<String, FindingsDto>> {
        self.services.authorize(ctx, &request.scope)?;
        let engine = self.engine(ctx, request.definition_type);
        let query = InstanceQuery::new(request.scope.clone()).with_external(&request.filters);
        let base = query.to_filter();

        let mut findings = BTreeMap::new();
        let pages = engine.scroll(
            &request.scope,
            base.clone(),
            CompositeSource::ActivityId {
                flow_nodes: FlowNodeSelector::All,
            },
            BucketMetric::DurationStats,
        );
        for page in pages {
            let Some(page) = engine.recover_missing_index(page)? else {
                return Ok(BTreeMap::new());
            };
            for bucket in page.buckets {
                let (CompositeKey::Activity(activity_id), Some(stats)) = (bucket.key, bucket.stats)
                else {
                    continue;
                };
                let stats = FlowNodeStats::from(&stats);
                let node = NodeQuery {
                    engine: &engine,
                    scope: &request.scope,
                    query: &query,
                    base: &base,
                    activity_id: &activity_id,
                };
                if let Some(dto) = self.node_findings(ctx, &node, &stats)? {
                    findings.insert(activity_id, dto);
                }
            }
        }

        apply_heat(&mut findings);
        log_event!(
            ctx.log,
            INFO,
            event_names::ANALYSIS_FINISHED,
            Stage::Heat,
            "outlier map finished",
            nodes = findings.len()
        );
        Ok(findings)
    }

    fn node_findings(
        &self,
        ctx: &RequestContext,
        node: &NodeQuery<'_, '_>,
        stats: &FlowNodeStats,
    ) -> Result<Option<FindingsDto>> {
        if stats.std_deviation <= 0.0 || !stats.std_deviation.is_finite() {
            log_event!(
                ctx.log,
                DEBUG,
                event_names::NODE_SKIPPED,
                Stage::Stats,
                "zero deviation, no bounds",
                activity_id = node.activity_id
            );
            return Ok(None);
        }

        let bounds = OutlierBounds::from_stats(stats, self.config.outlier.std_dev_multiplier);
        let lower_outlier = if bounds.lower > stats.min {
            self.finding(node, stats, Side::Lower, bounds.lower)?
        } else {
            None
        };
        let higher_outlier = if bounds.upper < stats.max {
            self.finding(node, stats, Side::Higher, bounds.upper)?
        } else {
            None
        };
        log_event!(
            ctx.log,
            DEBUG,
            event_names::NODE_FINDINGS,
            Stage::Bounds,
            "node bounds evaluated",
            activity_id = node.activity_id,
            lower = bounds.lower,
            upper = bounds.upper,
            lower_count = lower_outlier.map_or(0, |f| f.count),
            higher_count = higher_outlier.map_or(0, |f| f.count)
        );

        if lower_outlier.is_none() && higher_outlier.is_none() {
            return Ok(None);
        }
        Ok(Some(FindingsDto {
            lower_outlier,
            higher_outlier,
            total_count: stats.count,
            ..FindingsDto::default()
        }))
    }

    /// Count instances beyond `bound`; `None` when there are none.
    fn finding(
        &self,
        node: &NodeQuery<'_, '_>,
        stats: &FlowNodeStats,
        side: Side,
        bound: f64,
    ) -> Result<Option<Finding>> {
        let range = match side {
            Side::Lower => DurationRange::below(bound),
            Side::Higher => DurationRange::above(bound),
        };
        let count = node.engine.count(
            &node
                .query
                .clone()
                .with_filter(InstanceFilter::duration(node.activity_id, range)),
        )?;
        if count == 0 {
            return Ok(None);
        }

        let outlier_mean =
            self.mean_within(node.engine, node.scope, node.base, node.activity_id, range)?;
        let relation = match side {
            Side::Lower if outlier_mean > 0.0 => stats.mean / outlier_mean,
            Side::Higher if stats.mean > 0.0 => outlier_mean / stats.mean,
            _ => 0.0,
        };
        Ok(Some(Finding {
            bound_value: bound,
            count,
            percentage: ratio(count, stats.count),
            relation,
        }))
    }
}

/// Query inputs shared by every round-trip for one flow node.
struct NodeQuery<'e, 'q> {
    engine: &'q InstanceQueryEngine<'e>,
    scope: &'q DefinitionScope,
    query: &'q InstanceQuery,
    base: &'q InstanceFilter,
    activity_id: &'q str,
}

/// Normalize outlier counts into heat shares, overall and per side.
fn apply_heat(findings: &mut BTreeMap<String, FindingsDto>) {
    let lower_total: u64 = findings.values().map(FindingsDto::lower_count).sum();
    let higher_total: u64 = findings.values().map(FindingsDto::higher_count).sum();
    let total = lower_total + higher_total;

    for dto in findings.values_mut() {
        dto.heat = ratio(dto.outlier_count(), total);
        dto.lower_outlier_heat = ratio(dto.lower_count(), lower_total);
        dto.higher_outlier_heat = ratio(dto.higher_count(), higher_total);
    }
}
