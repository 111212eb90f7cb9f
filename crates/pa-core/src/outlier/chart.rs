//! Duration histogram of one flow node.

use pa_common::{Aggregation, DurationChartEntry, Result};

use super::{histogram_interval, FlowNodeOutlierRequest, OutlierAnalyzer};
use crate::context::RequestContext;
use crate::log_event;
use crate::logging::{event_names, Stage};

impl OutlierAnalyzer<'_> {
    /// Histogram buckets of the node's durations, each tagged with whether
    /// its lower edge lies outside the outlier bounds.
    pub fn count_by_duration_chart(
        &self,
        ctx: &RequestContext,
        request: &FlowNodeOutlierRequest,
    ) -> Result<Vec<DurationChartEntry>> {
        self.services.authorize(ctx, &request.scope)?;
        let engine = self.engine(ctx, request.definition_type);
        let filter = request.query().to_filter();

        let Some(stats) =
            self.node_stats(&engine, &request.scope, filter.clone(), &request.flow_node_id)?
        else {
            return Ok(Vec::new());
        };
        let bounds = self.bounds(&stats, request.lower_bound, request.higher_bound);
        let interval = histogram_interval(
            stats.min,
            stats.max,
            self.config.outlier.chart_target_points,
        );

        let histogram = engine.request(
            &request.scope,
            filter,
            Aggregation::DurationHistogram {
                activity_id: request.flow_node_id.clone(),
                interval,
            },
        );
        let Some(response) = engine.aggregate(&histogram)? else {
            return Ok(Vec::new());
        };
        let entries: Vec<DurationChartEntry> = response
            .into_histogram()?
            .into_iter()
            .map(|bucket| DurationChartEntry {
                key: bucket.key,
                value: bucket.doc_count,
                outlier: bounds.is_outlier(bucket.key),
            })
            .collect();

        log_event!(
            ctx.log,
            INFO,
            event_names::ANALYSIS_FINISHED,
            Stage::Chart,
            "duration chart finished",
            activity_id = request.flow_node_id.as_str(),
            interval = interval,
            buckets = entries.len()
        );
        Ok(entries)
    }
}
