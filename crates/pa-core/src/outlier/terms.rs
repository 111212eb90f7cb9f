//! Variable terms over-represented among a flow node's outliers.
//!
//! 1. Count the outlier population (durations beyond either active bound).
//!    An empty population ends the operation right there.
//! 2. Collect the top terms per variable among the outliers, dropping terms
//!    below the document count floor.
//! 3. Count the complement population and the same terms inside it.
//! 4. Keep a term when its outlier ratio is strictly higher and the
//!    chi-square comparison of the two populations rejects equality.

use std::collections::BTreeMap;

use pa_common::{
    BucketMetric, CompositeBucket, CompositeKey, CompositeSource, DurationRange, Error,
    InstanceFilter, Result, VariableTermDto,
};
use pa_math::chi_square_data_sets_comparison;

use super::{ratio, FlowNodeOutlierRequest, OutlierAnalyzer};
use crate::context::RequestContext;
use crate::log_event;
use crate::logging::{event_names, Stage};

type TermCounts = BTreeMap<(String, String), u64>;

impl OutlierAnalyzer<'_> {
    /// Significant terms sorted by descending outlier instance count.
    ///
    /// At least one of `lower_bound` and `higher_bound` is required; the
    /// check happens before any query.
    pub fn significant_outlier_variable_terms(
        &self,
        ctx: &RequestContext,
        request: &FlowNodeOutlierRequest,
    ) -> Result<Vec<VariableTermDto>> {
        let condition = outlier_condition(
            &request.flow_node_id,
            request.lower_bound,
            request.higher_bound,
        )?;
        self.services.authorize(ctx, &request.scope)?;

        let names = self
            .services
            .variables
            .variable_names(request.definition_type, &request.scope)?;
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let engine = self.engine(ctx, request.definition_type);

        let outlier_query = request.query().with_filter(condition.clone());
        let outlier_population = engine.count(&outlier_query)?;
        if outlier_population == 0 {
            log_event!(
                ctx.log,
                DEBUG,
                event_names::TERMS_EMPTY_POPULATION,
                Stage::Terms,
                "no outlier instances",
                activity_id = request.flow_node_id.as_str()
            );
            return Ok(Vec::new());
        }

        let outlier_terms = self.top_terms(engine.scroll_buckets(
            &request.scope,
            outlier_query.to_filter(),
            CompositeSource::VariableTerm {
                names: names.clone(),
                terms: None,
            },
            BucketMetric::DocCount,
        )?);
        if outlier_terms.is_empty() {
            return Ok(Vec::new());
        }

        let complement_query = request
            .query()
            .containing([request.flow_node_id.as_str()])
            .with_filter(InstanceFilter::negate(condition));
        let complement_population = engine.count(&complement_query)?;
        let complement_terms = term_counts(engine.scroll_buckets(
            &request.scope,
            complement_query.to_filter(),
            CompositeSource::VariableTerm {
                names,
                terms: Some(outlier_terms.keys().cloned().collect()),
            },
            BucketMetric::DocCount,
        )?);

        let alpha = self.config.outlier.significance_level;
        let mut significant: Vec<VariableTermDto> = outlier_terms
            .into_iter()
            .filter_map(|((name, term), outlier_count)| {
                let complement_count = complement_terms
                    .get(&(name.clone(), term.clone()))
                    .copied()
                    .unwrap_or(0);
                let outlier_ratio = ratio(outlier_count, outlier_population);
                let non_outlier_ratio = ratio(complement_count, complement_population);
                if outlier_ratio <= non_outlier_ratio {
                    return None;
                }
                let rejects = chi_square_data_sets_comparison(
                    &[complement_count, complement_population],
                    &[outlier_count, outlier_population],
                )
                .is_some_and(|comparison| comparison.rejects_null(alpha));
                rejects.then(|| VariableTermDto {
                    variable_name: name,
                    variable_term: term,
                    instance_count: outlier_count,
                    outlier_ratio,
                    non_outlier_ratio,
                    outlier_to_all_ratio: ratio(
                        outlier_count + complement_count,
                        outlier_population + complement_population,
                    ),
                })
            })
            .collect();

        significant.sort_by(|a, b| {
            b.instance_count
                .cmp(&a.instance_count)
                .then_with(|| a.variable_name.cmp(&b.variable_name))
                .then_with(|| a.variable_term.cmp(&b.variable_term))
        });
        log_event!(
            ctx.log,
            INFO,
            event_names::ANALYSIS_FINISHED,
            Stage::Terms,
            "variable terms finished",
            activity_id = request.flow_node_id.as_str(),
            outlier_population = outlier_population,
            complement_population = complement_population,
            terms = significant.len()
        );
        Ok(significant)
    }

    /// Terms at or above the doc count floor, top N per variable name.
    fn top_terms(&self, buckets: Vec<CompositeBucket>) -> TermCounts {
        let floor = self.config.outlier.min_term_doc_count;
        let per_variable = self.config.outlier.max_terms_per_variable;

        let mut by_name: BTreeMap<String, Vec<(String, u64)>> = BTreeMap::new();
        for ((name, term), count) in term_counts(buckets) {
            if count >= floor {
                by_name.entry(name).or_default().push((term, count));
            }
        }

        let mut kept = TermCounts::new();
        for (name, mut terms) in by_name {
            terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            terms.truncate(per_variable);
            kept.extend(terms.into_iter().map(|(term, count)| ((name.clone(), term), count)));
        }
        kept
    }
}

fn term_counts(buckets: Vec<CompositeBucket>) -> TermCounts {
    buckets
        .into_iter()
        .filter_map(|bucket| match bucket.key {
            CompositeKey::Term { name, value } => Some(((name, value), bucket.doc_count)),
            CompositeKey::Activity(_) => None,
        })
        .collect()
}

/// Durations of `activity_id` beyond either given bound.
fn outlier_condition(
    activity_id: &str,
    lower: Option<f64>,
    higher: Option<f64>,
) -> Result<InstanceFilter> {
    if lower.is_none() && higher.is_none() {
        return Err(Error::Validation(
            "at least one of lower_bound and higher_bound is required".to_string(),
        ));
    }
    let sides = [
        lower.map(|bound| InstanceFilter::duration(activity_id, DurationRange::below(bound))),
        higher.map(|bound| InstanceFilter::duration(activity_id, DurationRange::above(bound))),
    ];
    Ok(InstanceFilter::any_of(sides.into_iter().flatten().collect()))
}
