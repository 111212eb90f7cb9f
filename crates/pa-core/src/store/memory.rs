//! In-memory instance store.
//!
//! Evaluates the full filter tree (including external filters) and every
//! aggregation kind of the store contract against records held in memory.
//! Answers synchronously, so request timeouts are accepted but never hit.

use pa_common::aggregation::sort_buckets;
use pa_common::{
    Aggregation, AggregationRequest, AggregationResponse, BucketMetric, Clock, CompositeAggregation,
    CompositeBucket, CompositeKey, CompositePage, CompositeSource, DefinitionScope, DefinitionType,
    ExternalFilter, HistogramBucket, InstanceFilter, ProcessInstanceRecord, Result, StoreError,
    SystemClock,
};
use pa_math::ExtendedStats;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::variables::VariableNameService;

/// Instance store keeping one index per definition key.
pub struct InMemoryInstanceStore {
    indices: HashMap<String, Vec<ProcessInstanceRecord>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryInstanceStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for InMemoryInstanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryInstanceStore")
            .field("indices", &self.indices.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl InMemoryInstanceStore {
    /// `clock` drives relative date filters.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            indices: HashMap::new(),
            clock,
        }
    }

    /// Import a process instance, creating its index on first use.
    pub fn insert(&mut self, record: ProcessInstanceRecord) {
        self.insert_typed(DefinitionType::Process, record);
    }

    pub fn insert_typed(&mut self, definition_type: DefinitionType, record: ProcessInstanceRecord) {
        let index = definition_type.fields().index_name(&record.definition_key);
        self.indices.entry(index).or_default().push(record);
    }

    pub fn extend<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = ProcessInstanceRecord>,
    {
        for record in records {
            self.insert(record);
        }
    }

    /// Create an empty index for `definition_key`.
    pub fn create_index(&mut self, definition_type: DefinitionType, definition_key: &str) {
        let index = definition_type.fields().index_name(definition_key);
        self.indices.entry(index).or_default();
    }

    pub fn instance_count(&self) -> usize {
        self.indices.values().map(Vec::len).sum()
    }

    fn index(
        &self,
        definition_type: DefinitionType,
        definition_key: &str,
    ) -> std::result::Result<&[ProcessInstanceRecord], StoreError> {
        let index = definition_type.fields().index_name(definition_key);
        self.indices
            .get(&index)
            .map(Vec::as_slice)
            .ok_or(StoreError::IndexNotFound { index })
    }

    fn matching<'a>(
        &self,
        records: &'a [ProcessInstanceRecord],
        filter: &'a InstanceFilter,
    ) -> impl Iterator<Item = &'a ProcessInstanceRecord> + 'a {
        let now_millis = self.clock.now().timestamp_millis();
        records
            .iter()
            .filter(move |r| matches_filter(filter, r, now_millis))
    }
}

fn matches_filter(filter: &InstanceFilter, record: &ProcessInstanceRecord, now_millis: i64) -> bool {
    match filter {
        InstanceFilter::All => true,
        InstanceFilter::And(parts) => parts.iter().all(|f| matches_filter(f, record, now_millis)),
        InstanceFilter::Or(parts) => parts.iter().any(|f| matches_filter(f, record, now_millis)),
        InstanceFilter::Not(inner) => !matches_filter(inner, record, now_millis),
        InstanceFilter::Scope(scope) => scope.matches(
            &record.definition_key,
            &record.definition_version,
            record.tenant_id.as_deref(),
        ),
        InstanceFilter::ContainsFlowNode(id) => record.executed(id),
        InstanceFilter::FlowNodeDuration { activity_id, range } => record
            .durations_of(activity_id)
            .any(|d| range.contains(d as f64)),
        InstanceFilter::External(external) => matches_external(external, record, now_millis),
    }
}

fn matches_external(filter: &ExternalFilter, record: &ProcessInstanceRecord, now_millis: i64) -> bool {
    match filter {
        ExternalFilter::StartDate { from, to } => {
            from.map_or(true, |f| record.start_date >= f) && to.map_or(true, |t| record.start_date <= t)
        }
        ExternalFilter::EndDate { from, to } => match record.end_date {
            Some(end) => from.map_or(true, |f| end >= f) && to.map_or(true, |t| end <= t),
            None => false,
        },
        ExternalFilter::StartedWithinLast { millis } => {
            let earliest = now_millis.saturating_sub(i64::try_from(*millis).unwrap_or(i64::MAX));
            record.start_date.timestamp_millis() >= earliest
        }
        ExternalFilter::State { states } => states.contains(&record.state),
        ExternalFilter::VariableIn { name, values } => record
            .variables
            .get(name)
            .is_some_and(|v| values.contains(&v.to_term())),
        ExternalFilter::FlowNodeExecuted { activity_ids } => {
            activity_ids.iter().all(|id| record.executed(id))
        }
    }
}

fn histogram(durations: &[f64], interval: u64) -> Vec<HistogramBucket> {
    let width = interval as f64;
    let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
    for &d in durations {
        *counts.entry((d / width).floor() as i64).or_default() += 1;
    }
    let (Some(&first), Some(&last)) = (counts.keys().next(), counts.keys().next_back()) else {
        return Vec::new();
    };
    (first..=last)
        .map(|slot| HistogramBucket {
            key: slot as f64 * width,
            doc_count: counts.get(&slot).copied().unwrap_or(0),
        })
        .collect()
}

fn composite_buckets<'a>(
    source: &CompositeSource,
    metric: BucketMetric,
    records: impl Iterator<Item = &'a ProcessInstanceRecord>,
) -> std::result::Result<Vec<CompositeBucket>, StoreError> {
    let mut buckets = Vec::new();
    match source {
        CompositeSource::ActivityId { flow_nodes } => {
            let mut grouped: BTreeMap<&str, ExtendedStats> = BTreeMap::new();
            for record in records {
                for node in record.flow_nodes.iter().filter(|n| flow_nodes.matches(&n.activity_id)) {
                    if let Some(d) = node.duration_millis {
                        grouped.entry(node.activity_id.as_str()).or_default().push(d as f64);
                    }
                }
            }
            for (id, stats) in grouped {
                buckets.push(CompositeBucket {
                    key: CompositeKey::Activity(id.to_string()),
                    doc_count: stats.count,
                    stats: (metric == BucketMetric::DurationStats).then_some(stats),
                });
            }
        }
        CompositeSource::VariableTerm { names, terms } => {
            if metric == BucketMetric::DurationStats {
                return Err(StoreError::Query(
                    "duration stats are not supported on variable term buckets".to_string(),
                ));
            }
            let allowed: Option<HashSet<(&str, &str)>> = terms
                .as_ref()
                .map(|t| t.iter().map(|(n, v)| (n.as_str(), v.as_str())).collect());
            let mut grouped: BTreeMap<(String, String), u64> = BTreeMap::new();
            for record in records {
                for name in names {
                    let Some(value) = record.variables.get(name) else {
                        continue;
                    };
                    let term = value.to_term();
                    if let Some(allowed) = &allowed {
                        if !allowed.contains(&(name.as_str(), term.as_str())) {
                            continue;
                        }
                    }
                    *grouped.entry((name.clone(), term)).or_default() += 1;
                }
            }
            for ((name, value), doc_count) in grouped {
                buckets.push(CompositeBucket {
                    key: CompositeKey::Term { name, value },
                    doc_count,
                    stats: None,
                });
            }
        }
    }
    sort_buckets(&mut buckets);
    Ok(buckets)
}

fn page(mut buckets: Vec<CompositeBucket>, composite: &CompositeAggregation, hits: u64) -> CompositePage {
    if let Some(after) = &composite.after {
        buckets.retain(|b| &b.key > after);
    }
    buckets.truncate(composite.size);
    let after_key = buckets.last().map(|b| b.key.clone());
    CompositePage {
        hits,
        buckets,
        after_key,
    }
}

impl super::InstanceStore for InMemoryInstanceStore {
    fn count(
        &self,
        definition_type: DefinitionType,
        definition_key: &str,
        filter: &InstanceFilter,
    ) -> std::result::Result<u64, StoreError> {
        let records = self.index(definition_type, definition_key)?;
        Ok(self.matching(records, filter).count() as u64)
    }

    fn aggregate(
        &self,
        request: &AggregationRequest,
    ) -> std::result::Result<AggregationResponse, StoreError> {
        let records = self.index(request.definition_type, &request.definition_key)?;
        let matched: Vec<&ProcessInstanceRecord> = self.matching(records, &request.filter).collect();
        let hits = matched.len() as u64;

        match &request.aggregation {
            Aggregation::DurationStats { flow_nodes, range } => {
                let mut stats = ExtendedStats::default();
                for record in &matched {
                    for node in record.flow_nodes.iter().filter(|n| flow_nodes.matches(&n.activity_id)) {
                        if let Some(d) = node.duration_millis.map(|d| d as f64) {
                            if range.map_or(true, |r| r.contains(d)) {
                                stats.push(d);
                            }
                        }
                    }
                }
                Ok(AggregationResponse::Stats { hits, stats })
            }
            Aggregation::DurationHistogram {
                activity_id,
                interval,
            } => {
                if *interval == 0 {
                    return Err(StoreError::Query("histogram interval must be > 0".to_string()));
                }
                let durations: Vec<f64> = matched
                    .iter()
                    .flat_map(|r| r.durations_of(activity_id))
                    .map(|d| d as f64)
                    .collect();
                Ok(AggregationResponse::Histogram {
                    hits,
                    buckets: histogram(&durations, *interval),
                })
            }
            Aggregation::Composite(composite) => {
                let buckets = composite_buckets(
                    &composite.source,
                    composite.metric,
                    matched.iter().copied(),
                )?;
                Ok(AggregationResponse::Composite(page(buckets, composite, hits)))
            }
        }
    }
}

impl VariableNameService for InMemoryInstanceStore {
    /// Names of variables recorded on instances inside `scope`; empty when
    /// nothing was imported for the key.
    fn variable_names(
        &self,
        definition_type: DefinitionType,
        scope: &DefinitionScope,
    ) -> Result<Vec<String>> {
        let Ok(records) = self.index(definition_type, &scope.key) else {
            return Ok(Vec::new());
        };
        let names: BTreeSet<&str> = records
            .iter()
            .filter(|r| scope.matches(&r.definition_key, &r.definition_version, r.tenant_id.as_deref()))
            .flat_map(|r| r.variables.keys().map(String::as_str))
            .collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }
}
