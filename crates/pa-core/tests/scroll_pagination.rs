//! Composite scroll pagination against the in-memory store.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};

use pa_common::{
    Aggregation, AggregationRequest, AggregationResponse, BucketMetric, CompositeAggregation,
    CompositeKey, CompositeSource, DefinitionScope, DefinitionType, FlowNodeSelector,
    InstanceFilter, ProcessInstanceRecord, StoreError,
};
use pa_config::{AnalysisConfig, ScrollConfig};
use pa_core::logging::LogContext;
use pa_core::{
    AllowAll, CompositePages, InMemoryInstanceStore, InstanceStore, OutlierAnalyzer,
    OutlierRequest, RequestContext, StaticVariableNames,
};
use support::fixtures::{CountingStore, Fixture};

const KEY: &str = "invoice";

/// One instance running `nodes` flow nodes, each with two executions of
/// different length.
fn wide_store(nodes: usize) -> InMemoryInstanceStore {
    let mut store = InMemoryInstanceStore::default();
    let mut record = ProcessInstanceRecord::new("i-1", KEY);
    for n in 0..nodes {
        record = record
            .with_flow_node(format!("task-{n:02}"), 10)
            .with_flow_node(format!("task-{n:02}"), 20);
    }
    store.insert(record);
    store
}

fn composite_request(page_size: usize) -> AggregationRequest {
    AggregationRequest {
        definition_type: DefinitionType::Process,
        definition_key: KEY.to_string(),
        filter: InstanceFilter::Scope(DefinitionScope::new(KEY)),
        aggregation: Aggregation::Composite(CompositeAggregation {
            source: CompositeSource::ActivityId {
                flow_nodes: FlowNodeSelector::All,
            },
            metric: BucketMetric::DurationStats,
            size: page_size,
            after: None,
        }),
        timeout_ms: Some(1_000),
    }
}

fn log() -> LogContext {
    LogContext::new("scroll-test")
}

#[test]
fn test_pages_until_the_store_runs_dry() {
    let store = CountingStore::new(wide_store(25));
    let mut pages = CompositePages::new(&store, composite_request(10), None, log());

    let sizes: Vec<usize> = pages
        .by_ref()
        .map(|page| page.unwrap().buckets.len())
        .collect();

    assert_eq!(sizes, vec![10, 10, 5]);
    // The fourth round-trip comes back empty and ends the sequence.
    assert_eq!(pages.pages_fetched(), 4);
    assert_eq!(store.aggregation_queries(), 4);
    assert!(pages.next().is_none());
}

#[test]
fn test_collected_buckets_are_unique_and_ordered() {
    let store = wide_store(25);
    let buckets = CompositePages::new(&store, composite_request(7), None, log())
        .collect_buckets()
        .unwrap();

    assert_eq!(buckets.len(), 25);
    let keys: Vec<&CompositeKey> = buckets.iter().map(|b| &b.key).collect();
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
    assert!(buckets.iter().all(|b| b.stats.is_some() && b.doc_count == 2));
}

#[test]
fn test_page_limit_stops_early() {
    let store = CountingStore::new(wide_store(25));
    let buckets = CompositePages::new(&store, composite_request(10), Some(2), log())
        .collect_buckets()
        .unwrap();

    assert_eq!(buckets.len(), 20);
    assert_eq!(store.aggregation_queries(), 2);
}

#[test]
fn test_non_composite_request_is_rejected() {
    let store = CountingStore::new(wide_store(3));
    let mut request = composite_request(10);
    request.aggregation = Aggregation::DurationHistogram {
        activity_id: "task-00".to_string(),
        interval: 10,
    };
    let mut pages = CompositePages::new(&store, request, None, log());

    assert!(matches!(pages.next(), Some(Err(StoreError::Query(_)))));
    assert!(pages.next().is_none());
    assert_eq!(store.total_queries(), 0);
}

/// Fails every round-trip after the first `healthy` ones.
struct FlakyStore {
    inner: InMemoryInstanceStore,
    healthy: usize,
    calls: AtomicUsize,
}

impl InstanceStore for FlakyStore {
    fn count(
        &self,
        definition_type: DefinitionType,
        definition_key: &str,
        filter: &InstanceFilter,
    ) -> Result<u64, StoreError> {
        self.inner.count(definition_type, definition_key, filter)
    }

    fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResponse, StoreError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.healthy {
            return Err(StoreError::Timeout { millis: 1_000 });
        }
        self.inner.aggregate(request)
    }
}

#[test]
fn test_error_ends_the_sequence() {
    let store = FlakyStore {
        inner: wide_store(25),
        healthy: 1,
        calls: AtomicUsize::new(0),
    };
    let items: Vec<_> = CompositePages::new(&store, composite_request(10), None, log()).collect();

    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert_eq!(items[1], Err(StoreError::Timeout { millis: 1_000 }));
}

#[test]
fn test_findings_do_not_depend_on_page_size() {
    let records: Vec<ProcessInstanceRecord> = (0..10)
        .map(|i| {
            let mut record = ProcessInstanceRecord::new(format!("i-{i}"), KEY);
            for n in 0..12 {
                let slow = i == n % 10;
                record = record.with_flow_node(format!("task-{n:02}"), if slow { 5_000 } else { 100 });
            }
            record
        })
        .collect();
    let fixture = Fixture::new(&[], records);
    let variables = StaticVariableNames::default();
    let request = OutlierRequest {
        definition_type: DefinitionType::Process,
        scope: DefinitionScope::new(KEY),
        filters: Vec::new(),
    };

    let run = |page_size: usize| {
        let config = AnalysisConfig {
            scroll: ScrollConfig {
                page_size,
                ..ScrollConfig::default()
            },
            ..AnalysisConfig::default()
        };
        OutlierAnalyzer::new(fixture.services(&AllowAll, &variables), &config)
            .flow_node_outlier_map(&RequestContext::new("kermit"), &request)
            .unwrap()
    };

    let paged = run(5);
    assert_eq!(paged.len(), 12);
    assert_eq!(paged, run(10_000));
}
