//! No-mock integration tests for duration outlier analysis.
//!
//! Findings, duration chart and variable terms run against the real
//! in-memory store with real duration distributions.

mod support;

use pa_common::{DefinitionScope, DefinitionType, Error, ProcessInstanceRecord, StoreError};
use pa_config::AnalysisConfig;
use pa_core::{
    AllowAll, AnalysisServices, DocumentDefinitionService, FlowNodeOutlierRequest,
    InMemoryInstanceStore, OutlierAnalyzer, OutlierRequest, RequestContext, StaticVariableNames,
    TenantAccessPolicy,
};
use pretty_assertions::assert_eq;
use support::fixtures::{definition, FailingStore, Fixture};

const KEY: &str = "invoice";

fn scope() -> DefinitionScope {
    DefinitionScope::new(KEY)
}

fn outlier_request() -> OutlierRequest {
    OutlierRequest {
        definition_type: Default::default(),
        scope: scope(),
        filters: Vec::new(),
    }
}

fn ctx() -> RequestContext {
    RequestContext::new("kermit")
}

/// Ten instances:
/// - approve: 9 x 100ms and 1 x 10000ms
/// - ship: 8 x 10ms and 2 x 1000ms
/// - review: always 50ms
fn skewed_fixture() -> Fixture {
    let records = (0..10)
        .map(|i| {
            ProcessInstanceRecord::new(format!("i-{i}"), KEY)
                .with_flow_node("approve", if i == 9 { 10_000 } else { 100 })
                .with_flow_node("ship", if i < 2 { 1_000 } else { 10 })
                .with_flow_node("review", 50)
        })
        .collect();
    Fixture::new(
        &[definition(KEY, &[("approve", "ship"), ("ship", "review")])],
        records,
    )
}

/// `slow` instances at 10000ms and `fast` at 100ms, tagged with `region`
/// by the given closures.
fn term_fixture(
    slow: usize,
    fast: usize,
    slow_region: impl Fn(usize) -> &'static str,
    fast_region: impl Fn(usize) -> &'static str,
) -> Fixture {
    let records = term_records(slow, fast, slow_region, fast_region);
    Fixture::new(&[definition(KEY, &[("start", "approve")])], records)
}

fn term_records(
    slow: usize,
    fast: usize,
    slow_region: impl Fn(usize) -> &'static str,
    fast_region: impl Fn(usize) -> &'static str,
) -> Vec<ProcessInstanceRecord> {
    let mut records = Vec::new();
    for i in 0..slow {
        records.push(
            ProcessInstanceRecord::new(format!("slow-{i}"), KEY)
                .with_flow_node("approve", 10_000)
                .with_variable("region", slow_region(i)),
        );
    }
    for i in 0..fast {
        records.push(
            ProcessInstanceRecord::new(format!("fast-{i}"), KEY)
                .with_flow_node("approve", 100)
                .with_variable("region", fast_region(i)),
        );
    }
    records
}

fn region() -> StaticVariableNames {
    StaticVariableNames(vec!["region".to_string()])
}

// ============================================================================
// Findings
// ============================================================================

#[test]
fn test_single_slow_execution_is_a_higher_outlier() {
    let fixture = skewed_fixture();
    let config = AnalysisConfig::default();
    let variables = region();
    let analyzer = OutlierAnalyzer::new(fixture.services(&AllowAll, &variables), &config);

    let findings = analyzer.flow_node_outlier_map(&ctx(), &outlier_request()).unwrap();

    let approve = &findings["approve"];
    assert!(approve.lower_outlier.is_none());
    let higher = approve.higher_outlier.expect("higher outlier");
    assert_eq!(higher.count, 1);
    assert!((higher.bound_value - 4060.0).abs() < 1e-6);
    assert!((higher.percentage - 0.1).abs() < 1e-12);
    assert!((higher.relation - 10_000.0 / 1_090.0).abs() < 1e-9);
    assert_eq!(approve.total_count, 10);
}

#[test]
fn test_zero_deviation_nodes_are_left_out() {
    let fixture = skewed_fixture();
    let config = AnalysisConfig::default();
    let variables = region();
    let analyzer = OutlierAnalyzer::new(fixture.services(&AllowAll, &variables), &config);

    let findings = analyzer.flow_node_outlier_map(&ctx(), &outlier_request()).unwrap();
    assert!(!findings.contains_key("review"));
    assert_eq!(findings.keys().collect::<Vec<_>>(), vec!["approve", "ship"]);
}

#[test]
fn test_heat_is_normalized_across_nodes() {
    let fixture = skewed_fixture();
    let config = AnalysisConfig::default();
    let variables = region();
    let analyzer = OutlierAnalyzer::new(fixture.services(&AllowAll, &variables), &config);

    let findings = analyzer.flow_node_outlier_map(&ctx(), &outlier_request()).unwrap();
    let heat: f64 = findings.values().map(|f| f.heat).sum();
    assert!((heat - 1.0).abs() < 1e-12);
    assert!((findings["ship"].heat - 2.0 / 3.0).abs() < 1e-12);
    assert!((findings["ship"].higher_outlier_heat - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(findings["ship"].lower_outlier_heat, 0.0);
}

#[test]
fn test_findings_require_access() {
    let fixture = skewed_fixture();
    let config = AnalysisConfig::default();
    let variables = region();
    let policy = TenantAccessPolicy::new();
    let analyzer = OutlierAnalyzer::new(fixture.services(&policy, &variables), &config);

    let err = analyzer
        .flow_node_outlier_map(&ctx(), &outlier_request())
        .unwrap_err();
    assert!(matches!(err, Error::AccessDenied { .. }));
    assert_eq!(fixture.store.total_queries(), 0);
}

// ============================================================================
// Duration chart
// ============================================================================

#[test]
fn test_chart_tags_outlier_buckets() {
    let fixture = skewed_fixture();
    let config = AnalysisConfig::default();
    let variables = region();
    let analyzer = OutlierAnalyzer::new(fixture.services(&AllowAll, &variables), &config);

    let chart = analyzer
        .count_by_duration_chart(&ctx(), &FlowNodeOutlierRequest::new(scope(), "approve"))
        .unwrap();

    // interval = ceil((10000 - 100) / 80) = 124
    assert_eq!(chart.len(), 81);
    assert_eq!(chart.iter().map(|e| e.value).sum::<u64>(), 10);
    assert_eq!((chart[0].key, chart[0].value, chart[0].outlier), (0.0, 9, false));
    let last = chart.last().unwrap();
    assert_eq!((last.key, last.value, last.outlier), (9920.0, 1, true));
}

#[test]
fn test_chart_bound_override_per_side() {
    let fixture = skewed_fixture();
    let config = AnalysisConfig::default();
    let variables = region();
    let analyzer = OutlierAnalyzer::new(fixture.services(&AllowAll, &variables), &config);

    let request = FlowNodeOutlierRequest::new(scope(), "approve").with_bounds(Some(200.0), None);
    let chart = analyzer.count_by_duration_chart(&ctx(), &request).unwrap();

    // Lower edge 0 now lies below the overridden lower bound; the computed
    // upper bound still applies.
    assert!(chart[0].outlier);
    assert!(!chart[10].outlier);
    assert!(chart.last().unwrap().outlier);
}

#[test]
fn test_chart_of_unknown_node_is_empty() {
    let fixture = skewed_fixture();
    let config = AnalysisConfig::default();
    let variables = region();
    let analyzer = OutlierAnalyzer::new(fixture.services(&AllowAll, &variables), &config);

    let chart = analyzer
        .count_by_duration_chart(&ctx(), &FlowNodeOutlierRequest::new(scope(), "archive"))
        .unwrap();
    assert!(chart.is_empty());
}

// ============================================================================
// Variable terms
// ============================================================================

#[test]
fn test_over_represented_term_is_significant() {
    // All 20 slow instances are emea; 20 of 180 fast ones are.
    let fixture = term_fixture(20, 180, |_| "emea", |i| if i < 20 { "emea" } else { "apac" });
    let config = AnalysisConfig::default();
    let variables = region();
    let analyzer = OutlierAnalyzer::new(fixture.services(&AllowAll, &variables), &config);

    let request = FlowNodeOutlierRequest::new(scope(), "approve").with_bounds(None, Some(5_000.0));
    let terms = analyzer
        .significant_outlier_variable_terms(&ctx(), &request)
        .unwrap();

    assert_eq!(terms.len(), 1);
    let term = &terms[0];
    assert_eq!(
        (term.variable_name.as_str(), term.variable_term.as_str()),
        ("region", "emea")
    );
    assert_eq!(term.instance_count, 20);
    assert!((term.outlier_ratio - 1.0).abs() < 1e-12);
    assert!((term.non_outlier_ratio - 20.0 / 180.0).abs() < 1e-12);
    assert!((term.outlier_to_all_ratio - 40.0 / 200.0).abs() < 1e-12);
}

#[test]
fn test_equally_common_term_is_not_retained() {
    let alternate = |i: usize| if i % 2 == 0 { "emea" } else { "apac" };
    let fixture = term_fixture(20, 180, alternate, alternate);
    let config = AnalysisConfig::default();
    let variables = region();
    let analyzer = OutlierAnalyzer::new(fixture.services(&AllowAll, &variables), &config);

    let request = FlowNodeOutlierRequest::new(scope(), "approve").with_bounds(None, Some(5_000.0));
    let terms = analyzer
        .significant_outlier_variable_terms(&ctx(), &request)
        .unwrap();
    assert!(terms.is_empty());
}

#[test]
fn test_empty_outlier_population_stops_after_one_query() {
    let fixture = term_fixture(0, 50, |_| "emea", |_| "emea");
    let config = AnalysisConfig::default();
    let variables = region();
    let analyzer = OutlierAnalyzer::new(fixture.services(&AllowAll, &variables), &config);

    let request = FlowNodeOutlierRequest::new(scope(), "approve").with_bounds(None, Some(5_000.0));
    let terms = analyzer
        .significant_outlier_variable_terms(&ctx(), &request)
        .unwrap();

    assert!(terms.is_empty());
    assert_eq!(fixture.store.total_queries(), 1);
}

#[test]
fn test_terms_without_bounds_fail_before_any_query() {
    let fixture = term_fixture(20, 180, |_| "emea", |_| "apac");
    let config = AnalysisConfig::default();
    let variables = region();
    let policy = TenantAccessPolicy::new();
    let analyzer = OutlierAnalyzer::new(fixture.services(&policy, &variables), &config);

    let err = analyzer
        .significant_outlier_variable_terms(&ctx(), &FlowNodeOutlierRequest::new(scope(), "approve"))
        .unwrap_err();

    // Validation wins over the access check.
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(fixture.store.total_queries(), 0);
}

#[test]
fn test_rare_terms_fall_below_the_doc_count_floor() {
    // Only 2 slow instances carry the term, under the floor of 3.
    let fixture = term_fixture(20, 180, |i| if i < 2 { "emea" } else { "apac" }, |_| "nordics");
    let config = AnalysisConfig::default();
    let variables = region();
    let analyzer = OutlierAnalyzer::new(fixture.services(&AllowAll, &variables), &config);

    let request = FlowNodeOutlierRequest::new(scope(), "approve").with_bounds(None, Some(5_000.0));
    let terms = analyzer
        .significant_outlier_variable_terms(&ctx(), &request)
        .unwrap();
    assert!(terms.iter().all(|t| t.variable_term != "emea"));
    assert!(terms.iter().any(|t| t.variable_term == "apac"));
}

#[test]
fn test_decision_terms_use_decision_variable_names() {
    let mut store = InMemoryInstanceStore::default();
    for record in term_records(20, 180, |_| "emea", |i| if i < 20 { "emea" } else { "apac" }) {
        store.insert_typed(DefinitionType::Decision, record);
    }
    let definitions = DocumentDefinitionService::new();
    let config = AnalysisConfig::default();
    // The store itself lists the recorded variable names.
    let services = AnalysisServices {
        definitions: &definitions,
        store: &store,
        access: &AllowAll,
        variables: &store,
    };
    let mut request =
        FlowNodeOutlierRequest::new(scope(), "approve").with_bounds(None, Some(5_000.0));
    request.definition_type = DefinitionType::Decision;

    let terms = OutlierAnalyzer::new(services, &config)
        .significant_outlier_variable_terms(&ctx(), &request)
        .unwrap();

    assert_eq!(terms.len(), 1);
    assert_eq!(terms[0].variable_name, "region");
    assert_eq!(terms[0].variable_term, "emea");
    assert_eq!(terms[0].instance_count, 20);
}

// ============================================================================
// Missing index and store failures
// ============================================================================

#[test]
fn test_missing_index_yields_empty_results() {
    let fixture = Fixture::new(&[], Vec::new());
    let config = AnalysisConfig::default();
    let variables = region();
    let analyzer = OutlierAnalyzer::new(fixture.services(&AllowAll, &variables), &config);
    let flow_node =
        FlowNodeOutlierRequest::new(scope(), "approve").with_bounds(Some(10.0), Some(5_000.0));

    assert!(analyzer
        .flow_node_outlier_map(&ctx(), &outlier_request())
        .unwrap()
        .is_empty());
    assert!(analyzer
        .count_by_duration_chart(&ctx(), &flow_node)
        .unwrap()
        .is_empty());
    assert!(analyzer
        .significant_outlier_variable_terms(&ctx(), &flow_node)
        .unwrap()
        .is_empty());
}

#[test]
fn test_transport_failure_is_fatal_for_every_operation() {
    let fixture = skewed_fixture();
    let failing = FailingStore(StoreError::Transport("connection reset".into()));
    let config = AnalysisConfig::default();
    let variables = region();
    let mut services = fixture.services(&AllowAll, &variables);
    services.store = &failing;
    let analyzer = OutlierAnalyzer::new(services, &config);
    let flow_node = FlowNodeOutlierRequest::new(scope(), "approve").with_bounds(None, Some(5_000.0));

    let errors = [
        analyzer
            .flow_node_outlier_map(&ctx(), &outlier_request())
            .unwrap_err(),
        analyzer
            .count_by_duration_chart(&ctx(), &flow_node)
            .unwrap_err(),
        analyzer
            .significant_outlier_variable_terms(&ctx(), &flow_node)
            .unwrap_err(),
    ];
    for err in errors {
        assert!(matches!(err, Error::Store(StoreError::Transport(_))), "{err}");
    }
}
