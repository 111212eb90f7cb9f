//! Fixtures shared by the no-mock integration tests.
//!
//! Everything here runs against the real in-memory store; the wrappers only
//! observe or fail round-trips, they never fabricate answers.

#![allow(dead_code)]
// Each test binary uses a different subset of the helpers.

use pa_common::{
    AggregationRequest, AggregationResponse, DefinitionType, InstanceFilter, ProcessInstanceRecord,
    StoreError,
};
use pa_core::definition::DefinitionRecord;
use pa_core::graph::{FlowDescription, GraphDescription, NodeDescription, NodeKind};
use pa_core::{
    AccessPolicy, AnalysisServices, DocumentDefinitionService, InMemoryInstanceStore,
    InstanceStore, VariableNameService,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Graph from `(source, target)` pairs; ids starting with `gw` are gateways.
pub fn graph(flows: &[(&str, &str)]) -> GraphDescription {
    let mut ids: Vec<&str> = Vec::new();
    for (source, target) in flows {
        for id in [*source, *target] {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    GraphDescription {
        nodes: ids
            .into_iter()
            .map(|id| NodeDescription {
                id: id.to_string(),
                kind: if id.starts_with("gw") {
                    NodeKind::Gateway
                } else {
                    NodeKind::Task
                },
                name: None,
            })
            .collect(),
        flows: flows
            .iter()
            .map(|(source, target)| FlowDescription {
                id: None,
                source: source.to_string(),
                target: target.to_string(),
            })
            .collect(),
    }
}

pub fn definition(key: &str, flows: &[(&str, &str)]) -> DefinitionRecord {
    DefinitionRecord {
        definition_type: DefinitionType::Process,
        key: key.to_string(),
        version: "1".to_string(),
        tenant_id: None,
        graph: graph(flows),
    }
}

/// `n` instances of `key` that executed `trace`.
pub fn instances(key: &str, prefix: &str, n: usize, trace: &[&str]) -> Vec<ProcessInstanceRecord> {
    (0..n)
        .map(|i| ProcessInstanceRecord::new(format!("{prefix}-{i}"), key).with_trace(trace.iter().copied()))
        .collect()
}

/// Instance store wrapper counting round-trips.
#[derive(Debug, Default)]
pub struct CountingStore {
    pub inner: InMemoryInstanceStore,
    counts: AtomicUsize,
    aggregations: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: InMemoryInstanceStore) -> Self {
        Self {
            inner,
            counts: AtomicUsize::new(0),
            aggregations: AtomicUsize::new(0),
        }
    }

    pub fn count_queries(&self) -> usize {
        self.counts.load(Ordering::SeqCst)
    }

    pub fn aggregation_queries(&self) -> usize {
        self.aggregations.load(Ordering::SeqCst)
    }

    pub fn total_queries(&self) -> usize {
        self.count_queries() + self.aggregation_queries()
    }
}

impl InstanceStore for CountingStore {
    fn count(
        &self,
        definition_type: DefinitionType,
        definition_key: &str,
        filter: &InstanceFilter,
    ) -> Result<u64, StoreError> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        self.inner.count(definition_type, definition_key, filter)
    }

    fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResponse, StoreError> {
        self.aggregations.fetch_add(1, Ordering::SeqCst);
        self.inner.aggregate(request)
    }
}

/// Store whose every round-trip fails with the same error.
#[derive(Debug)]
pub struct FailingStore(pub StoreError);

impl InstanceStore for FailingStore {
    fn count(&self, _: DefinitionType, _: &str, _: &InstanceFilter) -> Result<u64, StoreError> {
        Err(self.0.clone())
    }

    fn aggregate(&self, _: &AggregationRequest) -> Result<AggregationResponse, StoreError> {
        Err(self.0.clone())
    }
}

/// Definitions plus a counting store over the given instances.
pub struct Fixture {
    pub definitions: DocumentDefinitionService,
    pub store: CountingStore,
}

impl Fixture {
    pub fn new(definitions: &[DefinitionRecord], records: Vec<ProcessInstanceRecord>) -> Self {
        let mut service = DocumentDefinitionService::new();
        let mut store = InMemoryInstanceStore::default();
        for record in definitions {
            service.insert(record).unwrap();
            store.create_index(record.definition_type, &record.key);
        }
        store.extend(records);
        Self {
            definitions: service,
            store: CountingStore::new(store),
        }
    }

    pub fn services<'a>(
        &'a self,
        access: &'a dyn AccessPolicy,
        variables: &'a dyn VariableNameService,
    ) -> AnalysisServices<'a> {
        AnalysisServices {
            definitions: &self.definitions,
            store: &self.store,
            access,
            variables,
        }
    }
}
