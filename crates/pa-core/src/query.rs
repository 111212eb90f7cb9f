//! Instance query engine.
//!
//! Turns "scope + must contain + must not contain + external filters" into a
//! conjunctive [`InstanceFilter`] and runs it against the instance store.
//! A missing index reads as "nothing imported": counts are 0 and
//! aggregations come back as `None`. Every other store failure is fatal.

use pa_common::{
    Aggregation, AggregationRequest, AggregationResponse, BucketMetric, CompositeAggregation,
    CompositeBucket, CompositeSource, DefinitionScope, DefinitionType, Error, ExternalFilter, InstanceFilter, Result,
    StoreError,
};
use pa_config::ScrollConfig;

use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::scroll::CompositePages;
use crate::store::InstanceStore;

/// A count query over one definition scope.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceQuery {
    pub scope: DefinitionScope,
    /// Each id must occur somewhere in the instance's trace.
    pub must_contain: Vec<String>,
    /// None of these ids may occur in the trace.
    pub must_not_contain: Vec<String>,
    /// Passed through verbatim.
    pub external: Vec<ExternalFilter>,
    /// Structural filters added by the engines.
    pub extra: Vec<InstanceFilter>,
}

impl InstanceQuery {
    pub fn new(scope: DefinitionScope) -> Self {
        Self {
            scope,
            must_contain: Vec::new(),
            must_not_contain: Vec::new(),
            external: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn containing<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.must_contain.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn excluding<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.must_not_contain.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_external(mut self, filters: &[ExternalFilter]) -> Self {
        self.external.extend_from_slice(filters);
        self
    }

    pub fn with_filter(mut self, filter: InstanceFilter) -> Self {
        self.extra.push(filter);
        self
    }

    /// The conjunctive filter tree of this query.
    pub fn to_filter(&self) -> InstanceFilter {
        let mut parts = vec![InstanceFilter::Scope(self.scope.clone())];
        parts.extend(self.must_contain.iter().map(InstanceFilter::contains));
        parts.extend(
            self.must_not_contain
                .iter()
                .map(|id| InstanceFilter::negate(InstanceFilter::contains(id))),
        );
        parts.extend(self.external.iter().cloned().map(InstanceFilter::External));
        parts.extend(self.extra.iter().cloned());
        InstanceFilter::all_of(parts)
    }
}

/// Runs queries against one store for one definition type.
pub struct InstanceQueryEngine<'a> {
    store: &'a dyn InstanceStore,
    definition_type: DefinitionType,
    scroll: ScrollConfig,
    log: &'a LogContext,
}

impl<'a> InstanceQueryEngine<'a> {
    pub fn new(
        store: &'a dyn InstanceStore,
        definition_type: DefinitionType,
        scroll: ScrollConfig,
        log: &'a LogContext,
    ) -> Self {
        Self {
            store,
            definition_type,
            scroll,
            log,
        }
    }

    /// Exact instance count; 0 when the scope's index does not exist.
    pub fn count(&self, query: &InstanceQuery) -> Result<u64> {
        let filter = query.to_filter();
        let count = self
            .recover_missing_index(
                self.store
                    .count(self.definition_type, &query.scope.key, &filter),
            )?
            .unwrap_or(0);
        log_event!(
            self.log,
            DEBUG,
            event_names::QUERY_COUNT,
            Stage::Query,
            "instance count",
            must_contain = query.must_contain.len(),
            must_not_contain = query.must_not_contain.len(),
            count = count
        );
        Ok(count)
    }

    /// Build an aggregation request addressed at the scope's index.
    pub fn request(
        &self,
        scope: &DefinitionScope,
        filter: InstanceFilter,
        aggregation: Aggregation,
    ) -> AggregationRequest {
        AggregationRequest {
            definition_type: self.definition_type,
            definition_key: scope.key.clone(),
            filter,
            aggregation,
            timeout_ms: Some(self.scroll.timeout_ms),
        }
    }

    /// One aggregation round-trip; `None` when the index does not exist.
    pub fn aggregate(&self, request: &AggregationRequest) -> Result<Option<AggregationResponse>> {
        self.recover_missing_index(self.store.aggregate(request))
    }

    /// Lazily page through a composite aggregation.
    pub fn scroll(
        &self,
        scope: &DefinitionScope,
        filter: InstanceFilter,
        source: CompositeSource,
        metric: BucketMetric,
    ) -> CompositePages<'a> {
        let request = self.request(
            scope,
            filter,
            Aggregation::Composite(CompositeAggregation {
                source,
                metric,
                size: self.scroll.page_size,
                after: None,
            }),
        );
        CompositePages::new(self.store, request, self.scroll.max_pages, self.log.clone())
    }

    /// Every bucket of a composite scroll; empty when the index is missing.
    pub fn scroll_buckets(
        &self,
        scope: &DefinitionScope,
        filter: InstanceFilter,
        source: CompositeSource,
        metric: BucketMetric,
    ) -> Result<Vec<CompositeBucket>> {
        let mut buckets = Vec::new();
        for page in self.scroll(scope, filter, source, metric) {
            match self.recover_missing_index(page)? {
                Some(page) => buckets.extend(page.buckets),
                None => return Ok(Vec::new()),
            }
        }
        Ok(buckets)
    }

    /// Map `IndexNotFound` to `Ok(None)` and other store errors to a fatal
    /// `Error::Store`.
    pub fn recover_missing_index<T>(
        &self,
        result: std::result::Result<T, StoreError>,
    ) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::IndexNotFound { index }) => {
                log_event!(
                    self.log,
                    WARN,
                    event_names::INDEX_MISSING,
                    Stage::Query,
                    "instance index missing, treating scope as empty",
                    index = index.as_str()
                );
                Ok(None)
            }
            Err(e) => Err(Error::Store(e)),
        }
    }
}
