//! Instance store contract and the in-memory reference store.

pub mod dataset;
pub mod memory;

pub use dataset::{AccessGrant, Dataset};
pub use memory::InMemoryInstanceStore;

use pa_common::{AggregationRequest, AggregationResponse, DefinitionType, InstanceFilter, StoreError};

/// Read-only query surface over recorded process instances.
///
/// An index exists per definition key once anything was imported for it;
/// queries against a missing index fail with `StoreError::IndexNotFound`.
pub trait InstanceStore: Send + Sync {
    /// Exact number of instances matching `filter`.
    fn count(
        &self,
        definition_type: DefinitionType,
        definition_key: &str,
        filter: &InstanceFilter,
    ) -> Result<u64, StoreError>;

    /// Execute one aggregation round-trip.
    fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResponse, StoreError>;
}
