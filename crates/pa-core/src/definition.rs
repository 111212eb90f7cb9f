//! Definition service contract and process graph resolution.
//!
//! A definition service stores definition documents whose field names come
//! from the [`DefinitionFields`] table of the definition type. The resolver
//! walks the scope's tenants in order and falls back to the shared
//! definition; a missing definition is `Ok(None)`, never an error.

use pa_common::{DefinitionFields, DefinitionScope, DefinitionType, Result, VersionSelector};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::debug;

use crate::graph::{GraphDescription, ProcessGraph};

/// Source of definition graph descriptions.
pub trait DefinitionService: Send + Sync {
    /// Graph description of the latest selected version of `key` owned by
    /// `tenant_id` (`None` = shared), if one exists.
    fn graph_description(
        &self,
        definition_type: DefinitionType,
        key: &str,
        versions: &VersionSelector,
        tenant_id: Option<&str>,
    ) -> Result<Option<String>>;
}

/// A definition as it appears in a dataset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DefinitionRecord {
    #[serde(default)]
    pub definition_type: DefinitionType,
    pub key: String,
    pub version: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub graph: GraphDescription,
}

const TENANT_FIELD: &str = "tenantId";

/// Definition service over JSON documents held in memory.
#[derive(Debug, Default, Clone)]
pub struct DocumentDefinitionService {
    documents: Vec<(DefinitionType, Map<String, Value>)>,
}

impl DocumentDefinitionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition as a document keyed by its type's field table.
    pub fn insert(&mut self, record: &DefinitionRecord) -> Result<()> {
        let fields = record.definition_type.fields();
        let mut document = Map::new();
        document.insert(fields.key_field.to_string(), Value::from(record.key.clone()));
        document.insert(
            fields.version_field.to_string(),
            Value::from(record.version.clone()),
        );
        document.insert(
            TENANT_FIELD.to_string(),
            record.tenant_id.clone().map_or(Value::Null, Value::from),
        );
        document.insert(
            fields.xml_field.to_string(),
            Value::from(serde_json::to_string(&record.graph)?),
        );
        self.documents.push((record.definition_type, document));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn text<'a>(document: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    document.get(field).and_then(Value::as_str)
}

/// Numeric versions compare numerically, anything else lexically.
fn compare_versions(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

impl DefinitionService for DocumentDefinitionService {
    fn graph_description(
        &self,
        definition_type: DefinitionType,
        key: &str,
        versions: &VersionSelector,
        tenant_id: Option<&str>,
    ) -> Result<Option<String>> {
        let fields: &DefinitionFields = definition_type.fields();

        let latest = self
            .documents
            .iter()
            .filter(|(ty, _)| *ty == definition_type)
            .map(|(_, doc)| doc)
            .filter(|doc| text(doc, fields.key_field) == Some(key))
            .filter(|doc| text(doc, TENANT_FIELD) == tenant_id)
            .filter_map(|doc| text(doc, fields.version_field).map(|v| (v, doc)))
            .filter(|(version, _)| versions.matches(version))
            .max_by(|(a, _), (b, _)| compare_versions(a, b));

        Ok(latest.and_then(|(_, doc)| text(doc, fields.xml_field).map(str::to_string)))
    }
}

/// Resolves the process graph for a definition scope.
pub struct ProcessGraphResolver<'a> {
    service: &'a dyn DefinitionService,
    definition_type: DefinitionType,
}

impl<'a> ProcessGraphResolver<'a> {
    pub fn new(service: &'a dyn DefinitionService, definition_type: DefinitionType) -> Self {
        Self {
            service,
            definition_type,
        }
    }

    /// Try each tenant of the scope in order, then the shared definition.
    ///
    /// `Ok(None)` when no definition exists; an unparsable description is
    /// `Error::InvalidGraph`.
    pub fn resolve(&self, scope: &DefinitionScope) -> Result<Option<ProcessGraph>> {
        let shared: Option<String> = None;
        let candidates = scope
            .tenant_ids
            .iter()
            .filter(|t| t.is_some())
            .chain(std::iter::once(&shared));

        for tenant in candidates {
            let description = self.service.graph_description(
                self.definition_type,
                &scope.key,
                &scope.versions,
                tenant.as_deref(),
            )?;
            if let Some(description) = description {
                debug!(
                    definition_key = %scope.key,
                    tenant = tenant.as_deref().unwrap_or("<shared>"),
                    "resolved process graph"
                );
                return ProcessGraph::from_json(&description).map(Some);
            }
        }

        debug!(definition_key = %scope.key, "no process definition found");
        Ok(None)
    }
}
