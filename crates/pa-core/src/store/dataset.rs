//! Dataset files: definitions plus recorded instances in one JSON document.

use pa_common::{Clock, ProcessInstanceRecord, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::memory::InMemoryInstanceStore;
use crate::access::{AccessPolicy, AllowAll, TenantAccessPolicy};
use crate::definition::{DefinitionRecord, DocumentDefinitionService};

/// One user's access to one tenant; `None` is the shared definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AccessGrant {
    pub user_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Dataset {
    #[serde(default)]
    pub definitions: Vec<DefinitionRecord>,
    #[serde(default)]
    pub instances: Vec<ProcessInstanceRecord>,
    /// Without grants every user sees everything.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grants: Vec<AccessGrant>,
}

impl Dataset {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn access_policy(&self) -> Box<dyn AccessPolicy> {
        if self.grants.is_empty() {
            return Box::new(AllowAll);
        }
        let policy = self.grants.iter().fold(TenantAccessPolicy::new(), |policy, grant| {
            policy.grant(&grant.user_id, grant.tenant_id.as_deref())
        });
        Box::new(policy)
    }

    /// Load into a definition service and an instance store.
    ///
    /// Every definition key gets an index, even without instances, so an
    /// imported-but-empty process reads as zero counts.
    pub fn into_services(
        self,
        clock: Arc<dyn Clock>,
    ) -> Result<(DocumentDefinitionService, InMemoryInstanceStore)> {
        let mut definitions = DocumentDefinitionService::new();
        let mut store = InMemoryInstanceStore::new(clock);
        for record in &self.definitions {
            definitions.insert(record)?;
            store.create_index(record.definition_type, &record.key);
        }
        store.extend(self.instances);
        Ok((definitions, store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InstanceStore;
    use pa_common::{DefinitionType, InstanceFilter, SystemClock};

    #[test]
    fn loads_definitions_and_instances() {
        let json = r#"{
            "definitions": [{
                "key": "invoice",
                "version": "1",
                "graph": {"nodes": [{"id": "start", "kind": "event"}], "flows": []}
            }, {
                "key": "order",
                "version": "1",
                "graph": {"nodes": [{"id": "start", "kind": "event"}]}
            }],
            "instances": [{
                "id": "i-1",
                "definition_key": "invoice",
                "definition_version": "1",
                "state": "completed",
                "start_date": "2026-01-01T00:00:00Z",
                "flow_nodes": [{"activity_id": "start", "duration_millis": 0}]
            }]
        }"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        let (definitions, store) = dataset.into_services(Arc::new(SystemClock)).unwrap();

        assert_eq!(definitions.len(), 2);
        assert_eq!(store.instance_count(), 1);
        assert_eq!(
            store
                .count(DefinitionType::Process, "order", &InstanceFilter::All)
                .unwrap(),
            0
        );
    }

    #[test]
    fn grants_build_a_tenant_policy() {
        let scope = pa_common::DefinitionScope::new("invoice");
        assert!(Dataset::default().access_policy().can_access("anyone", &scope));

        let dataset = Dataset {
            grants: vec![AccessGrant {
                user_id: "kermit".into(),
                tenant_id: None,
            }],
            ..Dataset::default()
        };
        let policy = dataset.access_policy();
        assert!(policy.can_access("kermit", &scope));
        assert!(!policy.can_access("gonzo", &scope));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Dataset::from_file(Path::new("/nonexistent/dataset.json")).unwrap_err();
        assert!(matches!(err, pa_common::Error::Io(_)));
    }
}
