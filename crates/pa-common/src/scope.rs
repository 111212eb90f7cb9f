//! Definition scope and per-definition-type field tables.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of definition an analysis targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionType {
    #[default]
    Process,
    Decision,
}

/// Field names and index naming for one definition type.
///
/// Selected once per request via [`DefinitionType::fields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefinitionFields {
    pub key_field: &'static str,
    pub version_field: &'static str,
    pub xml_field: &'static str,
    pub index_prefix: &'static str,
}

const PROCESS_FIELDS: DefinitionFields = DefinitionFields {
    key_field: "processDefinitionKey",
    version_field: "processDefinitionVersion",
    xml_field: "bpmn20Xml",
    index_prefix: "process-instance",
};

const DECISION_FIELDS: DefinitionFields = DefinitionFields {
    key_field: "decisionDefinitionKey",
    version_field: "decisionDefinitionVersion",
    xml_field: "dmn10Xml",
    index_prefix: "decision-instance",
};

impl DefinitionType {
    pub fn fields(self) -> &'static DefinitionFields {
        match self {
            DefinitionType::Process => &PROCESS_FIELDS,
            DefinitionType::Decision => &DECISION_FIELDS,
        }
    }
}

impl DefinitionFields {
    /// Name of the instance index holding instances of `definition_key`.
    pub fn index_name(&self, definition_key: &str) -> String {
        format!("{}-{}", self.index_prefix, definition_key.to_lowercase())
    }
}

/// Which definition versions a scope covers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VersionSelector {
    #[default]
    All,
    Specific(Vec<String>),
}

impl VersionSelector {
    pub fn matches(&self, version: &str) -> bool {
        match self {
            VersionSelector::All => true,
            VersionSelector::Specific(versions) => versions.iter().any(|v| v == version),
        }
    }
}

/// Definition key, version selection, and tenants an analysis covers.
///
/// `tenant_ids` is ordered; `None` stands for the shared (tenant-less)
/// definition. An empty list means the shared definition only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DefinitionScope {
    pub key: String,
    #[serde(default)]
    pub versions: VersionSelector,
    #[serde(default)]
    pub tenant_ids: Vec<Option<String>>,
}

impl DefinitionScope {
    /// All versions of the shared definition `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            versions: VersionSelector::All,
            tenant_ids: Vec::new(),
        }
    }

    pub fn with_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.versions = VersionSelector::Specific(versions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_tenants<I>(mut self, tenant_ids: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        self.tenant_ids = tenant_ids.into_iter().collect();
        self
    }

    pub fn matches_tenant(&self, tenant_id: Option<&str>) -> bool {
        if self.tenant_ids.is_empty() {
            return tenant_id.is_none();
        }
        self.tenant_ids.iter().any(|t| t.as_deref() == tenant_id)
    }

    /// Whether an instance with these coordinates falls inside the scope.
    pub fn matches(&self, key: &str, version: &str, tenant_id: Option<&str>) -> bool {
        self.key == key && self.versions.matches(version) && self.matches_tenant(tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_table_per_type() {
        assert_eq!(DefinitionType::Process.fields().xml_field, "bpmn20Xml");
        assert_eq!(
            DefinitionType::Decision.fields().key_field,
            "decisionDefinitionKey"
        );
        assert_eq!(
            DefinitionType::Process.fields().index_name("Invoice"),
            "process-instance-invoice"
        );
    }

    #[test]
    fn empty_tenant_list_is_shared_only() {
        let scope = DefinitionScope::new("invoice");
        assert!(scope.matches("invoice", "7", None));
        assert!(!scope.matches("invoice", "7", Some("acme")));
        assert!(!scope.matches("order", "7", None));
    }

    #[test]
    fn specific_versions_and_tenants() {
        let scope = DefinitionScope::new("invoice")
            .with_versions(["1", "2"])
            .with_tenants([Some("acme".to_string()), None]);

        assert!(scope.matches("invoice", "2", Some("acme")));
        assert!(scope.matches("invoice", "1", None));
        assert!(!scope.matches("invoice", "3", None));
        assert!(!scope.matches("invoice", "1", Some("globex")));
    }

    #[test]
    fn scope_json_defaults() {
        let scope: DefinitionScope = serde_json::from_str(r#"{"key":"invoice"}"#).unwrap();
        assert_eq!(scope, DefinitionScope::new("invoice"));

        let scope: DefinitionScope =
            serde_json::from_str(r#"{"key":"invoice","versions":{"specific":["4"]},"tenant_ids":["acme",null]}"#)
                .unwrap();
        assert!(scope.matches("invoice", "4", None));
    }
}
