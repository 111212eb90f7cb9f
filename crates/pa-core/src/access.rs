//! Authorization capability consulted once per analysis request.

use pa_common::DefinitionScope;
use std::collections::{HashMap, HashSet};

/// Decides whether a user may see a definition scope.
pub trait AccessPolicy: Send + Sync {
    fn can_access(&self, user_id: &str, scope: &DefinitionScope) -> bool;
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn can_access(&self, _user_id: &str, _scope: &DefinitionScope) -> bool {
        true
    }
}

/// Per-user tenant grants.
///
/// A scope is accessible when every tenant it names is granted; a scope with
/// no tenants needs the shared (`None`) grant.
#[derive(Debug, Clone, Default)]
pub struct TenantAccessPolicy {
    grants: HashMap<String, HashSet<Option<String>>>,
}

impl TenantAccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, user_id: impl Into<String>, tenant_id: Option<&str>) -> Self {
        self.grants
            .entry(user_id.into())
            .or_default()
            .insert(tenant_id.map(str::to_string));
        self
    }
}

impl AccessPolicy for TenantAccessPolicy {
    fn can_access(&self, user_id: &str, scope: &DefinitionScope) -> bool {
        let Some(granted) = self.grants.get(user_id) else {
            return false;
        };
        if scope.tenant_ids.is_empty() {
            return granted.contains(&None);
        }
        scope.tenant_ids.iter().all(|t| granted.contains(t))
    }
}
