//! Variable name lookup used to seed outlier term analysis.

use pa_common::{DefinitionScope, DefinitionType, Result};

/// Lists the variable names recorded for a definition scope.
pub trait VariableNameService: Send + Sync {
    fn variable_names(
        &self,
        definition_type: DefinitionType,
        scope: &DefinitionScope,
    ) -> Result<Vec<String>>;
}

/// A fixed list of names, regardless of scope.
#[derive(Debug, Clone, Default)]
pub struct StaticVariableNames(pub Vec<String>);

impl VariableNameService for StaticVariableNames {
    fn variable_names(&self, _: DefinitionType, _: &DefinitionScope) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}
