//! Analysis configuration types (analysis.json).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::validate::ValidationError;

/// Top-level analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    pub schema_version: String,
    pub outlier: OutlierConfig,
    pub scroll: ScrollConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            outlier: OutlierConfig::default(),
            scroll: ScrollConfig::default(),
        }
    }
}

/// Outlier detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OutlierConfig {
    /// k in `mean ± k·σ`.
    pub std_dev_multiplier: f64,
    /// Number of buckets the duration histogram aims for.
    pub chart_target_points: u32,
    /// Chi-square significance level α for variable terms.
    pub significance_level: f64,
    /// Terms seen in fewer outlier instances are ignored.
    pub min_term_doc_count: u64,
    /// Top terms kept per variable name.
    pub max_terms_per_variable: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            std_dev_multiplier: 1.0,
            chart_target_points: 80,
            significance_level: 0.001,
            min_term_doc_count: 3,
            max_terms_per_variable: 10,
        }
    }
}

/// Composite aggregation pagination parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScrollConfig {
    /// Buckets per page.
    pub page_size: usize,
    /// Per page round-trip timeout handed to the store.
    pub timeout_ms: u64,
    /// Stop after this many pages.
    pub max_pages: Option<usize>,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            page_size: 10_000,
            timeout_ms: 60_000,
            max_pages: None,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a JSON string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }
}
