//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::analysis::AnalysisConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

fn invalid(field: &str, message: String) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

/// Validate analysis configuration semantically.
pub fn validate_analysis(config: &AnalysisConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    let outlier = &config.outlier;
    if !outlier.std_dev_multiplier.is_finite() || outlier.std_dev_multiplier <= 0.0 {
        return Err(invalid(
            "outlier.std_dev_multiplier",
            format!("Must be finite and > 0, got {}", outlier.std_dev_multiplier),
        ));
    }
    if !(outlier.significance_level > 0.0 && outlier.significance_level <= 0.5) {
        return Err(invalid(
            "outlier.significance_level",
            format!("Must be in (0, 0.5], got {}", outlier.significance_level),
        ));
    }
    if outlier.chart_target_points == 0 {
        return Err(invalid(
            "outlier.chart_target_points",
            "Must be >= 1".to_string(),
        ));
    }
    if outlier.min_term_doc_count == 0 {
        return Err(invalid(
            "outlier.min_term_doc_count",
            "Must be >= 1".to_string(),
        ));
    }
    if outlier.max_terms_per_variable == 0 {
        return Err(invalid(
            "outlier.max_terms_per_variable",
            "Must be >= 1".to_string(),
        ));
    }

    let scroll = &config.scroll;
    if scroll.page_size == 0 {
        return Err(invalid("scroll.page_size", "Must be >= 1".to_string()));
    }
    if scroll.timeout_ms == 0 {
        return Err(invalid("scroll.timeout_ms", "Must be > 0".to_string()));
    }
    if scroll.max_pages == Some(0) {
        return Err(invalid(
            "scroll.max_pages",
            "Must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}
