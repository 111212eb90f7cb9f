//! Error types for process analytics.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for callers deciding whether to retry a request
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Access Denied
//!   Reason: user 'kermit' may not access definition 'invoice'
//!   Fix: Ask an administrator to grant access to the definition or its tenant.
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! {
//!   "code": 10,
//!   "category": "access",
//!   "message": "user 'kermit' may not access definition 'invoice'",
//!   "recoverable": false,
//!   "context": { "user_id": "kermit", "definition_key": "invoice" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Caller may not see the requested scope.
    Access,
    /// Malformed analysis request.
    Validation,
    /// Process definition could not be interpreted.
    Definition,
    /// Instance store round-trip failed.
    Store,
    /// Configuration errors.
    Config,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Access => write!(f, "access"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Definition => write!(f, "definition"),
            ErrorCategory::Store => write!(f, "store"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Failures reported by an instance store.
///
/// `IndexNotFound` is special: the engines treat it as "nothing imported yet"
/// and answer with an empty result. Every other variant aborts the analysis.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("index not found: {index}")]
    IndexNotFound { index: String },

    #[error("store transport failure: {0}")]
    Transport(String),

    #[error("store rejected query: {0}")]
    Query(String),

    #[error("store request timed out after {millis}ms")]
    Timeout { millis: u64 },
}

impl StoreError {
    pub fn is_index_not_found(&self) -> bool {
        matches!(self, StoreError::IndexNotFound { .. })
    }
}

/// Unified error type for process analytics.
#[derive(Error, Debug)]
pub enum Error {
    // Access errors (10-19)
    #[error("user '{user_id}' may not access definition '{definition_key}'")]
    AccessDenied {
        user_id: String,
        definition_key: String,
    },

    // Validation errors (20-29)
    #[error("invalid analysis request: {0}")]
    Validation(String),

    #[error("flow node '{node_id}' does not exist in the process graph")]
    UnknownFlowNode { node_id: String },

    // Definition errors (30-39)
    #[error("invalid process graph description: {0}")]
    InvalidGraph(String),

    // Store errors (40-49)
    #[error("analysis failed: {0}")]
    Store(#[from] StoreError),

    // Configuration errors (50-59)
    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the stable error code for this error.
    ///
    /// - 10-19: Access errors
    /// - 20-29: Validation errors
    /// - 30-39: Definition errors
    /// - 40-49: Store errors
    /// - 50-59: Configuration errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::AccessDenied { .. } => 10,
            Error::Validation(_) => 20,
            Error::UnknownFlowNode { .. } => 21,
            Error::InvalidGraph(_) => 30,
            Error::Store(StoreError::IndexNotFound { .. }) => 40,
            Error::Store(StoreError::Transport(_)) => 41,
            Error::Store(StoreError::Query(_)) => 42,
            Error::Store(StoreError::Timeout { .. }) => 43,
            Error::Config(_) => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::AccessDenied { .. } => ErrorCategory::Access,
            Error::Validation(_) | Error::UnknownFlowNode { .. } => ErrorCategory::Validation,
            Error::InvalidGraph(_) => ErrorCategory::Definition,
            Error::Store(_) => ErrorCategory::Store,
            Error::Config(_) => ErrorCategory::Config,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Whether repeating the same request could succeed.
    ///
    /// The engines never retry; this is a hint for the caller.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::AccessDenied { .. } => false,
            Error::Validation(_) => false,
            Error::UnknownFlowNode { .. } => false,
            Error::InvalidGraph(_) => false,

            // Transient store conditions
            Error::Store(StoreError::Transport(_)) => true,
            Error::Store(StoreError::Timeout { .. }) => true,
            Error::Store(StoreError::Query(_)) => false,
            Error::Store(StoreError::IndexNotFound { .. }) => false,

            Error::Config(_) => true,
            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::AccessDenied { .. } => {
                "Ask an administrator to grant access to the definition or its tenant."
            }
            Error::Validation(_) => "Check the request parameters and try again.",
            Error::UnknownFlowNode { .. } => {
                "Use a flow node id from the deployed process definition version."
            }
            Error::InvalidGraph(_) => {
                "Re-deploy the process definition; its graph description could not be parsed."
            }
            Error::Store(StoreError::Timeout { .. }) => {
                "Narrow the filters or raise scroll.timeout_ms, then retry."
            }
            Error::Store(_) => "Check instance store health and retry the request.",
            Error::Config(_) => {
                "Run 'pa-core config check' to validate the analysis configuration."
            }
            Error::Io(_) => "Check that the file exists and is readable, then retry.",
            Error::Json(_) => {
                "Invalid JSON input. Check syntax with 'jq . <file>' or regenerate the file."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::AccessDenied { .. } => "Access Denied",
            Error::Validation(_) => "Invalid Request",
            Error::UnknownFlowNode { .. } => "Unknown Flow Node",
            Error::InvalidGraph(_) => "Invalid Process Graph",
            Error::Store(_) => "Analysis Failed",
            Error::Config(_) => "Configuration Error",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::AccessDenied {
                user_id,
                definition_key,
            } => {
                context.insert("user_id".to_string(), serde_json::json!(user_id));
                context.insert(
                    "definition_key".to_string(),
                    serde_json::json!(definition_key),
                );
            }
            Error::UnknownFlowNode { node_id } => {
                context.insert("node_id".to_string(), serde_json::json!(node_id));
            }
            Error::Store(StoreError::IndexNotFound { index }) => {
                context.insert("index".to_string(), serde_json::json!(index));
            }
            Error::Store(StoreError::Timeout { millis }) => {
                context.insert("timeout_ms".to_string(), serde_json::json!(millis));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
