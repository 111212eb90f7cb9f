//! Structured event definitions for logging.
//!
//! Every event carries the request id of the analysis it belongs to and the
//! stage that produced it. Timestamps come from the context's [`Clock`], so
//! tests see deterministic values.

use chrono::{DateTime, Utc};
use pa_common::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Stages of an analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Definition lookup and graph parsing.
    Resolve,
    Reachability,
    /// Count round-trips to the instance store.
    Query,
    /// Per-branch counting.
    Branch,
    /// Per flow node duration statistics.
    Stats,
    /// Outlier bound counting.
    Bounds,
    /// Heat normalization.
    Heat,
    /// Duration histogram.
    Chart,
    /// Significant variable terms.
    Terms,
    /// Composite aggregation paging.
    Scroll,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Init => "init",
            Stage::Resolve => "resolve",
            Stage::Reachability => "reachability",
            Stage::Query => "query",
            Stage::Branch => "branch",
            Stage::Stats => "stats",
            Stage::Bounds => "bounds",
            Stage::Heat => "heat",
            Stage::Chart => "chart",
            Stage::Terms => "terms",
            Stage::Scroll => "scroll",
        })
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Request lifecycle
    pub const ANALYSIS_STARTED: &str = "analysis.started";
    pub const ANALYSIS_FINISHED: &str = "analysis.finished";
    pub const ANALYSIS_FAILED: &str = "analysis.failed";
    pub const ACCESS_DENIED: &str = "analysis.access_denied";

    // Resolution
    pub const GRAPH_RESOLVED: &str = "resolve.graph_resolved";
    pub const GRAPH_MISSING: &str = "resolve.graph_missing";

    // Store round-trips
    pub const QUERY_COUNT: &str = "query.count";
    pub const INDEX_MISSING: &str = "query.index_missing";
    pub const SCROLL_PAGE: &str = "scroll.page";

    // Engines
    pub const BRANCH_COUNTED: &str = "branch.counted";
    pub const NODE_SKIPPED: &str = "stats.node_skipped";
    pub const NODE_FINDINGS: &str = "bounds.node_findings";
    pub const TERMS_EMPTY_POPULATION: &str = "terms.empty_population";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";
}

/// A structured log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,
    /// Event name (e.g. "analysis.finished").
    pub event: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub stage: Stage,
    pub message: String,
    /// Additional structured fields (stable keys).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEvent {
    /// Add a field to the event.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Per-request logging context.
#[derive(Clone)]
pub struct LogContext {
    pub request_id: String,
    pub user_id: Option<String>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogContext")
            .field("request_id", &self.request_id)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl LogContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self::with_clock(request_id, Arc::new(SystemClock))
    }

    pub fn with_clock(request_id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        LogContext {
            request_id: request_id.into(),
            user_id: None,
            clock,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Create an event with this context.
    pub fn event(
        &self,
        level: Level,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        LogEvent {
            ts: self.clock.now(),
            level,
            event: event.into(),
            request_id: self.request_id.clone(),
            user_id: self.user_id.clone(),
            stage,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn info(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Info, event, stage, message)
    }

    pub fn warn(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Warn, event, stage, message)
    }

    pub fn error(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Error, event, stage, message)
    }
}
