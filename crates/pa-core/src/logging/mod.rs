//! Structured logging for pa-core.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for pipelines
//!
//! # Usage
//!
//! ```ignore
//! use pa_core::logging::{init_logging, LogConfig, LogContext, Stage, event_names};
//!
//! init_logging(&LogConfig::from_env(None, None));
//!
//! let ctx = LogContext::new(generate_request_id()).with_user("kermit");
//! log_event!(ctx, INFO, event_names::ANALYSIS_STARTED, Stage::Init, "branch analysis");
//! ```
//!
//! stdout is reserved for result payloads; all log output goes to stderr.

pub mod config;
pub mod events;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, LogEvent, Stage};

use std::io::IsTerminal;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem.
///
/// Call once at startup. `RUST_LOG` directives, when present, replace the
/// configured level entirely. A second call is a no-op.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(LevelFilter::from(config.level).to_string()));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Human => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                registry.with(layer).try_init()
            } else {
                registry.with(layer.without_time()).try_init()
            }
        }
        LogFormat::Jsonl => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    // Already initialized (tests, embedding hosts): keep the existing subscriber.
    let _ = result;
}

/// Generate a unique request ID for one analysis.
pub fn generate_request_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("req-{}", &uuid[..12])
}

/// Emit a tracing event carrying the context's request id and a stage.
///
/// ```ignore
/// log_event!(ctx, DEBUG, event_names::QUERY_COUNT, Stage::Query, "count", count = 12);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, DEBUG, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::debug!(
            event = $event,
            request_id = %$ctx.request_id,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::info!(
            event = $event,
            request_id = %$ctx.request_id,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::warn!(
            event = $event,
            request_id = %$ctx.request_id,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
}

/// Forward a [`LogEvent`] to the tracing subscriber at its own level.
pub fn emit(event: &LogEvent) {
    let fields = serde_json::Value::from(
        event
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<serde_json::Map<_, _>>(),
    );
    match event.level {
        Level::Debug => tracing::debug!(
            event = %event.event,
            request_id = %event.request_id,
            stage = %event.stage,
            fields = %fields,
            "{}",
            event.message
        ),
        Level::Info => tracing::info!(
            event = %event.event,
            request_id = %event.request_id,
            stage = %event.stage,
            fields = %fields,
            "{}",
            event.message
        ),
        Level::Warn => tracing::warn!(
            event = %event.event,
            request_id = %event.request_id,
            stage = %event.stage,
            fields = %fields,
            "{}",
            event.message
        ),
        Level::Error => tracing::error!(
            event = %event.event,
            request_id = %event.request_id,
            stage = %event.stage,
            fields = %fields,
            "{}",
            event.message
        ),
    }
}
