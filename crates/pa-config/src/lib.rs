//! Process analytics configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for analysis.json
//! - Config resolution (CLI → env → XDG → system → defaults)
//! - Semantic validation

pub mod analysis;
pub mod resolve;
pub mod validate;

pub use analysis::{AnalysisConfig, OutlierConfig, ScrollConfig};
pub use resolve::{load_config, resolve_config, ConfigSource, LoadedConfig};
pub use validate::{validate_analysis, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
