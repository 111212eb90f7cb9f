//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI arguments → environment variables → XDG paths →
//! system config → defaults.

use std::path::{Path, PathBuf};

use crate::analysis::AnalysisConfig;
use crate::validate::{validate_analysis, ValidationResult};

/// Where a configuration file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/process-analytics/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "PA_ANALYSIS_CONFIG";
pub const ENV_CONFIG_DIR: &str = "PA_CONFIG_DIR";

/// Standard config file name.
const CONFIG_FILENAME: &str = "analysis.json";

/// Application name for XDG directories.
const APP_NAME: &str = "process-analytics";

/// Resolve the analysis config path using the standard resolution order.
///
/// 1. Explicit CLI path (if provided and present)
/// 2. PA_ANALYSIS_CONFIG environment variable
/// 3. PA_CONFIG_DIR environment variable + analysis.json
/// 4. XDG config directory (~/.config/process-analytics/)
/// 5. System config (/etc/process-analytics/)
/// 6. Built-in defaults (None)
pub fn resolve_config(cli_path: Option<&Path>) -> (Option<PathBuf>, ConfigSource) {
    // 1. CLI argument
    if let Some(path) = cli_path {
        if path.exists() {
            return (Some(path.to_path_buf()), ConfigSource::CliArgument);
        }
    }

    // 2. Environment variable (direct path)
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    // 3. Environment variable (config dir)
    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(CONFIG_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    // 4. XDG config directory
    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(CONFIG_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::XdgConfig);
        }
    }

    // 5. System config
    let system_path = system_config_dir().join(CONFIG_FILENAME);
    if system_path.exists() {
        return (Some(system_path), ConfigSource::SystemConfig);
    }

    // 6. Built-in default
    (None, ConfigSource::BuiltinDefault)
}

/// Get the XDG config directory for process-analytics.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}

/// A resolved, parsed, and validated configuration.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AnalysisConfig,
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Resolve, parse, and validate the analysis configuration.
///
/// An explicit CLI path that does not exist is an error rather than a silent
/// fall-through.
pub fn load_config(cli_path: Option<&Path>) -> ValidationResult<LoadedConfig> {
    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(crate::ValidationError::IoError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    }

    let (path, source) = resolve_config(cli_path);
    let config = match &path {
        Some(p) => AnalysisConfig::from_file(p)?,
        None => AnalysisConfig::default(),
    };
    validate_analysis(&config)?;

    Ok(LoadedConfig {
        config,
        path,
        source,
    })
}
