//! Config resolution: CLI → env → XDG → defaults.
//!
//! The first config file found wins; environment overrides are applied on
//! top of whatever was loaded. Missing XDG files fall back to defaults and
//! are not an error, but an explicitly named file that does not exist is.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::engine::EngineConfig;
use crate::validate::{validate_config, ValidationResult};
use crate::APP_DIR_NAME;

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG: &str = "PM_CONFIG";
/// Environment variable naming the data directory.
pub const ENV_DATA_DIR: &str = "PM_DATA_DIR";
/// Override for `matching.similarity_threshold`.
pub const ENV_SIMILARITY_THRESHOLD: &str = "PM_SIMILARITY_THRESHOLD";
/// Override for `matching.min_occurrences_for_pattern`.
pub const ENV_MIN_OCCURRENCES: &str = "PM_MIN_OCCURRENCES";
/// Override for `lifecycle.obsolete_threshold_days`.
pub const ENV_OBSOLETE_DAYS: &str = "PM_OBSOLETE_DAYS";

/// Errors from config loading and resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid value {value:?} for {var}")]
    EnvOverride { var: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(ValidationResult),

    #[error("failed to resolve data directory")]
    DataDirUnavailable,
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ConfigSource {
    /// `--config` on the command line.
    Explicit(PathBuf),
    /// `PM_CONFIG` environment variable.
    Env(PathBuf),
    /// `<config_dir>/postmortem_patterns/config.{json,toml}`.
    Xdg(PathBuf),
    /// No file found; built-in defaults.
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(p) | Self::Env(p) | Self::Xdg(p) => Some(p),
            Self::Defaults => None,
        }
    }
}

/// Effective configuration plus its provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: EngineConfig,
    pub source: ConfigSource,
}

/// Load a config file; `.toml` files are parsed as TOML, everything else as JSON.
pub fn load_config_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let parsed = if is_toml {
        toml::from_str(&raw).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Apply `PM_*` overrides using the given variable lookup.
pub fn apply_env_overrides<F>(config: &mut EngineConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let invalid = |var: &str, value: &str| ConfigError::EnvOverride {
        var: var.to_string(),
        value: value.to_string(),
    };

    if let Some(value) = lookup(ENV_SIMILARITY_THRESHOLD) {
        config.matching.similarity_threshold = value
            .trim()
            .parse()
            .map_err(|_| invalid(ENV_SIMILARITY_THRESHOLD, &value))?;
    }
    if let Some(value) = lookup(ENV_MIN_OCCURRENCES) {
        config.matching.min_occurrences_for_pattern = value
            .trim()
            .parse()
            .map_err(|_| invalid(ENV_MIN_OCCURRENCES, &value))?;
    }
    if let Some(value) = lookup(ENV_OBSOLETE_DAYS) {
        config.lifecycle.obsolete_threshold_days = value
            .trim()
            .parse()
            .map_err(|_| invalid(ENV_OBSOLETE_DAYS, &value))?;
    }
    Ok(())
}

fn xdg_config_candidates() -> Vec<PathBuf> {
    dirs::config_dir()
        .map(|dir| {
            let app = dir.join(APP_DIR_NAME);
            vec![app.join("config.json"), app.join("config.toml")]
        })
        .unwrap_or_default()
}

/// Resolve the effective configuration from the process environment.
pub fn resolve_config(explicit: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    resolve_config_with(explicit, |var| std::env::var(var).ok(), xdg_config_candidates())
}

/// Resolution with injectable environment and XDG search paths.
pub fn resolve_config_with<F>(
    explicit: Option<&Path>,
    lookup: F,
    xdg_candidates: Vec<PathBuf>,
) -> Result<ResolvedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let source = if let Some(path) = explicit {
        ConfigSource::Explicit(path.to_path_buf())
    } else if let Some(path) = lookup(ENV_CONFIG).filter(|p| !p.trim().is_empty()) {
        ConfigSource::Env(PathBuf::from(path))
    } else if let Some(path) = xdg_candidates.into_iter().find(|p| p.exists()) {
        ConfigSource::Xdg(path)
    } else {
        ConfigSource::Defaults
    };

    let mut config = match source.path() {
        Some(path) => load_config_file(path)?,
        None => EngineConfig::default(),
    };
    apply_env_overrides(&mut config, &lookup)?;

    let validation = validate_config(&config);
    if !validation.is_ok() {
        return Err(ConfigError::Invalid(validation));
    }

    debug!(source = ?source, "resolved engine configuration");
    Ok(ResolvedConfig { config, source })
}

/// Resolve the data directory: CLI → `PM_DATA_DIR` → XDG data dir.
pub fn resolve_data_dir(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(ENV_DATA_DIR).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or(ConfigError::DataDirUnavailable)
}
