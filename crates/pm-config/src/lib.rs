//! Postmortem pattern engine configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the engine thresholds and windows
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Config snapshots for analysis logging
//! - JSON Schema export

pub mod engine;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use engine::{
    EngineConfig, LifecycleConfig, MatchingConfig, PreventionConfig, SurfacingConfig,
};
pub use resolve::{
    apply_env_overrides, load_config_file, resolve_config, resolve_data_dir, ConfigError,
    ConfigSource, ResolvedConfig,
};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Application directory name under the XDG config/data roots.
pub const APP_DIR_NAME: &str = "postmortem_patterns";

/// JSON Schema describing [`EngineConfig`].
pub fn config_json_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(EngineConfig)).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_top_level_sections() {
        let schema = config_json_schema();
        let props = schema["properties"].as_object().expect("properties");
        for section in ["matching", "lifecycle", "prevention", "surfacing"] {
            assert!(props.contains_key(section), "missing section {section}");
        }
    }
}
