//! Config snapshots for analysis logging.
//!
//! A snapshot pins the exact thresholds an analysis ran with, so two runs can
//! be compared by hash without diffing files.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::engine::EngineConfig;
use crate::resolve::{ConfigSource, ResolvedConfig};

/// Immutable record of the effective configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    pub source: ConfigSource,
    /// SHA-256 (hex) of the canonical JSON encoding of `config`.
    pub config_hash: String,
    pub config: EngineConfig,
}

impl ConfigSnapshot {
    pub fn new(config: &EngineConfig, source: ConfigSource) -> Self {
        Self {
            source,
            config_hash: config_hash(config),
            config: config.clone(),
        }
    }

    pub fn from_resolved(resolved: &ResolvedConfig) -> Self {
        Self::new(&resolved.config, resolved.source.clone())
    }

    /// First 12 hex characters of the hash, for log lines.
    pub fn short_hash(&self) -> &str {
        &self.config_hash[..self.config_hash.len().min(12)]
    }
}

/// Hash of the canonical JSON encoding of a config.
pub fn config_hash(config: &EngineConfig) -> String {
    // Struct fields serialize in declaration order, so the encoding is stable.
    let canonical = serde_json::to_vec(config).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}
