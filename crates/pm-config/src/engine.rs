//! Engine configuration types.
//!
//! Every threshold the analysis engine consults lives here and is handed to
//! the engine at construction. Sections may be omitted in config files; each
//! missing field falls back to its default.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    pub matching: MatchingConfig,
    pub lifecycle: LifecycleConfig,
    pub prevention: PreventionConfig,
    pub surfacing: SurfacingConfig,
}

/// Candidate-to-pattern matching and pattern promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum Jaccard similarity for two statements to be considered the same issue.
    pub similarity_threshold: f64,
    /// Total cluster size (trigger plus similar prior candidates) needed to create a pattern.
    pub min_occurrences_for_pattern: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            min_occurrences_for_pattern: 2,
        }
    }
}

/// Trend and status windows, in days since a pattern's last update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Active patterns idle for longer than this become obsolete.
    pub obsolete_threshold_days: f64,
    /// Patterns updated more recently than this are trending up.
    pub increasing_within_days: f64,
    /// Patterns idle for longer than this are trending down.
    pub decreasing_after_days: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            obsolete_threshold_days: 30.0,
            increasing_within_days: 7.0,
            decreasing_after_days: 30.0,
        }
    }
}

/// Same-run co-occurrence signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PreventionConfig {
    /// Candidates of one category needed in a single run to emit a suggestion.
    pub min_issues_per_category: usize,
}

impl Default for PreventionConfig {
    fn default() -> Self {
        Self {
            min_issues_per_category: 2,
        }
    }
}

/// Ranking of catalog patterns for consumption by later workflow stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SurfacingConfig {
    /// Patterns seen fewer times than this are incidents, not patterns.
    pub min_occurrences: u32,
    /// Minimum decay-adjusted confidence (0-100) to surface.
    pub min_confidence: u32,
    /// Age in days after which a pattern is stale.
    pub stale_days: i64,
    /// Age in days after which a pattern is aging.
    pub aging_days: i64,
    /// Confidence bonus for patterns with proven solutions.
    pub actionability_bonus: u32,
    /// Exponential confidence decay per day.
    pub decay_rate: f64,
    /// Maximum number of patterns returned.
    pub limit: usize,
}

impl Default for SurfacingConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            min_confidence: 50,
            stale_days: 60,
            aging_days: 30,
            actionability_bonus: 15,
            decay_rate: 0.023,
            limit: 5,
        }
    }
}
