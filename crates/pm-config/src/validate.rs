//! Semantic validation of engine configuration.
//!
//! Validation collects every violation rather than stopping at the first.

use serde::Serialize;
use std::fmt;

use crate::engine::EngineConfig;

/// A single configuration violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `matching.similarity_threshold`.
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of validating a configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
        });
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", joined.join("; "))
    }
}

/// Validate semantic constraints that serde cannot express.
pub fn validate_config(config: &EngineConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    let threshold = config.matching.similarity_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        result.push(
            "matching.similarity_threshold",
            format!("must be in (0, 1], got {threshold}"),
        );
    }
    if config.matching.min_occurrences_for_pattern == 0 {
        result.push("matching.min_occurrences_for_pattern", "must be at least 1");
    }

    let lifecycle = &config.lifecycle;
    for (field, value) in [
        ("lifecycle.obsolete_threshold_days", lifecycle.obsolete_threshold_days),
        ("lifecycle.increasing_within_days", lifecycle.increasing_within_days),
        ("lifecycle.decreasing_after_days", lifecycle.decreasing_after_days),
    ] {
        if !value.is_finite() || value < 0.0 {
            result.push(field, format!("must be a non-negative number, got {value}"));
        }
    }
    if lifecycle.increasing_within_days > lifecycle.decreasing_after_days {
        result.push(
            "lifecycle.increasing_within_days",
            "must not exceed lifecycle.decreasing_after_days",
        );
    }

    if config.prevention.min_issues_per_category == 0 {
        result.push("prevention.min_issues_per_category", "must be at least 1");
    }

    let surfacing = &config.surfacing;
    if surfacing.min_confidence > 100 {
        result.push("surfacing.min_confidence", "must be at most 100");
    }
    if surfacing.aging_days < 0 || surfacing.stale_days < surfacing.aging_days {
        result.push(
            "surfacing.stale_days",
            "must be at least surfacing.aging_days, both non-negative",
        );
    }
    if !surfacing.decay_rate.is_finite() || surfacing.decay_rate < 0.0 {
        result.push("surfacing.decay_rate", "must be a non-negative number");
    }

    result
}
