//! Ranking catalog patterns for later workflow stages.
//!
//! Confidence grows with occurrence count, decays exponentially with idle
//! time, and gets a bonus when curators have recorded proven solutions.
//! Low-value patterns are filtered out and counted so callers can show what
//! was hidden.

use std::cmp::Reverse;
use std::fmt;

use chrono::{DateTime, Utc};
use pm_common::{IssuePattern, Trend};
use pm_config::SurfacingConfig;
use serde::Serialize;

use crate::similarity::{tokenize, token_set_similarity};

/// Age bucket of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recency {
    Fresh,
    Aging,
    Stale,
}

impl fmt::Display for Recency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Aging => write!(f, "aging"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

/// A pattern with its surfacing score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfacedPattern {
    pub pattern: IssuePattern,
    pub days_since_update: i64,
    /// 0-100.
    pub confidence: u32,
    pub recency: Recency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_reason: Option<String>,
}

/// How many patterns each filter removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub considered: usize,
    pub low_occurrence: usize,
    pub low_confidence: usize,
    pub stale_declining: usize,
}

impl FilterStats {
    pub fn total_filtered(&self) -> usize {
        self.low_occurrence + self.low_confidence + self.stale_declining
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SurfacedPatterns {
    pub patterns: Vec<SurfacedPattern>,
    pub filtered: FilterStats,
}

/// Whole days between `updated_at` and `now`, never negative.
pub fn whole_days_since(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.signed_duration_since(updated_at).num_days().max(0)
}

pub fn recency(days: i64, config: &SurfacingConfig) -> Recency {
    if days > config.stale_days {
        Recency::Stale
    } else if days > config.aging_days {
        Recency::Aging
    } else {
        Recency::Fresh
    }
}

/// Decay-adjusted confidence, before the actionability bonus.
pub fn decayed_confidence(occurrence_count: u32, days: i64, decay_rate: f64) -> u32 {
    let base = (50 + 5 * u64::from(occurrence_count)).min(100) as f64;
    (base * (-decay_rate * days as f64).exp()).round() as u32
}

/// Score one pattern.
pub fn score(pattern: &IssuePattern, now: DateTime<Utc>, config: &SurfacingConfig) -> SurfacedPattern {
    let days = whole_days_since(pattern.updated_at, now);
    let recency = recency(days, config);
    let mut confidence = decayed_confidence(pattern.occurrence_count, days, config.decay_rate);

    let actionable = !pattern.proven_solutions.is_empty();
    if actionable {
        confidence = (confidence + config.actionability_bonus).min(100);
    }

    let confidence_reason = if actionable {
        Some("boosted: has proven solutions".to_string())
    } else {
        match recency {
            Recency::Stale => Some(format!("reduced: age ({}+ days)", config.stale_days)),
            Recency::Aging => Some(format!("reduced: age ({}+ days)", config.aging_days)),
            Recency::Fresh => None,
        }
    };

    SurfacedPattern {
        pattern: pattern.clone(),
        days_since_update: days,
        confidence,
        recency,
        confidence_reason,
    }
}

/// Rank active patterns, best first, dropping low-value ones.
pub fn surface_patterns(
    patterns: &[IssuePattern],
    now: DateTime<Utc>,
    config: &SurfacingConfig,
) -> SurfacedPatterns {
    let mut filtered = FilterStats::default();
    let mut kept = Vec::new();

    for pattern in patterns.iter().filter(|p| p.status.is_active()) {
        filtered.considered += 1;
        let scored = score(pattern, now, config);

        if pattern.occurrence_count < config.min_occurrences {
            filtered.low_occurrence += 1;
            continue;
        }
        if scored.confidence < config.min_confidence {
            filtered.low_confidence += 1;
            continue;
        }
        if scored.recency == Recency::Stale && pattern.trend == Trend::Decreasing {
            filtered.stale_declining += 1;
            continue;
        }
        kept.push(scored);
    }

    kept.sort_by_key(|s| {
        (
            Reverse(s.confidence),
            Reverse(s.pattern.occurrence_count),
            s.pattern.pattern_id,
        )
    });
    kept.truncate(config.limit);

    SurfacedPatterns {
        patterns: kept,
        filtered,
    }
}

/// An active pattern similar to a query text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedPattern {
    pub pattern: IssuePattern,
    pub similarity: f64,
}

/// Active patterns scoring at or above `threshold` against `description`,
/// most similar first (ties by pattern id).
pub fn related_patterns(
    description: &str,
    patterns: &[IssuePattern],
    threshold: f64,
) -> Vec<RelatedPattern> {
    let tokens = tokenize(description);
    let mut related: Vec<RelatedPattern> = patterns
        .iter()
        .filter(|p| p.status.is_active())
        .map(|p| RelatedPattern {
            similarity: token_set_similarity(&tokens, &tokenize(&p.issue_summary)),
            pattern: p.clone(),
        })
        .filter(|r| r.similarity >= threshold)
        .collect();
    related.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then(a.pattern.pattern_id.cmp(&b.pattern.pattern_id))
    });
    related
}
