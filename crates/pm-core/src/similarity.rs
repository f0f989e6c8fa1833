//! Token-set similarity between issue statements.
//!
//! Descriptions are lower-cased and split on whitespace into a set of unique
//! words; two statements are compared with the Jaccard index of their sets.
//! This is a set-overlap heuristic: word order and synonyms are invisible to
//! it, and punctuation stays attached to its word.

use std::collections::BTreeSet;

use pm_common::IssuePattern;
use sha2::{Digest, Sha256};

/// Default match threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Lower-cased unique whitespace tokens of `text`.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Jaccard index of the token sets of `a` and `b`, in `[0, 1]`.
///
/// Two empty token sets score 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    token_set_similarity(&tokenize(a), &tokenize(b))
}

/// Jaccard index of two pre-tokenized sets.
pub fn token_set_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Sorted unique tokens joined by single spaces.
pub fn normalized_text(text: &str) -> String {
    tokenize(text).into_iter().collect::<Vec<_>>().join(" ")
}

/// SHA-256 (hex) of [`normalized_text`]; statements with the same word set
/// share a fingerprint.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(normalized_text(text).as_bytes()))
}

/// Threshold-driven matching of descriptions against pattern summaries.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityMatcher {
    threshold: f64,
}

impl Default for SimilarityMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl SimilarityMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_match(&self, a: &str, b: &str) -> bool {
        similarity(a, b) >= self.threshold
    }

    /// First active pattern, in the given order, whose summary scores at or
    /// above the threshold.
    pub fn find_match<'p>(
        &self,
        description: &str,
        patterns: &'p [IssuePattern],
    ) -> Option<(&'p IssuePattern, f64)> {
        let tokens = tokenize(description);
        patterns
            .iter()
            .filter(|p| p.status.is_active())
            .map(|p| (p, token_set_similarity(&tokens, &tokenize(&p.issue_summary))))
            .find(|(_, score)| *score >= self.threshold)
    }

    /// Highest-scoring active pattern at or above the threshold. Ties keep
    /// the earlier pattern.
    pub fn best_match<'p>(
        &self,
        description: &str,
        patterns: &'p [IssuePattern],
    ) -> Option<(&'p IssuePattern, f64)> {
        let tokens = tokenize(description);
        let mut best: Option<(&IssuePattern, f64)> = None;
        for pattern in patterns.iter().filter(|p| p.status.is_active()) {
            let score = token_set_similarity(&tokens, &tokenize(&pattern.issue_summary));
            if score < self.threshold {
                continue;
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((pattern, score));
            }
        }
        best
    }
}
