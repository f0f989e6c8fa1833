//! Pattern lifecycle: match, update, and promote.
//!
//! Each candidate is matched against the active catalog (first match wins).
//! A match bumps the pattern's counters. An unmatched candidate is compared
//! with historical candidates from other work units; once enough of them are
//! similar it is promoted to a new pattern.

use chrono::{DateTime, Utc};
use pm_common::{IssueCandidate, IssuePattern, PatternId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{
    per_source_indices, CandidateHistory, CatalogError, CreateOutcome, HistoricalCandidate,
    LinkKind, NewPattern, PatternLink, PatternStore, PatternUpdate,
};
use crate::classify::Classifier;
use crate::similarity::{tokenize, token_set_similarity, SimilarityMatcher};

/// New occurrence count of a matched pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternCountUpdate {
    pub pattern_id: PatternId,
    pub new_occurrence_count: u32,
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Matched {
        pattern_id: PatternId,
        new_occurrence_count: u32,
    },
    Created(IssuePattern),
    /// Unmatched, with too few similar prior candidates to promote.
    Unpromoted { similar_priors: usize },
}

/// Per-run lifecycle results. Matched and updated entries are listed once
/// per matching candidate, so a pattern hit twice appears twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleReport {
    pub matched: Vec<PatternId>,
    pub updated: Vec<PatternCountUpdate>,
    pub created: Vec<IssuePattern>,
    pub outcomes: Vec<CandidateOutcome>,
}

impl LifecycleReport {
    pub fn unpromoted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CandidateOutcome::Unpromoted { .. }))
            .count()
    }
}

/// Drives matching and promotion for one work unit's candidates.
pub struct PatternLifecycleManager<'a> {
    store: &'a dyn PatternStore,
    history: &'a dyn CandidateHistory,
    matcher: SimilarityMatcher,
    classifier: &'a Classifier,
    min_occurrences: u32,
}

impl<'a> PatternLifecycleManager<'a> {
    pub fn new(
        store: &'a dyn PatternStore,
        history: &'a dyn CandidateHistory,
        matcher: SimilarityMatcher,
        classifier: &'a Classifier,
        min_occurrences: u32,
    ) -> Self {
        Self {
            store,
            history,
            matcher,
            classifier,
            min_occurrences,
        }
    }

    /// Process candidates in order. The active catalog is re-read for every
    /// candidate, so patterns created earlier in the run can be matched by
    /// later candidates.
    pub fn process(
        &self,
        work_unit_id: &str,
        candidates: &[IssueCandidate],
        now: DateTime<Utc>,
    ) -> Result<LifecycleReport, CatalogError> {
        let mut report = LifecycleReport::default();
        if candidates.is_empty() {
            return Ok(report);
        }
        let priors = self.history.prior_candidates(work_unit_id)?;

        let indices = per_source_indices(candidates);
        for (candidate, index) in candidates.iter().zip(indices) {
            let outcome = self.process_one(index, candidate, &priors, now)?;
            match &outcome {
                CandidateOutcome::Matched {
                    pattern_id,
                    new_occurrence_count,
                } => {
                    report.matched.push(*pattern_id);
                    report.updated.push(PatternCountUpdate {
                        pattern_id: *pattern_id,
                        new_occurrence_count: *new_occurrence_count,
                    });
                }
                CandidateOutcome::Created(pattern) => report.created.push(pattern.clone()),
                CandidateOutcome::Unpromoted { .. } => {}
            }
            report.outcomes.push(outcome);
        }

        Ok(report)
    }

    fn process_one(
        &self,
        index: usize,
        candidate: &IssueCandidate,
        priors: &[HistoricalCandidate],
        now: DateTime<Utc>,
    ) -> Result<CandidateOutcome, CatalogError> {
        let active = self.store.list_active()?;
        if let Some((pattern, score)) = self.matcher.find_match(&candidate.description, &active) {
            debug!(
                pattern_id = %pattern.pattern_id,
                similarity = score,
                "candidate matched pattern"
            );
            return self.record_match(index, candidate, pattern, now);
        }

        let similar = self.similar_priors(candidate, priors);
        let needed = self.min_occurrences.saturating_sub(1) as usize;
        if similar.len() < needed {
            debug!(
                work_unit = %candidate.work_unit_key,
                count = similar.len(),
                needed,
                "candidate not promoted"
            );
            return Ok(CandidateOutcome::Unpromoted {
                similar_priors: similar.len(),
            });
        }

        let first_seen = similar
            .first()
            .map(|p| p.work_unit_id.clone())
            .unwrap_or_else(|| candidate.work_unit_id.clone());
        let new = NewPattern {
            category: self.classifier.categorize(&candidate.description),
            issue_summary: candidate.description.clone(),
            occurrence_count: u32::try_from(similar.len() + 1).unwrap_or(u32::MAX),
            first_seen_work_unit_id: first_seen,
            last_seen_work_unit_id: candidate.work_unit_id.clone(),
            severity: self.classifier.assess_severity(&candidate.description),
        };

        match self.store.create_if_absent(new, now)? {
            CreateOutcome::Created(pattern) => {
                info!(
                    pattern_id = %pattern.pattern_id,
                    category = %pattern.category,
                    severity = %pattern.severity,
                    count = pattern.occurrence_count,
                    "created pattern"
                );
                self.link(index, candidate, pattern.pattern_id, LinkKind::Created, now)?;
                Ok(CandidateOutcome::Created(pattern))
            }
            CreateOutcome::Existing(pattern) => {
                debug!(
                    pattern_id = %pattern.pattern_id,
                    "same-text pattern already exists, counting as match"
                );
                self.record_match(index, candidate, &pattern, now)
            }
        }
    }

    /// Prior candidates at or above the threshold, oldest first.
    fn similar_priors<'p>(
        &self,
        candidate: &IssueCandidate,
        priors: &'p [HistoricalCandidate],
    ) -> Vec<&'p HistoricalCandidate> {
        let tokens = tokenize(&candidate.description);
        priors
            .iter()
            .filter(|p| {
                token_set_similarity(&tokens, &tokenize(&p.description)) >= self.matcher.threshold()
            })
            .collect()
    }

    fn record_match(
        &self,
        index: usize,
        candidate: &IssueCandidate,
        pattern: &IssuePattern,
        now: DateTime<Utc>,
    ) -> Result<CandidateOutcome, CatalogError> {
        let new_count = pattern.occurrence_count.saturating_add(1);
        self.store.update(
            pattern.pattern_id,
            &PatternUpdate {
                occurrence_count: Some(new_count),
                last_seen_work_unit_id: Some(candidate.work_unit_id.clone()),
                updated_at: Some(now),
                ..Default::default()
            },
        )?;
        self.link(index, candidate, pattern.pattern_id, LinkKind::Matched, now)?;
        Ok(CandidateOutcome::Matched {
            pattern_id: pattern.pattern_id,
            new_occurrence_count: new_count,
        })
    }

    fn link(
        &self,
        index: usize,
        candidate: &IssueCandidate,
        pattern_id: PatternId,
        link: LinkKind,
        now: DateTime<Utc>,
    ) -> Result<(), CatalogError> {
        self.store.link_occurrence(PatternLink {
            pattern_id,
            work_unit_id: candidate.work_unit_id.clone(),
            source: candidate.source,
            candidate_index: index,
            kind: candidate.kind.clone(),
            description: candidate.description.clone(),
            link,
            linked_at: now,
        })
    }
}
