//! The `analyze` entry point.
//!
//! One work unit is analyzed start to finish: extract candidates, run the
//! pattern lifecycle, record the run's candidates in history, sweep trend and
//! status over the whole active catalog, and derive prevention opportunities
//! from this run's candidates. Store failures abort the analysis and are
//! returned to the caller; writes already made are not rolled back.

use chrono::{DateTime, Utc};
use pm_common::{IssueCandidate, IssuePattern, PatternId, RunId};
use pm_config::{ConfigSnapshot, ConfigSource, EngineConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, info_span, warn};

use crate::catalog::{CandidateHistory, CatalogError, PatternStore};
use crate::classify::Classifier;
use crate::extract::IssueExtractor;
use crate::lifecycle::{PatternCountUpdate, PatternLifecycleManager};
use crate::prevention::{self, PreventionOpportunity};
use crate::similarity::SimilarityMatcher;
use crate::sources::{Collaborators, SourceError};
use crate::trend::TrendClassifier;

/// Errors that abort an analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl AnalysisError {
    /// Stable numeric code, aligned with `pm_common::Error::code`.
    pub fn code(&self) -> u32 {
        match self {
            Self::Source(_) => 20,
            Self::Catalog(_) => 30,
        }
    }
}

impl From<AnalysisError> for pm_common::Error {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Source(e) => pm_common::Error::Source(e.to_string()),
            AnalysisError::Catalog(e) => e.into(),
        }
    }
}

/// Result of analyzing one work unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub work_unit_id: String,
    pub issues_found: Vec<IssueCandidate>,
    pub patterns_matched: Vec<PatternId>,
    pub patterns_updated: Vec<PatternCountUpdate>,
    pub patterns_created: Vec<IssuePattern>,
    pub prevention_opportunities: Vec<PreventionOpportunity>,
}

impl AnalysisResult {
    pub fn empty(work_unit_id: &str) -> Self {
        Self {
            work_unit_id: work_unit_id.to_string(),
            ..Default::default()
        }
    }

    /// True when the run touched the catalog (matched or created patterns).
    pub fn has_findings(&self) -> bool {
        !self.patterns_matched.is_empty() || !self.patterns_created.is_empty()
    }
}

/// Postmortem pattern analyzer wired to its stores.
pub struct Analyzer<'a> {
    config: EngineConfig,
    config_source: ConfigSource,
    sources: Collaborators<'a>,
    store: &'a dyn PatternStore,
    history: &'a dyn CandidateHistory,
    extractor: IssueExtractor,
    classifier: Classifier,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        config: EngineConfig,
        sources: Collaborators<'a>,
        store: &'a dyn PatternStore,
        history: &'a dyn CandidateHistory,
    ) -> Self {
        Self {
            config,
            config_source: ConfigSource::Defaults,
            sources,
            store,
            history,
            extractor: IssueExtractor::new(),
            classifier: Classifier::default(),
        }
    }

    /// Record where the config came from, for the per-run snapshot log.
    pub fn with_config_source(mut self, source: ConfigSource) -> Self {
        self.config_source = source;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn analyze(&self, work_unit_id: &str) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_at(work_unit_id, Utc::now())
    }

    /// Analyze with an explicit clock.
    pub fn analyze_at(
        &self,
        work_unit_id: &str,
        now: DateTime<Utc>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let run_id = RunId::new();
        let span = info_span!("analyze", work_unit = work_unit_id, run_id = %run_id);
        let _enter = span.enter();

        let snapshot = ConfigSnapshot::new(&self.config, self.config_source.clone());
        info!(
            config_hash = snapshot.short_hash(),
            config_source = ?snapshot.source,
            similarity_threshold = self.config.matching.similarity_threshold,
            min_occurrences = self.config.matching.min_occurrences_for_pattern,
            "analysis started"
        );

        match self.run(work_unit_id, now) {
            Ok(result) => {
                info!(
                    issues = result.issues_found.len(),
                    matched = result.patterns_matched.len(),
                    created = result.patterns_created.len(),
                    opportunities = result.prevention_opportunities.len(),
                    "analysis finished"
                );
                Ok(result)
            }
            Err(e) => {
                error!(error = %e, code = e.code(), "analysis failed");
                Err(e)
            }
        }
    }

    fn run(&self, work_unit_id: &str, now: DateTime<Utc>) -> Result<AnalysisResult, AnalysisError> {
        let Some(work_unit) = self.sources.work_units.get_work_unit(work_unit_id)? else {
            warn!(work_unit = work_unit_id, "work unit not found, nothing to analyze");
            return Ok(AnalysisResult::empty(work_unit_id));
        };

        let candidates = self.extractor.extract_for(&self.sources, &work_unit)?;

        let lifecycle = PatternLifecycleManager::new(
            self.store,
            self.history,
            SimilarityMatcher::new(self.config.matching.similarity_threshold),
            &self.classifier,
            self.config.matching.min_occurrences_for_pattern,
        );
        let report = lifecycle.process(&work_unit.id, &candidates, now)?;

        self.history.record_run(&work_unit.id, &candidates, now)?;

        let sweep = TrendClassifier::new(self.config.lifecycle.clone()).sweep(self.store, now)?;
        info!(
            swept = sweep.patterns_swept,
            trend_changes = sweep.trend_changes,
            obsoleted = sweep.newly_obsolete.len(),
            "trend sweep complete"
        );

        let opportunities = prevention::identify(
            &candidates,
            &self.classifier,
            self.config.prevention.min_issues_per_category,
        );

        Ok(AnalysisResult {
            work_unit_id: work_unit.id,
            issues_found: candidates,
            patterns_matched: report.matched,
            patterns_updated: report.updated,
            patterns_created: report.created,
            prevention_opportunities: opportunities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryCatalog, MemoryHistory};
    use crate::sources::MemorySources;

    #[test]
    fn result_serializes_with_camel_case_keys() {
        let json = serde_json::to_value(AnalysisResult::empty("wu-1")).unwrap();
        for key in [
            "workUnitId",
            "issuesFound",
            "patternsMatched",
            "patternsUpdated",
            "patternsCreated",
            "preventionOpportunities",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn missing_work_unit_returns_empty_result() {
        let sources = MemorySources::new();
        let store = MemoryCatalog::new();
        let history = MemoryHistory::new();
        let analyzer = Analyzer::new(
            EngineConfig::default(),
            Collaborators::all(&sources),
            &store,
            &history,
        );
        let result = analyzer.analyze("wu-missing").unwrap();
        assert_eq!(result, AnalysisResult::empty("wu-missing"));
        assert!(history.is_empty());
    }

    #[test]
    fn error_codes_follow_common_groups() {
        let err = AnalysisError::from(CatalogError::LockPoisoned);
        assert_eq!(err.code(), 30);
        let common: pm_common::Error = err.into();
        assert_eq!(common.code(), 30);
    }
}
