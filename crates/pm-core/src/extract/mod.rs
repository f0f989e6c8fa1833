//! Issue candidate extraction.
//!
//! Pulls raw issue statements for one work unit from the three postmortem
//! sources and normalizes them into [`IssueCandidate`]s. Order is fixed:
//! retrospective items, then handoff bullets (documents by file name), then
//! check failures.

pub mod handoff;

use pm_common::{IssueCandidate, IssueSource};
use tracing::{debug, warn};

use crate::sources::{
    CheckFailure, Collaborators, HandoffDocument, Retrospective, SourceError, WorkUnit,
};

pub use handoff::KnownIssuesParser;

/// Read-only extractor over the collaborator stores.
#[derive(Debug, Clone, Default)]
pub struct IssueExtractor {
    parser: KnownIssuesParser,
}

impl IssueExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidates for a work unit by id; an unknown work unit yields none.
    pub fn extract(
        &self,
        sources: &Collaborators<'_>,
        work_unit_id: &str,
    ) -> Result<Vec<IssueCandidate>, SourceError> {
        match sources.work_units.get_work_unit(work_unit_id)? {
            Some(work_unit) => self.extract_for(sources, &work_unit),
            None => {
                warn!(work_unit = work_unit_id, "work unit not found");
                Ok(Vec::new())
            }
        }
    }

    /// Candidates for a resolved work unit.
    pub fn extract_for(
        &self,
        sources: &Collaborators<'_>,
        work_unit: &WorkUnit,
    ) -> Result<Vec<IssueCandidate>, SourceError> {
        let mut candidates = Vec::new();

        if let Some(retro) = sources.retrospectives.get_retrospective(&work_unit.id)? {
            candidates.extend(self.from_retrospective(&retro, work_unit));
        }

        let documents = sources.handoffs.documents_for(&work_unit.key)?;
        candidates.extend(self.from_handoffs(&documents, work_unit));

        let failures = sources.check_failures.list_failures(&work_unit.id)?;
        candidates.extend(self.from_check_failures(&failures, work_unit));

        debug!(
            work_unit = %work_unit.key,
            count = candidates.len(),
            "extracted issue candidates"
        );
        Ok(candidates)
    }

    pub fn from_retrospective(
        &self,
        retro: &Retrospective,
        work_unit: &WorkUnit,
    ) -> Vec<IssueCandidate> {
        retro
            .improvement_items
            .iter()
            .filter_map(|item| {
                let text = item.to_text();
                if text.is_none() {
                    debug!(work_unit = %work_unit.key, "skipping empty improvement item");
                }
                text
            })
            .map(|description| IssueCandidate {
                source: IssueSource::Retrospective,
                kind: IssueCandidate::KIND_CHALLENGE.to_string(),
                description,
                work_unit_id: work_unit.id.clone(),
                work_unit_key: work_unit.key.clone(),
                origin_file: None,
                origin_agent: None,
            })
            .collect()
    }

    pub fn from_handoffs(
        &self,
        documents: &[HandoffDocument],
        work_unit: &WorkUnit,
    ) -> Vec<IssueCandidate> {
        documents
            .iter()
            .flat_map(|doc| {
                self.parser
                    .parse(&doc.content)
                    .into_iter()
                    .map(move |description| IssueCandidate {
                        source: IssueSource::HandoffDoc,
                        kind: IssueCandidate::KIND_KNOWN_ISSUE.to_string(),
                        description,
                        work_unit_id: work_unit.id.clone(),
                        work_unit_key: work_unit.key.clone(),
                        origin_file: Some(doc.file_name.clone()),
                        origin_agent: None,
                    })
            })
            .collect()
    }

    pub fn from_check_failures(
        &self,
        failures: &[CheckFailure],
        work_unit: &WorkUnit,
    ) -> Vec<IssueCandidate> {
        failures
            .iter()
            .filter_map(|failure| {
                let text = failure.findings_text()?;
                let agent = failure.checker_name.trim();
                Some(IssueCandidate {
                    source: IssueSource::CheckFailure,
                    kind: IssueCandidate::KIND_VERIFICATION_FAILURE.to_string(),
                    description: text,
                    work_unit_id: work_unit.id.clone(),
                    work_unit_key: work_unit.key.clone(),
                    origin_file: None,
                    origin_agent: (!agent.is_empty()).then(|| agent.to_string()),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MemorySources;
    use serde_json::json;

    fn sources() -> MemorySources {
        MemorySources::new()
            .with_work_unit("wu-7", "SD-007")
            .with_improvements("wu-7", &["Schema drift broke migration", "  "])
            .with_handoff(
                "SD-007-exec-to-plan.md",
                "## Known Issues\n- Playwright selector flaky\n",
            )
            .with_handoff("SD-008-exec-to-plan.md", "## Known Issues\n- unrelated\n")
            .with_failure("wu-7", json!("Vite build failed on CI"), "TESTING")
            .with_failure("wu-7", json!(null), "DATABASE")
    }

    #[test]
    fn concatenates_sources_in_order() {
        let store = sources();
        let candidates = IssueExtractor::new()
            .extract(&Collaborators::all(&store), "wu-7")
            .unwrap();

        let kinds: Vec<&str> = candidates.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["challenge", "known_issue", "verification_failure"]);

        assert_eq!(candidates[0].description, "Schema drift broke migration");
        assert_eq!(
            candidates[1].origin_file.as_deref(),
            Some("SD-007-exec-to-plan.md")
        );
        assert_eq!(candidates[2].origin_agent.as_deref(), Some("TESTING"));
        assert!(candidates.iter().all(|c| c.work_unit_key == "SD-007"));
    }

    #[test]
    fn unknown_work_unit_yields_nothing() {
        let store = sources();
        let candidates = IssueExtractor::new()
            .extract(&Collaborators::all(&store), "wu-404")
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn work_unit_without_material_yields_nothing() {
        let store = MemorySources::new().with_work_unit("wu-1", "SD-001");
        let candidates = IssueExtractor::new()
            .extract(&Collaborators::all(&store), "wu-1")
            .unwrap();
        assert!(candidates.is_empty());
    }
}
