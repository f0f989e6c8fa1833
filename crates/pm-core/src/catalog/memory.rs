//! In-memory pattern catalog.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use pm_common::{IssuePattern, PatternId};

use super::{
    CatalogError, CatalogState, CreateOutcome, NewPattern, PatternLink, PatternStore,
    PatternUpdate,
};

/// Mutex-guarded catalog with no persistence.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
    links: Mutex<Vec<PatternLink>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing patterns (same id rules as `insert`).
    pub fn with_patterns(patterns: Vec<IssuePattern>) -> Result<Self, CatalogError> {
        let mut state = CatalogState::default();
        for pattern in patterns {
            state.insert(pattern)?;
        }
        Ok(Self {
            state: Mutex::new(state),
            links: Mutex::default(),
        })
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut CatalogState) -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        let mut state = self.state.lock().map_err(|_| CatalogError::LockPoisoned)?;
        f(&mut state)
    }
}

impl PatternStore for MemoryCatalog {
    fn list_all(&self) -> Result<Vec<IssuePattern>, CatalogError> {
        self.with_state(|s| Ok(s.patterns.clone()))
    }

    fn get(&self, id: PatternId) -> Result<Option<IssuePattern>, CatalogError> {
        self.with_state(|s| Ok(s.get(id).cloned()))
    }

    fn insert(&self, pattern: IssuePattern) -> Result<(), CatalogError> {
        self.with_state(|s| s.insert(pattern))
    }

    fn update(&self, id: PatternId, update: &PatternUpdate) -> Result<IssuePattern, CatalogError> {
        self.with_state(|s| s.update(id, update))
    }

    fn create_if_absent(
        &self,
        new: NewPattern,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome, CatalogError> {
        self.with_state(|s| s.create_if_absent(new, now))
    }

    fn link_occurrence(&self, link: PatternLink) -> Result<(), CatalogError> {
        let mut links = self.links.lock().map_err(|_| CatalogError::LockPoisoned)?;
        links.push(link);
        Ok(())
    }

    fn links_for(&self, id: PatternId) -> Result<Vec<PatternLink>, CatalogError> {
        let links = self.links.lock().map_err(|_| CatalogError::LockPoisoned)?;
        Ok(links.iter().filter(|l| l.pattern_id == id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::LinkKind;
    use super::*;
    use pm_common::{IssueSource, PatternStatus};

    #[test]
    fn list_active_hides_obsolete() {
        let catalog = MemoryCatalog::new();
        catalog.create_if_absent(new_pattern("a b c"), at(1)).unwrap();
        catalog.create_if_absent(new_pattern("d e f"), at(1)).unwrap();
        catalog
            .update(
                PatternId::first(),
                &PatternUpdate {
                    status: Some(PatternStatus::Obsolete),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(catalog.list_all().unwrap().len(), 2);
        let active = catalog.list_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].issue_summary, "d e f");
    }

    #[test]
    fn links_are_filtered_by_pattern() {
        let catalog = MemoryCatalog::new();
        let link = |n: u32| PatternLink {
            pattern_id: PatternId::from_number(n).unwrap(),
            work_unit_id: "wu-1".into(),
            source: IssueSource::Retrospective,
            candidate_index: 0,
            kind: "challenge".into(),
            description: "x".into(),
            link: LinkKind::Matched,
            linked_at: at(1),
        };
        catalog.link_occurrence(link(1)).unwrap();
        catalog.link_occurrence(link(2)).unwrap();
        catalog.link_occurrence(link(1)).unwrap();
        assert_eq!(catalog.links_for(PatternId::first()).unwrap().len(), 2);
    }
}
