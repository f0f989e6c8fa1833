//! In-memory collaborator stores for embedding and tests.

use std::collections::HashMap;

use super::{
    CheckFailure, CheckFailureStore, HandoffDocument, HandoffStore, ImprovementItem,
    Retrospective, RetrospectiveStore, SourceError, WorkUnit, WorkUnitStore,
};

/// Builder-style in-memory implementation of every collaborator trait.
#[derive(Debug, Clone, Default)]
pub struct MemorySources {
    work_units: HashMap<String, WorkUnit>,
    retrospectives: HashMap<String, Retrospective>,
    handoffs: Vec<HandoffDocument>,
    failures: HashMap<String, Vec<CheckFailure>>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_work_unit(mut self, id: &str, key: &str) -> Self {
        self.work_units.insert(
            id.to_string(),
            WorkUnit {
                id: id.to_string(),
                key: key.to_string(),
            },
        );
        self
    }

    /// Add plain-text improvement items to a work unit's retrospective.
    pub fn with_improvements(mut self, work_unit_id: &str, items: &[&str]) -> Self {
        let retro = self
            .retrospectives
            .entry(work_unit_id.to_string())
            .or_default();
        retro
            .improvement_items
            .extend(items.iter().map(|s| ImprovementItem::Text(s.to_string())));
        self
    }

    pub fn with_retrospective(mut self, work_unit_id: &str, retro: Retrospective) -> Self {
        self.retrospectives.insert(work_unit_id.to_string(), retro);
        self
    }

    pub fn with_handoff(mut self, file_name: &str, content: &str) -> Self {
        self.handoffs.push(HandoffDocument {
            file_name: file_name.to_string(),
            content: content.to_string(),
        });
        self
    }

    pub fn with_failure(
        mut self,
        work_unit_id: &str,
        findings: serde_json::Value,
        checker_name: &str,
    ) -> Self {
        self.failures
            .entry(work_unit_id.to_string())
            .or_default()
            .push(CheckFailure {
                findings,
                checker_name: checker_name.to_string(),
            });
        self
    }
}

impl WorkUnitStore for MemorySources {
    fn get_work_unit(&self, id: &str) -> Result<Option<WorkUnit>, SourceError> {
        Ok(self.work_units.get(id).cloned())
    }
}

impl RetrospectiveStore for MemorySources {
    fn get_retrospective(&self, work_unit_id: &str) -> Result<Option<Retrospective>, SourceError> {
        Ok(self.retrospectives.get(work_unit_id).cloned())
    }
}

impl HandoffStore for MemorySources {
    fn documents_for(&self, work_unit_key: &str) -> Result<Vec<HandoffDocument>, SourceError> {
        if work_unit_key.is_empty() {
            return Ok(Vec::new());
        }
        let mut docs: Vec<HandoffDocument> = self
            .handoffs
            .iter()
            .filter(|d| d.file_name.contains(work_unit_key))
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(docs)
    }
}

impl CheckFailureStore for MemorySources {
    fn list_failures(&self, work_unit_id: &str) -> Result<Vec<CheckFailure>, SourceError> {
        Ok(self.failures.get(work_unit_id).cloned().unwrap_or_default())
    }
}
