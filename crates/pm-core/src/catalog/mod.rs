//! The persisted pattern catalog.
//!
//! [`PatternStore`] is the storage seam: lookup by status, create, partial
//! update, and the source links that tie patterns back to the candidates that
//! fed them. Pattern creation is a single atomic [`PatternStore::create_if_absent`]
//! call keyed by the summary's normalized-text fingerprint, so two analyses
//! racing to promote the same issue end up with one pattern.

pub mod file;
pub mod history;
pub mod lock;
pub mod memory;

use chrono::{DateTime, Utc};
use pm_common::schema::is_compatible;
use pm_common::{
    Category, IssuePattern, IssueSource, PatternId, PatternStatus, Severity, Trend,
    SCHEMA_VERSION,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::similarity::fingerprint;

pub use file::FileCatalog;
pub use history::{
    per_source_indices, CandidateHistory, FileHistory, HistoricalCandidate, MemoryHistory,
};
pub use lock::CatalogLock;
pub use memory::MemoryCatalog;

/// Errors from the pattern catalog and candidate history.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("incompatible catalog schema {found} (expected {expected})")]
    IncompatibleSchema { found: String, expected: String },

    #[error("pattern already exists: {0}")]
    DuplicateId(PatternId),

    #[error("pattern id {id} does not follow latest id {latest}")]
    NonIncreasingId { id: PatternId, latest: PatternId },

    #[error("pattern not found: {0}")]
    NotFound(PatternId),

    #[error("occurrence count must be at least 1 (pattern {0})")]
    ZeroOccurrences(PatternId),

    #[error("catalog lock poisoned")]
    LockPoisoned,

    #[error("catalog store unavailable: {0}")]
    Unavailable(String),
}

impl From<CatalogError> for pm_common::Error {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => pm_common::Error::PatternNotFound {
                pattern_id: id.to_string(),
            },
            CatalogError::Io { source, .. } => pm_common::Error::Io(source),
            other => pm_common::Error::Catalog(other.to_string()),
        }
    }
}

/// Partial update of a pattern. `issue_summary` is deliberately absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternUpdate {
    pub occurrence_count: Option<u32>,
    pub last_seen_work_unit_id: Option<String>,
    pub severity: Option<Severity>,
    pub proven_solutions: Option<Vec<String>>,
    pub status: Option<PatternStatus>,
    pub trend: Option<Trend>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PatternUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply every present field to `pattern`.
    pub fn apply(&self, pattern: &mut IssuePattern) -> Result<(), CatalogError> {
        if let Some(count) = self.occurrence_count {
            if count == 0 {
                return Err(CatalogError::ZeroOccurrences(pattern.pattern_id));
            }
            pattern.occurrence_count = count;
        }
        if let Some(ref id) = self.last_seen_work_unit_id {
            pattern.last_seen_work_unit_id = id.clone();
        }
        if let Some(severity) = self.severity {
            pattern.severity = severity;
        }
        if let Some(ref solutions) = self.proven_solutions {
            pattern.proven_solutions = solutions.clone();
        }
        if let Some(status) = self.status {
            pattern.status = status;
        }
        if let Some(trend) = self.trend {
            pattern.trend = trend;
        }
        if let Some(at) = self.updated_at {
            pattern.updated_at = at;
        }
        Ok(())
    }
}

/// Fields of a pattern about to be created; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPattern {
    pub category: Category,
    pub issue_summary: String,
    pub occurrence_count: u32,
    pub first_seen_work_unit_id: String,
    pub last_seen_work_unit_id: String,
    pub severity: Severity,
}

impl NewPattern {
    pub fn into_pattern(self, pattern_id: PatternId, now: DateTime<Utc>) -> IssuePattern {
        IssuePattern {
            pattern_id,
            category: self.category,
            issue_summary: self.issue_summary,
            occurrence_count: self.occurrence_count.max(1),
            first_seen_work_unit_id: self.first_seen_work_unit_id,
            last_seen_work_unit_id: self.last_seen_work_unit_id,
            severity: self.severity,
            proven_solutions: Vec::new(),
            status: PatternStatus::Active,
            trend: Trend::Stable,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Result of an atomic create.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(IssuePattern),
    /// An active pattern with the same fingerprint already existed; untouched.
    Existing(IssuePattern),
}

impl CreateOutcome {
    pub fn pattern(&self) -> &IssuePattern {
        match self {
            Self::Created(p) | Self::Existing(p) => p,
        }
    }
}

/// How a candidate contributed to a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Matched,
    Created,
}

/// Source link from a pattern back to one candidate occurrence.
///
/// `(work_unit_id, source, candidate_index)` identifies the candidate (the
/// index is counted within its source), so a curator can spot the same
/// candidate counted twice by repeated analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternLink {
    pub pattern_id: PatternId,
    pub work_unit_id: String,
    pub source: IssueSource,
    pub candidate_index: usize,
    pub kind: String,
    pub description: String,
    pub link: LinkKind,
    pub linked_at: DateTime<Utc>,
}

/// Storage for issue patterns.
pub trait PatternStore: Send + Sync {
    /// Every pattern in insertion order.
    fn list_all(&self) -> Result<Vec<IssuePattern>, CatalogError>;

    /// Active patterns in insertion order.
    fn list_active(&self) -> Result<Vec<IssuePattern>, CatalogError> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|p| p.status.is_active())
            .collect())
    }

    fn get(&self, id: PatternId) -> Result<Option<IssuePattern>, CatalogError>;

    /// Insert a fully-formed pattern. Rejects a duplicate id or an id not
    /// greater than every existing one.
    fn insert(&self, pattern: IssuePattern) -> Result<(), CatalogError>;

    /// Apply a partial update and return the updated pattern.
    fn update(&self, id: PatternId, update: &PatternUpdate) -> Result<IssuePattern, CatalogError>;

    /// Allocate the next id and insert, unless an active pattern with the
    /// same summary fingerprint exists.
    fn create_if_absent(
        &self,
        new: NewPattern,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome, CatalogError>;

    fn link_occurrence(&self, link: PatternLink) -> Result<(), CatalogError>;

    fn links_for(&self, id: PatternId) -> Result<Vec<PatternLink>, CatalogError>;
}

/// Reject a persisted document whose `schema_version` this build cannot read.
pub(crate) fn ensure_schema(found: String) -> Result<(), CatalogError> {
    if is_compatible(&found) {
        return Ok(());
    }
    Err(CatalogError::IncompatibleSchema {
        found,
        expected: SCHEMA_VERSION.to_string(),
    })
}

/// In-memory catalog contents shared by the store implementations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogState {
    pub patterns: Vec<IssuePattern>,
}

impl CatalogState {
    pub fn latest_id(&self) -> Option<PatternId> {
        self.patterns.iter().map(|p| p.pattern_id).max()
    }

    pub fn next_id(&self) -> PatternId {
        self.latest_id()
            .map(|id| id.next())
            .unwrap_or_else(PatternId::first)
    }

    pub fn get(&self, id: PatternId) -> Option<&IssuePattern> {
        self.patterns.iter().find(|p| p.pattern_id == id)
    }

    pub fn insert(&mut self, pattern: IssuePattern) -> Result<(), CatalogError> {
        if self.get(pattern.pattern_id).is_some() {
            return Err(CatalogError::DuplicateId(pattern.pattern_id));
        }
        if let Some(latest) = self.latest_id() {
            if pattern.pattern_id <= latest {
                return Err(CatalogError::NonIncreasingId {
                    id: pattern.pattern_id,
                    latest,
                });
            }
        }
        if pattern.occurrence_count == 0 {
            return Err(CatalogError::ZeroOccurrences(pattern.pattern_id));
        }
        self.patterns.push(pattern);
        Ok(())
    }

    pub fn update(
        &mut self,
        id: PatternId,
        update: &PatternUpdate,
    ) -> Result<IssuePattern, CatalogError> {
        let pattern = self
            .patterns
            .iter_mut()
            .find(|p| p.pattern_id == id)
            .ok_or(CatalogError::NotFound(id))?;
        let mut updated = pattern.clone();
        update.apply(&mut updated)?;
        *pattern = updated.clone();
        Ok(updated)
    }

    pub fn create_if_absent(
        &mut self,
        new: NewPattern,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome, CatalogError> {
        let key = fingerprint(&new.issue_summary);
        if let Some(existing) = self
            .patterns
            .iter()
            .find(|p| p.status.is_active() && fingerprint(&p.issue_summary) == key)
        {
            return Ok(CreateOutcome::Existing(existing.clone()));
        }
        let pattern = new.into_pattern(self.next_id(), now);
        self.insert(pattern.clone())?;
        Ok(CreateOutcome::Created(pattern))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;

    pub fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, 9, 0, 0).unwrap()
    }

    pub fn new_pattern(summary: &str) -> NewPattern {
        NewPattern {
            category: Category::Database,
            issue_summary: summary.to_string(),
            occurrence_count: 2,
            first_seen_work_unit_id: "wu-1".into(),
            last_seen_work_unit_id: "wu-2".into(),
            severity: Severity::High,
        }
    }
}
