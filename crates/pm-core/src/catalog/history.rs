//! Candidate history: every candidate previously extracted, by work unit.
//!
//! Unmatched candidates are promoted to patterns by comparing them with the
//! candidates of *other* work units recorded here.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use pm_common::{IssueCandidate, IssueSource, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::file::{write_atomic, CATALOG_DIR};
use super::lock::CatalogLock;
use super::{ensure_schema, CatalogError};

const HISTORY_FILE: &str = "history.json";

/// A candidate recorded by an earlier analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalCandidate {
    pub work_unit_id: String,
    pub source: IssueSource,
    /// Position among that run's candidates from the same source.
    pub index: usize,
    pub kind: String,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

impl HistoricalCandidate {
    fn key(&self) -> (IssueSource, usize) {
        (self.source, self.index)
    }
}

/// Storage for historical candidates.
pub trait CandidateHistory: Send + Sync {
    /// Candidates of every work unit except `excluding_work_unit`, oldest first.
    fn prior_candidates(
        &self,
        excluding_work_unit: &str,
    ) -> Result<Vec<HistoricalCandidate>, CatalogError>;

    /// Record a run's candidates, replacing whatever was recorded for the
    /// same work unit. A candidate keeping its `(source, index)` slot keeps
    /// its original `recorded_at`.
    fn record_run(
        &self,
        work_unit_id: &str,
        candidates: &[IssueCandidate],
        now: DateTime<Utc>,
    ) -> Result<(), CatalogError>;
}

/// Shared replacement logic for both history stores.
fn replace_run(
    entries: &mut Vec<HistoricalCandidate>,
    work_unit_id: &str,
    candidates: &[IssueCandidate],
    now: DateTime<Utc>,
) {
    let previous: HashMap<(IssueSource, usize), DateTime<Utc>> = entries
        .iter()
        .filter(|e| e.work_unit_id == work_unit_id)
        .map(|e| (e.key(), e.recorded_at))
        .collect();
    entries.retain(|e| e.work_unit_id != work_unit_id);

    let indices = per_source_indices(candidates);
    entries.extend(candidates.iter().zip(indices).map(|(c, index)| {
        let recorded_at = previous
            .get(&(c.source, index))
            .copied()
            .unwrap_or(now);
        HistoricalCandidate {
            work_unit_id: work_unit_id.to_string(),
            source: c.source,
            index,
            kind: c.kind.clone(),
            description: c.description.clone(),
            recorded_at,
        }
    }));
    // Stable sort keeps within-run order for equal timestamps.
    entries.sort_by_key(|e| e.recorded_at);
}

/// Position of each candidate among the candidates of its own source, so a
/// change in one source does not renumber the others.
pub fn per_source_indices(candidates: &[IssueCandidate]) -> Vec<usize> {
    let mut next: HashMap<IssueSource, usize> = HashMap::new();
    candidates
        .iter()
        .map(|c| {
            let slot = next.entry(c.source).or_default();
            let index = *slot;
            *slot += 1;
            index
        })
        .collect()
}

fn others(entries: &[HistoricalCandidate], excluding: &str) -> Vec<HistoricalCandidate> {
    entries
        .iter()
        .filter(|e| e.work_unit_id != excluding)
        .cloned()
        .collect()
}

/// In-memory candidate history.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<HistoricalCandidate>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CandidateHistory for MemoryHistory {
    fn prior_candidates(
        &self,
        excluding_work_unit: &str,
    ) -> Result<Vec<HistoricalCandidate>, CatalogError> {
        let entries = self.entries.lock().map_err(|_| CatalogError::LockPoisoned)?;
        Ok(others(&entries, excluding_work_unit))
    }

    fn record_run(
        &self,
        work_unit_id: &str,
        candidates: &[IssueCandidate],
        now: DateTime<Utc>,
    ) -> Result<(), CatalogError> {
        let mut entries = self.entries.lock().map_err(|_| CatalogError::LockPoisoned)?;
        replace_run(&mut entries, work_unit_id, candidates, now);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedHistory {
    schema_version: String,
    #[serde(default)]
    candidates: Vec<HistoricalCandidate>,
}

/// Candidate history persisted as `<dir>/history.json`, sharing the
/// catalog's `<dir>/.lock`.
#[derive(Debug)]
pub struct FileHistory {
    dir: PathBuf,
    path: PathBuf,
}

impl FileHistory {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        Self {
            path: dir.join(HISTORY_FILE),
            dir,
        }
    }

    /// History stored next to the catalog in `<data_dir>/catalog`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(CATALOG_DIR))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<HistoricalCandidate>, CatalogError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CatalogError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let persisted: PersistedHistory =
            serde_json::from_str(&content).map_err(|source| CatalogError::Json {
                path: self.path.clone(),
                source,
            })?;
        ensure_schema(persisted.schema_version)?;
        Ok(persisted.candidates)
    }
}

impl CandidateHistory for FileHistory {
    fn prior_candidates(
        &self,
        excluding_work_unit: &str,
    ) -> Result<Vec<HistoricalCandidate>, CatalogError> {
        let _guard = CatalogLock::acquire(&self.dir)?;
        Ok(others(&self.load()?, excluding_work_unit))
    }

    fn record_run(
        &self,
        work_unit_id: &str,
        candidates: &[IssueCandidate],
        now: DateTime<Utc>,
    ) -> Result<(), CatalogError> {
        let _guard = CatalogLock::acquire(&self.dir)?;
        let mut entries = self.load()?;
        replace_run(&mut entries, work_unit_id, candidates, now);

        let persisted = PersistedHistory {
            schema_version: SCHEMA_VERSION.to_string(),
            candidates: entries,
        };
        let json = serde_json::to_vec_pretty(&persisted).map_err(|source| CatalogError::Json {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &json)?;
        debug!(
            work_unit = work_unit_id,
            count = candidates.len(),
            "recorded candidate history"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::at;
    use super::*;
    use tempfile::tempdir;

    fn candidate(work_unit: &str, description: &str) -> IssueCandidate {
        IssueCandidate {
            source: IssueSource::Retrospective,
            kind: IssueCandidate::KIND_CHALLENGE.to_string(),
            description: description.to_string(),
            work_unit_id: work_unit.to_string(),
            work_unit_key: work_unit.to_uppercase(),
            origin_file: None,
            origin_agent: None,
        }
    }

    #[test]
    fn prior_candidates_exclude_current_work_unit() {
        let history = MemoryHistory::new();
        history
            .record_run("wu-1", &[candidate("wu-1", "a")], at(1))
            .unwrap();
        history
            .record_run("wu-2", &[candidate("wu-2", "b")], at(2))
            .unwrap();

        let priors = history.prior_candidates("wu-2").unwrap();
        assert_eq!(priors.len(), 1);
        assert_eq!(priors[0].work_unit_id, "wu-1");
    }

    #[test]
    fn rerecording_replaces_and_keeps_timestamps() {
        let history = MemoryHistory::new();
        history
            .record_run("wu-1", &[candidate("wu-1", "a"), candidate("wu-1", "b")], at(1))
            .unwrap();
        history
            .record_run("wu-2", &[candidate("wu-2", "c")], at(2))
            .unwrap();
        history
            .record_run("wu-1", &[candidate("wu-1", "a")], at(3))
            .unwrap();

        assert_eq!(history.len(), 2);
        let priors = history.prior_candidates("none").unwrap();
        assert_eq!(priors[0].work_unit_id, "wu-1");
        assert_eq!(priors[0].recorded_at, at(1));
        assert_eq!(priors[1].work_unit_id, "wu-2");
    }

    #[test]
    fn indices_are_counted_per_source() {
        let mut handoff = candidate("wu-1", "seed data missing");
        handoff.source = IssueSource::HandoffDoc;
        let batch = [
            candidate("wu-1", "a"),
            handoff.clone(),
            candidate("wu-1", "b"),
            handoff,
        ];
        assert_eq!(per_source_indices(&batch), vec![0, 0, 1, 1]);
    }

    #[test]
    fn new_retrospective_item_keeps_other_sources_timestamps() {
        let mut handoff = candidate("wu-1", "seed data missing");
        handoff.source = IssueSource::HandoffDoc;

        let history = MemoryHistory::new();
        history
            .record_run("wu-1", &[candidate("wu-1", "a"), handoff.clone()], at(1))
            .unwrap();
        history
            .record_run(
                "wu-1",
                &[candidate("wu-1", "a"), candidate("wu-1", "b"), handoff],
                at(4),
            )
            .unwrap();

        let priors = history.prior_candidates("other").unwrap();
        let stamp = |description: &str| {
            priors
                .iter()
                .find(|p| p.description == description)
                .map(|p| p.recorded_at)
                .unwrap()
        };
        assert_eq!(stamp("seed data missing"), at(1));
        assert_eq!(stamp("a"), at(1));
        assert_eq!(stamp("b"), at(4));
    }

    #[test]
    fn file_history_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let history = FileHistory::in_data_dir(dir.path());
        assert!(history.prior_candidates("wu-1").unwrap().is_empty());

        history
            .record_run("wu-1", &[candidate("wu-1", "schema drift")], at(1))
            .unwrap();
        history
            .record_run("wu-1", &[candidate("wu-1", "schema drift")], at(5))
            .unwrap();

        let reopened = FileHistory::in_data_dir(dir.path());
        let priors = reopened.prior_candidates("wu-2").unwrap();
        assert_eq!(priors.len(), 1);
        assert_eq!(priors[0].description, "schema drift");
        assert_eq!(priors[0].recorded_at, at(1));
    }

    #[test]
    fn concurrent_runs_are_all_recorded() {
        let dir = tempdir().unwrap();
        let writers: Vec<_> = (0..4)
            .map(|n| {
                let data_dir = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    let history = FileHistory::in_data_dir(&data_dir);
                    for round in 0..10 {
                        let wu = format!("wu-{n}-{round}");
                        history
                            .record_run(&wu, &[candidate(&wu, "flaky login spec")], at(1))
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let priors = FileHistory::in_data_dir(dir.path())
            .prior_candidates("none")
            .unwrap();
        assert_eq!(priors.len(), 40);
    }
}
