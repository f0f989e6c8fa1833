//! JSON-file pattern catalog.
//!
//! # Storage Structure
//!
//! ```text
//! <data_dir>/catalog/
//! ├── patterns.json        # {"schema_version": "1.0.0", "patterns": [...]}
//! ├── occurrences.jsonl    # one PatternLink per line
//! ├── history.json         # candidate history (see `history`)
//! └── .lock                # writer lock
//! ```
//!
//! Every operation holds the exclusive lock on `catalog/.lock` (see `lock`)
//! across its load-modify-save cycle, so separate processes sharing a data
//! directory never lose each other's writes. Files are replaced through a
//! per-writer temp file and rename.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use pm_common::{IssuePattern, PatternId, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::lock::CatalogLock;
use super::{
    ensure_schema, CatalogError, CatalogState, CreateOutcome, NewPattern, PatternLink, PatternStore,
    PatternUpdate,
};

/// Catalog subdirectory under the data directory.
pub const CATALOG_DIR: &str = "catalog";

const PATTERNS_FILE: &str = "patterns.json";
const LINKS_FILE: &str = "occurrences.jsonl";

/// On-disk catalog document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCatalog {
    pub schema_version: String,
    #[serde(default)]
    pub patterns: Vec<IssuePattern>,
}

impl PersistedCatalog {
    fn from_state(state: CatalogState) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            patterns: state.patterns,
        }
    }
}

/// Catalog persisted under `<dir>/patterns.json`.
#[derive(Debug)]
pub struct FileCatalog {
    dir: PathBuf,
}

impl FileCatalog {
    /// Catalog stored directly in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Catalog stored in `<data_dir>/catalog`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(CATALOG_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn patterns_path(&self) -> PathBuf {
        self.dir.join(PATTERNS_FILE)
    }

    pub fn links_path(&self) -> PathBuf {
        self.dir.join(LINKS_FILE)
    }

    fn guard(&self) -> Result<CatalogLock, CatalogError> {
        CatalogLock::acquire(&self.dir)
    }

    fn load(&self) -> Result<CatalogState, CatalogError> {
        let path = self.patterns_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CatalogState::default()),
            Err(source) => return Err(CatalogError::Io { path, source }),
        };
        let persisted: PersistedCatalog =
            serde_json::from_str(&content).map_err(|source| CatalogError::Json {
                path: path.clone(),
                source,
            })?;
        ensure_schema(persisted.schema_version)?;
        Ok(CatalogState {
            patterns: persisted.patterns,
        })
    }

    fn save(&self, state: CatalogState) -> Result<(), CatalogError> {
        let path = self.patterns_path();
        let json = serde_json::to_vec_pretty(&PersistedCatalog::from_state(state)).map_err(
            |source| CatalogError::Json {
                path: path.clone(),
                source,
            },
        )?;
        write_atomic(&path, &json)?;
        debug!(path = %path.display(), "catalog saved");
        Ok(())
    }

    /// Load, mutate, and save under the writer lock.
    fn modify<T>(
        &self,
        f: impl FnOnce(&mut CatalogState) -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        let _guard = self.guard()?;
        let mut state = self.load()?;
        let out = f(&mut state)?;
        self.save(state)?;
        Ok(out)
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `bytes` to `path` via a sibling temp file and rename. The temp name
/// carries the pid and a counter so concurrent writers never share one.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CatalogError> {
    let io_err = |source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_path = path.with_extension(format!("json.{}.{seq}.tmp", process::id()));
    {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.flush().map_err(io_err)?;
    }
    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        io_err(source)
    })
}

impl PatternStore for FileCatalog {
    fn list_all(&self) -> Result<Vec<IssuePattern>, CatalogError> {
        let _guard = self.guard()?;
        Ok(self.load()?.patterns)
    }

    fn get(&self, id: PatternId) -> Result<Option<IssuePattern>, CatalogError> {
        let _guard = self.guard()?;
        Ok(self.load()?.get(id).cloned())
    }

    fn insert(&self, pattern: IssuePattern) -> Result<(), CatalogError> {
        self.modify(|s| s.insert(pattern))
    }

    fn update(&self, id: PatternId, update: &PatternUpdate) -> Result<IssuePattern, CatalogError> {
        self.modify(|s| s.update(id, update))
    }

    fn create_if_absent(
        &self,
        new: NewPattern,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome, CatalogError> {
        let _guard = self.guard()?;
        let mut state = self.load()?;
        let outcome = state.create_if_absent(new, now)?;
        if matches!(outcome, CreateOutcome::Created(_)) {
            self.save(state)?;
        }
        Ok(outcome)
    }

    fn link_occurrence(&self, link: PatternLink) -> Result<(), CatalogError> {
        let _guard = self.guard()?;
        let path = self.links_path();
        let io_err = |source| CatalogError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut line = serde_json::to_string(&link).map_err(|source| CatalogError::Json {
            path: path.clone(),
            source,
        })?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).map_err(io_err)
    }

    fn links_for(&self, id: PatternId) -> Result<Vec<PatternLink>, CatalogError> {
        let _guard = self.guard()?;
        let path = self.links_path();
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(CatalogError::Io { path, source }),
        };

        let mut links = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PatternLink>(&line) {
                Ok(link) if link.pattern_id == id => links.push(link),
                Ok(_) => {}
                Err(e) => {
                    // A torn trailing line from an interrupted append.
                    warn!(path = %path.display(), line = lineno + 1, error = %e, "skipping unreadable link");
                }
            }
        }
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::LinkKind;
    use super::*;
    use pm_common::IssueSource;
    use tempfile::tempdir;

    fn leftover_temp_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "tmp"))
            .collect()
    }

    #[test]
    fn missing_catalog_is_empty() {
        let dir = tempdir().unwrap();
        let catalog = FileCatalog::in_data_dir(dir.path());
        assert!(catalog.list_all().unwrap().is_empty());
        assert!(!catalog.patterns_path().exists());
    }

    #[test]
    fn created_patterns_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let catalog = FileCatalog::in_data_dir(dir.path());
            catalog.create_if_absent(new_pattern("schema drift"), at(1)).unwrap();
            catalog.create_if_absent(new_pattern("flaky e2e"), at(2)).unwrap();
        }
        let reopened = FileCatalog::in_data_dir(dir.path());
        let patterns = reopened.list_all().unwrap();
        let ids: Vec<String> = patterns.iter().map(|p| p.pattern_id.to_string()).collect();
        assert_eq!(ids, vec!["PAT-001", "PAT-002"]);

        let raw = fs::read_to_string(reopened.patterns_path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["schema_version"], SCHEMA_VERSION);
        assert_eq!(doc["patterns"][0]["issueSummary"], "schema drift");
        assert!(leftover_temp_files(reopened.dir()).is_empty());
    }

    #[test]
    fn separate_handles_do_not_lose_writes() {
        const PER_WRITER: usize = 25;
        let dir = tempdir().unwrap();

        let writers: Vec<_> = ["alpha", "beta"]
            .into_iter()
            .map(|name| {
                let data_dir = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    let catalog = FileCatalog::in_data_dir(&data_dir);
                    (0..PER_WRITER)
                        .map(|i| {
                            let summary = format!("{name} failure number {i}");
                            catalog
                                .create_if_absent(new_pattern(&summary), at(1))
                                .unwrap()
                                .pattern()
                                .pattern_id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut created: Vec<PatternId> = writers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        created.sort();

        let persisted = FileCatalog::in_data_dir(dir.path()).list_all().unwrap();
        let mut persisted_ids: Vec<PatternId> = persisted.iter().map(|p| p.pattern_id).collect();
        persisted_ids.sort();
        assert_eq!(persisted.len(), 2 * PER_WRITER);
        assert_eq!(persisted_ids, created);
        persisted_ids.dedup();
        assert_eq!(persisted_ids.len(), 2 * PER_WRITER, "duplicate pattern ids");
        assert!(leftover_temp_files(&dir.path().join(CATALOG_DIR)).is_empty());
    }

    #[test]
    fn incompatible_schema_is_rejected() {
        let dir = tempdir().unwrap();
        let catalog = FileCatalog::new(dir.path());
        fs::write(
            catalog.patterns_path(),
            r#"{"schema_version": "2.0.0", "patterns": []}"#,
        )
        .unwrap();
        assert!(matches!(
            catalog.list_all(),
            Err(CatalogError::IncompatibleSchema { .. })
        ));
    }

    #[test]
    fn corrupt_catalog_is_an_error() {
        let dir = tempdir().unwrap();
        let catalog = FileCatalog::new(dir.path());
        fs::write(catalog.patterns_path(), "not json").unwrap();
        assert!(matches!(catalog.list_all(), Err(CatalogError::Json { .. })));
    }

    #[test]
    fn links_append_and_skip_torn_lines() {
        let dir = tempdir().unwrap();
        let catalog = FileCatalog::new(dir.path());
        let link = PatternLink {
            pattern_id: PatternId::first(),
            work_unit_id: "wu-3".into(),
            source: IssueSource::CheckFailure,
            candidate_index: 2,
            kind: "verification_failure".into(),
            description: "3 specs failed".into(),
            link: LinkKind::Created,
            linked_at: at(3),
        };
        catalog.link_occurrence(link.clone()).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(catalog.links_path())
            .unwrap();
        file.write_all(b"{\"pattern_id\": \"PAT-0").unwrap();

        let links = catalog.links_for(PatternId::first()).unwrap();
        assert_eq!(links, vec![link]);
    }
}
