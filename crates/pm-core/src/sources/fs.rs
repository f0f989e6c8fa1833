//! Filesystem-backed collaborator stores.
//!
//! # Layout
//!
//! ```text
//! <data_dir>/
//! ├── work_units.json              # [{"id": "...", "key": "..."}]
//! ├── retrospectives/<id>.json     # {"improvement_items": [...]}
//! ├── check_failures/<id>.json     # [{"findings": ..., "checker_name": "..."}]
//! └── handoffs/                    # free-text documents, matched by key in file name
//! ```
//!
//! Missing files and directories read as "nothing recorded". Records of an
//! unexpected shape are coerced; only invalid JSON is an error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{
    CheckFailure, CheckFailureStore, HandoffDocument, HandoffStore, Retrospective,
    RetrospectiveStore, SourceError, WorkUnit, WorkUnitStore,
};

const WORK_UNITS_FILE: &str = "work_units.json";
const RETROSPECTIVES_DIR: &str = "retrospectives";
const CHECK_FAILURES_DIR: &str = "check_failures";
const HANDOFFS_DIR: &str = "handoffs";

/// All four collaborator stores over one data directory.
#[derive(Debug, Clone)]
pub struct FsSources {
    root: PathBuf,
}

impl FsSources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn handoffs_dir(&self) -> PathBuf {
        self.root.join(HANDOFFS_DIR)
    }

    /// Per-work-unit record path; ids that could escape the directory are rejected.
    fn record_path(&self, dir: &str, work_unit_id: &str) -> Option<PathBuf> {
        let safe = !work_unit_id.is_empty()
            && work_unit_id != "."
            && work_unit_id != ".."
            && !work_unit_id.contains(['/', '\\']);
        if !safe {
            warn!(work_unit = work_unit_id, "rejecting unsafe work unit id");
            return None;
        }
        Some(self.root.join(dir).join(format!("{work_unit_id}.json")))
    }
}

/// Read and parse a JSON file; `Ok(None)` if it does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, SourceError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SourceError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| SourceError::Json {
            path: path.to_path_buf(),
            source,
        })
}

impl WorkUnitStore for FsSources {
    fn get_work_unit(&self, id: &str) -> Result<Option<WorkUnit>, SourceError> {
        let path = self.root.join(WORK_UNITS_FILE);
        let units: Vec<WorkUnit> = read_json(&path)?.unwrap_or_default();
        Ok(units.into_iter().find(|u| u.id == id))
    }
}

impl RetrospectiveStore for FsSources {
    fn get_retrospective(&self, work_unit_id: &str) -> Result<Option<Retrospective>, SourceError> {
        match self.record_path(RETROSPECTIVES_DIR, work_unit_id) {
            Some(path) => Ok(read_json(&path)?.map(Retrospective::from_value)),
            None => Ok(None),
        }
    }
}

impl CheckFailureStore for FsSources {
    fn list_failures(&self, work_unit_id: &str) -> Result<Vec<CheckFailure>, SourceError> {
        match self.record_path(CHECK_FAILURES_DIR, work_unit_id) {
            Some(path) => Ok(read_json(&path)?
                .map(CheckFailure::list_from_value)
                .unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }
}

impl HandoffStore for FsSources {
    fn documents_for(&self, work_unit_key: &str) -> Result<Vec<HandoffDocument>, SourceError> {
        let dir = self.handoffs_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %dir.display(), "handoff directory missing");
                return Ok(Vec::new());
            }
            Err(source) => return Err(SourceError::Io { path: dir, source }),
        };

        let mut documents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SourceError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if work_unit_key.is_empty() || !file_name.contains(work_unit_key) {
                continue;
            }
            match fs::read(&path) {
                Ok(bytes) => documents.push(HandoffDocument {
                    file_name,
                    content: String::from_utf8_lossy(&bytes).into_owned(),
                }),
                Err(source) => return Err(SourceError::Io { path, source }),
            }
        }

        documents.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(documents)
    }
}
