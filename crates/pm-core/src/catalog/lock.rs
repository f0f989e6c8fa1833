//! Cross-process writer lock for the file-backed catalog.
//!
//! Every `pm-core` invocation is its own process, so an in-process mutex does
//! not serialize load-modify-save cycles. An advisory exclusive lock on
//! `<catalog dir>/.lock` does; it is held for the whole cycle and released on
//! drop.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use super::CatalogError;

/// Lock file name inside the catalog directory.
pub const LOCK_FILE: &str = ".lock";

/// Held exclusive lock on a catalog directory.
#[derive(Debug)]
pub struct CatalogLock {
    file: File,
    path: PathBuf,
}

impl CatalogLock {
    /// Block until the exclusive lock on `dir` is held. Creates `dir`.
    pub fn acquire(dir: &Path) -> Result<Self, CatalogError> {
        let path = dir.join(LOCK_FILE);
        let io_err = |source| CatalogError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(dir).map_err(io_err)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;
        file.lock_exclusive().map_err(io_err)?;
        debug!(path = %path.display(), "catalog lock acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CatalogLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(path = %self.path.display(), error = %e, "failed to release catalog lock");
        }
    }
}
