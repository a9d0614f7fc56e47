//! Process-level lock that keeps two bot instances off the same catalog.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{error, warn};

use crate::error::{Error, Result};

/// Exclusive lock guard next to the catalog file (`<catalog>.lock`).
pub struct CatalogLock {
    path: PathBuf,
    lock_file: Option<File>,
}

impl CatalogLock {
    /// Lock file path used for a given catalog.
    pub fn path_for<P: AsRef<Path>>(catalog_path: P) -> PathBuf {
        let mut name = catalog_path.as_ref().as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Acquire an exclusive lock for the catalog at `catalog_path`.
    pub fn acquire<P: AsRef<Path>>(catalog_path: P) -> Result<Self> {
        let path = Self::path_for(catalog_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                lock_file: Some(lock_file),
            }),
            Err(_) => {
                error!(
                    lock = %path.display(),
                    "Catalog is already owned by another running bot; stop it first"
                );
                Err(Error::CatalogLocked)
            }
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(file) = self.lock_file.take() {
            if let Err(e) = file.unlock() {
                warn!(error = %e, "Failed to unlock catalog lock file");
            }
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Drop for CatalogLock {
    fn drop(&mut self) {
        self.release();
    }
}
