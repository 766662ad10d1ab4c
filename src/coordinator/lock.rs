use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::LockError;

pub const LOCK_FILE: &str = ".bdd-recon.lock";

/// Exclusive claim on a project root for the duration of one conversion.
/// The lock file is removed when the guard is dropped.
#[derive(Debug)]
pub struct ProjectLock {
    path: PathBuf,
}

impl ProjectLock {
    pub fn acquire(project_root: &Path) -> Result<Self, LockError> {
        let path = project_root.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(LockError::Held(path)),
            Err(source) => return Err(LockError::Io { path, source }),
        };

        if let Err(e) = writeln!(file, "{}", std::process::id()) {
            warn!(path = %path.display(), error = %e, "could not record owner in lock file");
        }
        debug!(path = %path.display(), "project lock acquired");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "could not remove project lock");
        }
    }
}
