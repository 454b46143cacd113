// ABOUTME: Scoped ownership of the local working copy.
// ABOUTME: Dropping the guard removes the directory on success, failure, or interrupt.

use std::path::{Path, PathBuf};

/// A synced working copy that is deleted when this value is dropped.
#[derive(Debug)]
pub struct WorkingCopy {
    path: PathBuf,
}

impl WorkingCopy {
    /// Take ownership of `path`. From here on the directory is removed on drop.
    pub fn register(path: PathBuf) -> Self {
        tracing::debug!("Registered cleanup for {}", path.display());
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::info!("Removed local working copy {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove local working copy {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
