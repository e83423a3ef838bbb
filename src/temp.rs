//! Scoped temporary files
//!
//! Every temporary path a request allocates is owned by a [`TempFile`] so
//! cleanup happens on all exit paths, success or failure. Release is
//! best-effort: a failed removal is logged, never surfaced to the request.

use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// A uniquely named path under the system temp directory, removed on drop.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn new(extension: &str) -> Self {
        let path = std::env::temp_dir().join(format!("emberlay-{}.{}", Uuid::new_v4(), extension));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove temp file {}: {}", self.path.display(), e);
            }
        }
    }
}
