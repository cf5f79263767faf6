//! Per-build workspace directories.

use ferry_core::ids::BuildId;
use ferry_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A fresh, uniquely named directory that a build's stages run in.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    keep: bool,
}

impl Workspace {
    /// Create a new empty directory under `root`, or under the system temp
    /// directory when no root is configured.
    pub fn acquire(root: Option<&Path>, build_id: BuildId, keep: bool) -> Result<Self> {
        let prefix = format!("ferry-{}-", build_id).replace('#', "-");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| {
                    Error::Workspace(format!("Failed to create {}: {}", root.display(), e))
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| Error::Workspace(format!("Failed to create workspace: {}", e)))?;

        let path = dir.keep();
        info!(build_id = %build_id, workspace = %path.display(), "Acquired workspace");
        Ok(Self { path, keep })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory unless it is configured to be kept. Returns the
    /// path when it is left on disk.
    pub fn release(self) -> Option<PathBuf> {
        if self.keep {
            return Some(self.path);
        }

        info!(workspace = %self.path.display(), "Removing workspace");
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(workspace = %self.path.display(), error = %e, "Failed to remove workspace");
        }
        None
    }
}
