//! Private build directories that become cache entries in one rename
//!
//! A [`StagingDir`] lives beside its final location (same filesystem, so the
//! rename is atomic). Dropping it without [`StagingDir::publish`] deletes
//! everything written so far.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::artifacts::{copy_tree_filtered, is_binary_model_file};
use crate::error::{ModelCacheError, Result};
use crate::layout::STAGING_PREFIX;

#[derive(Debug)]
pub struct StagingDir {
    dir: TempDir,
    target: PathBuf,
}

impl StagingDir {
    /// Create a staging directory for `target` in the target's parent
    pub fn create(target: impl Into<PathBuf>) -> Result<Self> {
        let target = target.into();
        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)?;

        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&parent)?;
        log::debug!("Staging {} in {}", target.display(), dir.path().display());

        Ok(Self { dir, target })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Copy `source` into the staging directory minus binary model files
    pub fn seed_from(&self, source: &Path) -> Result<usize> {
        let copied = copy_tree_filtered(source, self.path(), &is_binary_model_file)?;
        log::debug!("Seeded {} file(s) from {}", copied, source.display());
        Ok(copied)
    }

    /// Move the staging directory to its target
    ///
    /// Fails if the target already exists; the staging contents are then
    /// discarded with `self`.
    pub fn publish(self) -> Result<PathBuf> {
        if self.target.exists() {
            return Err(ModelCacheError::Publish {
                target: self.target,
                reason: "target already exists".to_string(),
            });
        }

        fs::rename(self.dir.path(), &self.target).map_err(|e| ModelCacheError::Publish {
            target: self.target.clone(),
            reason: e.to_string(),
        })?;
        // The TempDir guard now points at a path that no longer exists; its
        // drop-time removal is a no-op.
        drop(self.dir);

        log::info!("Published {}", self.target.display());
        Ok(self.target)
    }
}
