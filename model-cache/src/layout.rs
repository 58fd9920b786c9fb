//! On-disk layout of the conversion/optimization cache
//!
//! ```text
//! <cache_root>/
//!   v1-5-pruned.safetensors/             conversion entry
//!   v1-5-pruned.safetensors-512w-768h/   optimization entry
//!   .staging-XXXXXX/                     in-progress build (never a hit)
//! ```
//!
//! An entry directory only appears once complete, so existence is the hit test.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ModelCacheError, Result};

/// Name prefix of private build directories
pub const STAGING_PREFIX: &str = ".staging-";

/// Directory name of one cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key of a converted model: the source identity itself
    pub fn conversion(identity: &str) -> Result<Self> {
        Self::validated(identity.to_string())
    }

    /// Key of an optimized model: `<identity>-<width>w-<height>h`
    pub fn optimization(identity: &str, width: u32, height: u32) -> Result<Self> {
        Self::validated(format!("{identity}-{width}w-{height}h"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validated(key: String) -> Result<Self> {
        let bad = key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(['/', '\\'])
            || key.starts_with(STAGING_PREFIX);
        if bad {
            return Err(ModelCacheError::InvalidKey(key));
        }
        Ok(Self(key))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Cache hit test
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_dir()
    }

    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        let path = self.entry_path(key);
        if path.exists() {
            fs::remove_dir_all(&path)?;
            log::info!("Removed cache entry {}", path.display());
        }
        Ok(())
    }

    /// Delete build directories left behind by interrupted runs.
    /// Returns how many were removed.
    pub fn sweep_stale_staging(&self) -> Result<usize> {
        sweep_staging_in(&self.root)
    }
}

/// Remove every `.staging-*` directory directly under `dir`
pub fn sweep_staging_in(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_staging = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(STAGING_PREFIX));
        if is_staging && entry.file_type()?.is_dir() {
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!(
                    "Could not remove stale staging directory {}: {}",
                    entry.path().display(),
                    e
                ),
            }
        }
    }

    if removed > 0 {
        log::info!("Removed {} stale staging director(ies) in {}", removed, dir.display());
    }
    Ok(removed)
}
