use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelCacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Invalid cache key '{0}'")]
    InvalidKey(String),

    #[error("Artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("Cannot publish to {}: {reason}", .target.display())]
    Publish { target: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, ModelCacheError>;
