use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OliveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template {}: {message}", .path.display())]
    Template { path: PathBuf, message: String },

    #[error("Workflow has no object at '{0}'")]
    MissingField(String),

    #[error("Unknown template variable '{0}'")]
    UnknownVariable(String),

    #[error("Unsupported execution provider '{0}'")]
    UnsupportedProvider(String),

    #[error("Unrecognized onnxruntime version '{0}'")]
    InvalidRuntimeVersion(String),

    #[error("`{command}` exited with {status}: {stderr}")]
    Process {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Footprints not found at {}", .0.display())]
    FootprintsNotFound(PathBuf),

    #[error("No footprint produced by pass '{0}'")]
    NoMatchingFootprint(String),

    #[error("Invalid footprint '{id}': {message}")]
    InvalidFootprint { id: String, message: String },
}

pub type Result<T> = std::result::Result<T, OliveError>;
