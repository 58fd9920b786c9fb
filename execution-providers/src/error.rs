use thiserror::Error;
use serde::{Serialize, Deserialize};

/// Errors that can occur when working with execution providers
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ProviderError {
    #[error("Unsupported provider: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid runtime version '{0}': expected MAJOR.MINOR[.PATCH]")]
    InvalidRuntimeVersion(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
