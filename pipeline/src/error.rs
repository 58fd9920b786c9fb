/// Pipeline errors
///
/// Everything a stage can fail with. Stages catch these at their boundary
/// and fall back; only the final fallback's construction error reaches the
/// caller.
use thiserror::Error;

use crate::registry::ComponentKind;
use crate::types::PipelineClass;
use sdonnx_model_cache::ComponentRef;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No component kind registered for {0}")]
    UnknownComponent(ComponentRef),

    #[error("No loader registered for {0:?} components")]
    NoLoader(ComponentKind),

    #[error("Failed to load component '{name}': {message}")]
    ComponentLoad { name: String, message: String },

    #[error("{class} is missing required component(s): {}", .missing.join(", "))]
    MissingComponents {
        class: PipelineClass,
        missing: Vec<String>,
    },

    #[error("{0} cannot be loaded from a single checkpoint file")]
    UnsupportedSingleFile(PipelineClass),

    #[error("Checkpoint extraction failed: {0}")]
    Extraction(String),

    #[error("Cache error: {0}")]
    Cache(#[from] sdonnx_model_cache::ModelCacheError),

    #[error("ONNX error: {0}")]
    Onnx(#[from] sdonnx_onnx_loader::OnnxError),

    #[error("Olive error: {0}")]
    Olive(#[from] sdonnx_olive::OliveError),

    #[error("Provider error: {0}")]
    Provider(#[from] sdonnx_execution_providers::ProviderError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
