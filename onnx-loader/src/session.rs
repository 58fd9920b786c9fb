//! ONNX session management

use crate::error::{OnnxError, Result};
use crate::providers_bridge;
use crate::session_options::SessionOptions;
use sdonnx_execution_providers::{DynExecutionProvider, ExecutionTarget};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// ONNX inference session for one sub-component graph
///
/// Thin wrapper around `ort::Session`; the raw session is reachable through
/// [`OnnxSession::session`] for running inference.
#[derive(Clone)]
pub struct OnnxSession {
    model_path: PathBuf,
    session: Arc<Mutex<Session>>,
}

impl std::fmt::Debug for OnnxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSession")
            .field("model_path", &self.model_path)
            .finish_non_exhaustive()
    }
}

impl OnnxSession {
    /// Load a graph for an execution target
    pub fn load_for_target<P: AsRef<Path>>(
        model_path: P,
        target: &ExecutionTarget,
        options: &SessionOptions,
    ) -> Result<Self> {
        Self::load_with_providers(model_path, &[target.provider().clone()], options)
    }

    /// Load a graph with specific execution providers
    pub fn load_with_providers<P: AsRef<Path>>(
        model_path: P,
        providers: &[DynExecutionProvider],
        options: &SessionOptions,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        log::info!("Loading ONNX model from: {:?}", model_path);

        if !model_path.is_file() {
            return Err(OnnxError::ModelLoadFailed(format!(
                "Model file not found: {:?}",
                model_path
            )));
        }

        let ort_providers = providers_bridge::bridge_to_ort(providers)?;

        let mut builder = Session::builder()
            .map_err(|e| OnnxError::SessionCreationFailed(e.to_string()))?
            .with_execution_providers(&ort_providers)
            .map_err(|e| OnnxError::SessionCreationFailed(
                format!("Failed to set execution providers: {}", e)
            ))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| OnnxError::SessionCreationFailed(
                format!("Failed to set optimization level: {}", e)
            ))?
            .with_memory_pattern(options.memory_pattern)
            .map_err(|e| OnnxError::SessionCreationFailed(
                format!("Failed to set memory pattern: {}", e)
            ))?;

        if let Some(threads) = options.intra_threads {
            builder = builder
                .with_intra_threads(threads)
                .map_err(|e| OnnxError::SessionCreationFailed(
                    format!("Failed to set intra threads: {}", e)
                ))?;
        }

        for (name, value) in &options.dimension_overrides {
            builder = builder
                .with_dimension_override(name, *value)
                .map_err(|e| OnnxError::SessionCreationFailed(
                    format!("Failed to override dimension '{}': {}", name, e)
                ))?;
        }

        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| OnnxError::ModelLoadFailed(e.to_string()))?;

        log::info!("ONNX model loaded successfully");
        log::debug!(
            "  - {} dimension override(s), memory pattern {}",
            options.dimension_overrides.len(),
            if options.memory_pattern { "enabled" } else { "disabled" }
        );

        Ok(Self {
            model_path: model_path.to_path_buf(),
            session: Arc::new(Mutex::new(session)),
        })
    }

    /// Get model path
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Names of the graph inputs
    pub fn input_names(&self) -> Result<Vec<String>> {
        let session = self
            .session
            .lock()
            .map_err(|e| OnnxError::SessionCreationFailed(format!("Session lock failed: {}", e)))?;
        Ok(session.inputs.iter().map(|i| i.name.clone()).collect())
    }

    /// Get direct access to the underlying `ort::Session`
    pub fn session(&self) -> Arc<Mutex<Session>> {
        Arc::clone(&self.session)
    }
}
