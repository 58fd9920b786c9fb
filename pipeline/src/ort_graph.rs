//! Graph components backed by ONNX Runtime sessions.

use std::path::Path;
use std::sync::Arc;

use sdonnx_execution_providers::ExecutionTarget;
use sdonnx_model_cache::GRAPH_FILE;
use sdonnx_onnx_loader::OnnxSession;

use crate::component::{Component, InferenceGraph};
use crate::config::RunConfig;
use crate::error::Result;
use crate::registry::{ComponentLoader, SubmodelSpec};

impl InferenceGraph for OnnxSession {
    fn model_path(&self) -> &Path {
        OnnxSession::model_path(self)
    }
}

/// Loads `<dir>/model.onnx` on the execution target with the run's
/// dimension overrides
#[derive(Debug, Clone)]
pub struct OrtGraphLoader {
    target: ExecutionTarget,
}

impl OrtGraphLoader {
    pub fn new(target: ExecutionTarget) -> Self {
        Self { target }
    }
}

impl ComponentLoader for OrtGraphLoader {
    fn load(&self, spec: &SubmodelSpec, run: &RunConfig) -> Result<Component> {
        let session = OnnxSession::load_for_target(
            spec.directory.join(GRAPH_FILE),
            &self.target,
            &run.session_options(),
        )?;
        log::debug!("Loaded graph '{}' on {}", spec.name, self.target.name());

        Ok(Component::Graph {
            reference: spec.reference.clone(),
            graph: Arc::new(session),
        })
    }
}
