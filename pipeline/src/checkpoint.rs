//! Single-file checkpoints
//!
//! Checkpoint metadata (title, hash) is computed elsewhere and only carried
//! through. Unpacking a checkpoint into a diffusers directory is delegated to
//! a [`CheckpointExtractor`].

use std::ffi::OsStr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use sdonnx_olive::PythonCommand;

use crate::error::{PipelineError, Result};
use crate::types::Architecture;

/// Externally supplied checkpoint description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub title: String,
    pub filename: String,
    pub hash: Option<String>,
    pub short_hash: Option<String>,
}

/// Unpacks a single-file checkpoint into a model directory at `dest`
pub trait CheckpointExtractor {
    fn extract(&self, checkpoint: &Path, architecture: Architecture, dest: &Path) -> Result<()>;
}

const EXTRACT_SCRIPT: &str = r#"
import sys
import diffusers
checkpoint, dest, arch = sys.argv[1], sys.argv[2], sys.argv[3]
cls = diffusers.StableDiffusionXLPipeline if arch == "sdxl" else diffusers.StableDiffusionPipeline
pipeline = cls.from_single_file(checkpoint)
pipeline.save_pretrained(dest)
"#;

/// Extraction through diffusers' single-file loader
#[derive(Debug, Clone, Default)]
pub struct PythonCheckpointExtractor {
    python: PythonCommand,
}

impl PythonCheckpointExtractor {
    pub fn new(python: PythonCommand) -> Self {
        Self { python }
    }
}

impl CheckpointExtractor for PythonCheckpointExtractor {
    fn extract(&self, checkpoint: &Path, architecture: Architecture, dest: &Path) -> Result<()> {
        log::info!("Unpacking {} into {}", checkpoint.display(), dest.display());
        self.python
            .run_code(
                "diffusers.from_single_file",
                EXTRACT_SCRIPT,
                [
                    checkpoint.as_os_str(),
                    dest.as_os_str(),
                    OsStr::new(architecture.template_prefix()),
                ],
            )
            .map_err(|e| PipelineError::Extraction(e.to_string()))?;

        if !dest.join(sdonnx_model_cache::MODEL_INDEX).is_file() {
            return Err(PipelineError::Extraction(format!(
                "no {} written to {}",
                sdonnx_model_cache::MODEL_INDEX,
                dest.display()
            )));
        }
        Ok(())
    }
}
