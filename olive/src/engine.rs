//! The external conversion engine seam

use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;

use sdonnx_execution_providers::{BackendType, RuntimeVersion};

use crate::error::{OliveError, Result};
use crate::footprint::FootprintSet;
use crate::process::PythonCommand;
use crate::template::Workflow;

/// Module that runs an Olive workflow from a config file
pub const OLIVE_RUN_MODULE: &str = "olive.workflows.run";

const RUNTIME_VERSION_SCRIPT: &str = "import onnxruntime; print(onnxruntime.__version__)";

/// Runs one workflow to completion and reports its footprints
pub trait WorkflowEngine {
    fn run(&self, workflow: &Workflow) -> Result<FootprintSet>;
}

/// Olive driven through its Python command line
#[derive(Debug, Clone, Default)]
pub struct PythonOliveEngine {
    python: PythonCommand,
}

impl PythonOliveEngine {
    pub fn new(python: PythonCommand) -> Self {
        Self { python }
    }

    /// onnxruntime version installed next to Olive
    pub fn onnxruntime_version(&self) -> Result<RuntimeVersion> {
        let stdout = self.python.run_code("onnxruntime.__version__", RUNTIME_VERSION_SCRIPT, [] as [&OsStr; 0])?;
        let line = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .unwrap_or_default();
        line.parse()
            .map_err(|_| OliveError::InvalidRuntimeVersion(line.to_string()))
    }

    /// Where Olive writes the footprints of `workflow`:
    /// `<output_dir>/<output_name>_<device>_footprints.json`
    pub fn footprints_path(workflow: &Workflow) -> Result<PathBuf> {
        let provider = workflow
            .execution_provider()
            .ok_or_else(|| OliveError::MissingField("engine.execution_providers".into()))?;
        let backend = BackendType::from_provider_name(provider)
            .ok_or_else(|| OliveError::UnsupportedProvider(provider.to_string()))?;

        Ok(Self::output_dir(workflow)?.join(format!(
            "{}_{}_footprints.json",
            workflow.output_name(),
            backend.device_name()
        )))
    }

    fn output_dir(workflow: &Workflow) -> Result<PathBuf> {
        workflow
            .output_dir()
            .ok_or_else(|| OliveError::MissingField("engine.output_dir".into()))
    }
}

impl WorkflowEngine for PythonOliveEngine {
    fn run(&self, workflow: &Workflow) -> Result<FootprintSet> {
        let output_dir = Self::output_dir(workflow)?;
        let footprints = Self::footprints_path(workflow)?;
        fs::create_dir_all(&output_dir)?;

        // Stale footprints from an earlier run must not be mistaken for ours
        if footprints.exists() {
            fs::remove_file(&footprints)?;
        }

        let config_path = output_dir.join(format!("{}_workflow.json", workflow.output_name()));
        fs::write(&config_path, workflow.to_json_pretty()?)?;

        log::info!("Running Olive workflow for {}", workflow.name());
        self.python.run_module(
            OLIVE_RUN_MODULE,
            [OsStr::new("--config"), config_path.as_os_str()],
        )?;

        let set = FootprintSet::from_file(&footprints)?;
        log::debug!("{} footprint(s) in {}", set.len(), footprints.display());
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workflow(provider: &str, output_dir: &str) -> Workflow {
        Workflow::from_value(
            "unet",
            json!({ "engine": { "execution_providers": [provider], "output_dir": output_dir } }),
        )
    }

    #[test]
    fn test_footprints_path_uses_device_name() {
        let cases = [
            ("CPUExecutionProvider", "cpu"),
            ("DmlExecutionProvider", "gpu-dml"),
            ("CUDAExecutionProvider", "gpu-cuda"),
            ("ROCMExecutionProvider", "gpu-rocm"),
            ("OpenVINOExecutionProvider", "gpu"),
        ];
        for (provider, device) in cases {
            let path = PythonOliveEngine::footprints_path(&workflow(provider, "/work")).unwrap();
            assert_eq!(path, PathBuf::from(format!("/work/unet_{device}_footprints.json")));
        }
    }

    #[test]
    fn test_footprints_path_errors() {
        assert!(matches!(
            PythonOliveEngine::footprints_path(&workflow("TensorrtExecutionProvider", "/work")),
            Err(OliveError::UnsupportedProvider(_))
        ));
        let no_dir = Workflow::from_value(
            "unet",
            json!({ "engine": { "execution_providers": ["CPUExecutionProvider"] } }),
        );
        assert!(matches!(
            PythonOliveEngine::footprints_path(&no_dir),
            Err(OliveError::MissingField(_))
        ));
    }
}
