//! Settings and per-run configuration.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};

use sdonnx_execution_providers::TargetOptions;
use sdonnx_olive::{PythonCommand, TemplateVars};
use sdonnx_onnx_loader::SessionOptions;

use crate::error::{PipelineError, Result};
use crate::types::Architecture;

/// How a model is named inside the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheIdentity {
    /// Source file or directory name
    #[default]
    FileName,

    /// Source name plus the externally supplied short checkpoint hash
    FileNameAndHash,
}

/// Settings for conversion, optimization and the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxSettings {
    /// Root of the conversion and optimization cache
    pub cache_root: PathBuf,

    /// Scratch area shared by all stages of one run
    pub temp_dir: PathBuf,

    /// Holds `onnx/` and `olive/` workflow templates
    pub templates_dir: PathBuf,

    /// Keep converted models in the cache
    pub cache_converted: bool,

    /// Keep optimized models in the cache
    pub cache_optimized: bool,

    /// Run the Olive optimization stage after conversion
    pub enable_olive: bool,

    /// Optimize to half precision
    pub olive_float16: bool,

    /// Run OpenVINO in heterogeneous mode
    pub openvino_hetero: bool,

    /// OpenVINO device (`GPU`, `CPU`, `NPU`, ...)
    pub openvino_device: String,

    /// Device ordinal for GPU providers
    pub device_id: i32,

    pub cache_identity: CacheIdentity,

    /// Models below this directory came from the Hugging Face hub cache
    pub huggingface_cache_dir: Option<PathBuf>,

    /// Interpreter used for Olive and checkpoint extraction
    pub python: PythonCommand,
}

impl Default for OnnxSettings {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from("models/ONNX/cache"),
            temp_dir: PathBuf::from("models/ONNX/temp"),
            templates_dir: PathBuf::from("configs"),
            cache_converted: true,
            cache_optimized: true,
            enable_olive: false,
            olive_float16: true,
            openvino_hetero: false,
            openvino_device: "GPU".to_string(),
            device_id: 0,
            cache_identity: CacheIdentity::FileName,
            huggingface_cache_dir: None,
            python: PythonCommand::default(),
        }
    }
}

impl OnnxSettings {
    /// Load settings from a TOML or JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let settings = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };

        Ok(settings)
    }

    /// Save settings to a TOML or JSON file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();

        let content = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a path is empty or the cache and temp
    /// directories coincide.
    pub fn validate(&self) -> anyhow::Result<()> {
        let paths = [
            ("cache_root", &self.cache_root),
            ("temp_dir", &self.temp_dir),
            ("templates_dir", &self.templates_dir),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(anyhow::anyhow!("{name} must not be empty"));
            }
        }

        if self.temp_dir == self.cache_root {
            return Err(anyhow::anyhow!("temp_dir and cache_root must differ"));
        }

        if self.python.program.trim().is_empty() {
            return Err(anyhow::anyhow!("python.program must not be empty"));
        }

        Ok(())
    }

    pub fn target_options(&self) -> TargetOptions {
        TargetOptions {
            device_id: self.device_id,
            float16: self.olive_float16,
            openvino_hetero: self.openvino_hetero,
            openvino_device: self.openvino_device.clone(),
        }
    }

    /// Cache identity of a model
    ///
    /// Without a short hash, `FileNameAndHash` degrades to the file name.
    pub fn cache_identity_for(&self, file_name: &str, short_hash: Option<&str>) -> String {
        match (self.cache_identity, short_hash) {
            (CacheIdentity::FileNameAndHash, Some(hash)) if !hash.is_empty() => {
                format!("{file_name}-{hash}")
            }
            (CacheIdentity::FileNameAndHash, _) => {
                log::debug!("No checkpoint hash for '{}', keying cache by file name", file_name);
                file_name.to_string()
            }
            (CacheIdentity::FileName, _) => file_name.to_string(),
        }
    }

    /// Whether `path` lies inside the Hugging Face hub cache
    pub fn is_huggingface_cached(&self, path: &Path) -> bool {
        self.huggingface_cache_dir
            .as_deref()
            .is_some_and(|hub| absolute(path).starts_with(absolute(hub)))
    }
}

/// Make `path` absolute without touching the filesystem
pub(crate) fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Largest batch a run may ask for
pub const MAX_BATCH_SIZE: u32 = 1024;

/// Largest width or height, in pixels
pub const MAX_DIMENSION: u32 = 16384;

/// Immutable description of one generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub architecture: Architecture,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
    pub cross_attention_dim: u32,
    pub time_ids_size: u32,
    pub from_huggingface_cache: bool,
}

impl RunConfig {
    pub fn new(
        architecture: Architecture,
        batch_size: u32,
        height: u32,
        width: u32,
        from_huggingface_cache: bool,
    ) -> Result<Self> {
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(PipelineError::InvalidConfiguration(format!(
                "batch size {batch_size} outside 1..={MAX_BATCH_SIZE}"
            )));
        }
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(PipelineError::InvalidConfiguration(format!(
                "invalid dimensions {width}x{height}"
            )));
        }

        Ok(Self {
            architecture,
            width,
            height,
            batch_size,
            cross_attention_dim: architecture.cross_attention_dim(height),
            time_ids_size: architecture.time_ids_size(),
            from_huggingface_cache,
        })
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    /// Placeholder values for workflow templates
    pub fn template_vars(&self) -> TemplateVars {
        let mut vars = TemplateVars::new();
        vars.insert("is_sdxl".into(), json!(self.architecture.is_xl()));
        vars.insert("width".into(), json!(self.width));
        vars.insert("height".into(), json!(self.height));
        vars.insert("batch_size".into(), json!(self.batch_size));
        vars.insert("unet_batch_size".into(), json!(u64::from(self.batch_size) * 2));
        vars.insert("sample_width".into(), json!(self.width / 8));
        vars.insert("sample_height".into(), json!(self.height / 8));
        vars.insert("cross_attention_dim".into(), json!(self.cross_attention_dim));
        vars.insert("time_ids_size".into(), json!(self.time_ids_size));
        vars.insert("from_huggingface_cache".into(), json!(self.from_huggingface_cache));
        vars
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::for_diffusion(self.batch_size, self.height, self.width, self.architecture.is_xl())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = OnnxSettings::default();
        assert!(settings.validate().is_ok());
        assert!(settings.cache_converted);
        assert!(!settings.enable_olive);
    }

    #[test]
    fn test_validation_rejects_shared_dirs() {
        let settings = OnnxSettings {
            temp_dir: PathBuf::from("models/ONNX/cache"),
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = OnnxSettings {
            templates_dir: PathBuf::new(),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onnx.toml");
        let settings = OnnxSettings {
            enable_olive: true,
            cache_identity: CacheIdentity::FileNameAndHash,
            ..Default::default()
        };
        settings.to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("file-name-and-hash"));
        assert_eq!(OnnxSettings::from_file(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onnx.json");
        std::fs::write(&path, r#"{ "enable_olive": true, "python": { "program": "py" } }"#).unwrap();

        let settings = OnnxSettings::from_file(&path).unwrap();
        assert!(settings.enable_olive);
        assert_eq!(settings.python.program, "py");
        assert_eq!(settings.cache_root, PathBuf::from("models/ONNX/cache"));
    }

    #[test]
    fn test_cache_identity() {
        let mut settings = OnnxSettings::default();
        assert_eq!(settings.cache_identity_for("model.ckpt", Some("abc123")), "model.ckpt");

        settings.cache_identity = CacheIdentity::FileNameAndHash;
        assert_eq!(settings.cache_identity_for("model.ckpt", Some("abc123")), "model.ckpt-abc123");
        assert_eq!(settings.cache_identity_for("model.ckpt", None), "model.ckpt");
    }

    #[test]
    fn test_huggingface_cache_detection() {
        let settings = OnnxSettings {
            huggingface_cache_dir: Some(PathBuf::from("/models/Diffusers")),
            ..Default::default()
        };
        assert!(settings.is_huggingface_cached(Path::new("/models/Diffusers/models--runwayml--sd")));
        assert!(!settings.is_huggingface_cached(Path::new("/models/Stable-diffusion/model.ckpt")));
        assert!(!OnnxSettings::default().is_huggingface_cached(Path::new("/anything")));
    }

    #[test]
    fn test_run_config_derived_values() {
        let base = RunConfig::new(Architecture::StableDiffusion, 1, 512, 512, false).unwrap();
        assert_eq!(base.cross_attention_dim, 768);
        assert_eq!(base.time_ids_size, 5);

        let xl = RunConfig::new(Architecture::StableDiffusionXl, 2, 1024, 768, true).unwrap();
        assert_eq!(xl.cross_attention_dim, 2048);
        assert_eq!(xl.time_ids_size, 6);
        assert!(!xl.is_square());

        let vars = xl.template_vars();
        assert_eq!(vars["unet_batch_size"], json!(4));
        assert_eq!(vars["sample_height"], json!(128));
        assert_eq!(vars["is_sdxl"], json!(true));

        assert!(RunConfig::new(Architecture::StableDiffusion, 0, 512, 512, false).is_err());
        assert!(RunConfig::new(Architecture::StableDiffusion, 1, 0, 512, false).is_err());
    }

    #[test]
    fn test_run_config_bounds() {
        assert!(RunConfig::new(Architecture::StableDiffusion, u32::MAX, 512, 512, false).is_err());
        assert!(RunConfig::new(Architecture::StableDiffusion, MAX_BATCH_SIZE + 1, 512, 512, false).is_err());
        assert!(RunConfig::new(Architecture::StableDiffusion, 1, u32::MAX, 512, false).is_err());
        assert!(RunConfig::new(Architecture::StableDiffusion, 1, 512, MAX_DIMENSION + 8, false).is_err());

        let largest =
            RunConfig::new(Architecture::StableDiffusion, MAX_BATCH_SIZE, MAX_DIMENSION, MAX_DIMENSION, false)
                .unwrap();
        assert_eq!(largest.template_vars()["unet_batch_size"], json!(2 * MAX_BATCH_SIZE));
        assert_eq!(largest.cross_attention_dim, MAX_DIMENSION + 256);
    }

    #[test]
    fn test_session_options_follow_run() {
        let run = RunConfig::new(Architecture::StableDiffusionXl, 1, 1024, 1024, false).unwrap();
        let opts = run.session_options();
        assert_eq!(opts.dimension("unet_sample_height"), Some(128));
        assert_eq!(opts.dimension("unet_time_ids_size"), Some(6));
    }
}
