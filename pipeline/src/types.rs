/// Pipeline classes and model architectures - NO string literals in callers!
///
/// `PipelineClass` replaces rebinding classes at runtime: each variant knows
/// its manifest name, architecture, components, constructor patches, and
/// its framework/graph counterparts.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use sdonnx_model_cache::ManifestValue;
use serde_json::json;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    #[serde(rename = "sd")]
    StableDiffusion,

    #[serde(rename = "sdxl")]
    StableDiffusionXl,
}

impl Architecture {
    /// Sub-components converted to graphs, in processing order
    pub fn submodels(&self) -> &'static [&'static str] {
        match self {
            Self::StableDiffusion => &["text_encoder", "unet", "vae_encoder", "vae_decoder"],
            Self::StableDiffusionXl => &[
                "text_encoder",
                "text_encoder_2",
                "unet",
                "vae_encoder",
                "vae_decoder",
            ],
        }
    }

    /// Prefix of the workflow template files (`sd_unet.json`, `sdxl_unet.json`)
    pub fn template_prefix(&self) -> &'static str {
        match self {
            Self::StableDiffusion => "sd",
            Self::StableDiffusionXl => "sdxl",
        }
    }

    pub fn is_xl(&self) -> bool {
        matches!(self, Self::StableDiffusionXl)
    }

    pub fn cross_attention_dim(&self, height: u32) -> u32 {
        match self {
            Self::StableDiffusion => height + 256,
            Self::StableDiffusionXl => 2048,
        }
    }

    pub fn time_ids_size(&self) -> u32 {
        match self {
            Self::StableDiffusion => 5,
            Self::StableDiffusionXl => 6,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_prefix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineClass {
    /// Framework (unconverted) pipelines
    StableDiffusion,
    StableDiffusionXl,

    /// Graph-backed pipelines
    OnnxStableDiffusion,
    OnnxStableDiffusionImg2Img,
    OnnxStableDiffusionInpaint,
    OnnxStableDiffusionXl,
    OnnxStableDiffusionXlImg2Img,
}

const SD_FRAMEWORK_REQUIRED: &[&str] = &["vae", "text_encoder", "tokenizer", "unet", "scheduler"];
const SD_FRAMEWORK_OPTIONAL: &[&str] = &["safety_checker", "feature_extractor", "image_encoder"];
const SD_FRAMEWORK_PARAMS: &[&str] = &["requires_safety_checker"];

const SDXL_FRAMEWORK_REQUIRED: &[&str] = &[
    "vae",
    "text_encoder",
    "text_encoder_2",
    "tokenizer",
    "tokenizer_2",
    "unet",
    "scheduler",
];
const SDXL_FRAMEWORK_OPTIONAL: &[&str] = &["image_encoder", "feature_extractor"];
const SDXL_FRAMEWORK_PARAMS: &[&str] = &["force_zeros_for_empty_prompt", "add_watermarker"];

const SD_GRAPH_REQUIRED: &[&str] = &[
    "vae_encoder",
    "vae_decoder",
    "text_encoder",
    "tokenizer",
    "unet",
    "scheduler",
];
const SD_GRAPH_OPTIONAL: &[&str] = &["safety_checker", "feature_extractor"];
const SD_GRAPH_PARAMS: &[&str] = &["requires_safety_checker"];

const SDXL_GRAPH_REQUIRED: &[&str] = &[
    "vae_encoder",
    "vae_decoder",
    "text_encoder",
    "text_encoder_2",
    "tokenizer",
    "tokenizer_2",
    "unet",
    "scheduler",
];
const SDXL_GRAPH_OPTIONAL: &[&str] = &["feature_extractor"];
const SDXL_GRAPH_PARAMS: &[&str] = &["config", "force_zeros_for_empty_prompt", "add_watermarker"];

impl PipelineClass {
    pub const ALL: [PipelineClass; 7] = [
        Self::StableDiffusion,
        Self::StableDiffusionXl,
        Self::OnnxStableDiffusion,
        Self::OnnxStableDiffusionImg2Img,
        Self::OnnxStableDiffusionInpaint,
        Self::OnnxStableDiffusionXl,
        Self::OnnxStableDiffusionXlImg2Img,
    ];

    /// `_class_name` written to `model_index.json`
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::StableDiffusion => "StableDiffusionPipeline",
            Self::StableDiffusionXl => "StableDiffusionXLPipeline",
            Self::OnnxStableDiffusion => "OnnxStableDiffusionPipeline",
            Self::OnnxStableDiffusionImg2Img => "OnnxStableDiffusionImg2ImgPipeline",
            Self::OnnxStableDiffusionInpaint => "OnnxStableDiffusionInpaintPipeline",
            Self::OnnxStableDiffusionXl => "OnnxStableDiffusionXLPipeline",
            Self::OnnxStableDiffusionXlImg2Img => "OnnxStableDiffusionXLImg2ImgPipeline",
        }
    }

    pub fn from_class_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.class_name() == name)
    }

    pub fn architecture(&self) -> Architecture {
        match self {
            Self::StableDiffusion
            | Self::OnnxStableDiffusion
            | Self::OnnxStableDiffusionImg2Img
            | Self::OnnxStableDiffusionInpaint => Architecture::StableDiffusion,
            Self::StableDiffusionXl | Self::OnnxStableDiffusionXl | Self::OnnxStableDiffusionXlImg2Img => {
                Architecture::StableDiffusionXl
            }
        }
    }

    /// True when the sub-networks are ONNX graphs
    pub fn is_graph_backed(&self) -> bool {
        !matches!(self, Self::StableDiffusion | Self::StableDiffusionXl)
    }

    /// Unconverted class used when conversion fails
    pub fn framework_class(&self) -> Self {
        match self.architecture() {
            Architecture::StableDiffusion => Self::StableDiffusion,
            Architecture::StableDiffusionXl => Self::StableDiffusionXl,
        }
    }

    /// Graph-backed class to assemble converted output with
    ///
    /// Graph classes map to themselves so img2img/inpaint survive.
    pub fn graph_class(&self) -> Self {
        match self {
            Self::StableDiffusion => Self::OnnxStableDiffusion,
            Self::StableDiffusionXl => Self::OnnxStableDiffusionXl,
            other => *other,
        }
    }

    pub fn required_components(&self) -> &'static [&'static str] {
        match (self.architecture(), self.is_graph_backed()) {
            (Architecture::StableDiffusion, false) => SD_FRAMEWORK_REQUIRED,
            (Architecture::StableDiffusionXl, false) => SDXL_FRAMEWORK_REQUIRED,
            (Architecture::StableDiffusion, true) => SD_GRAPH_REQUIRED,
            (Architecture::StableDiffusionXl, true) => SDXL_GRAPH_REQUIRED,
        }
    }

    pub fn optional_components(&self) -> &'static [&'static str] {
        match (self.architecture(), self.is_graph_backed()) {
            (Architecture::StableDiffusion, false) => SD_FRAMEWORK_OPTIONAL,
            (Architecture::StableDiffusionXl, false) => SDXL_FRAMEWORK_OPTIONAL,
            (Architecture::StableDiffusion, true) => SD_GRAPH_OPTIONAL,
            (Architecture::StableDiffusionXl, true) => SDXL_GRAPH_OPTIONAL,
        }
    }

    /// Plain constructor arguments
    pub fn parameters(&self) -> &'static [&'static str] {
        match (self.architecture(), self.is_graph_backed()) {
            (Architecture::StableDiffusion, false) => SD_FRAMEWORK_PARAMS,
            (Architecture::StableDiffusionXl, false) => SDXL_FRAMEWORK_PARAMS,
            (Architecture::StableDiffusion, true) => SD_GRAPH_PARAMS,
            (Architecture::StableDiffusionXl, true) => SDXL_GRAPH_PARAMS,
        }
    }

    /// Whether the constructor takes `key` at all
    pub fn accepts(&self, key: &str) -> bool {
        self.required_components().contains(&key)
            || self.optional_components().contains(&key)
            || self.parameters().contains(&key)
    }

    /// Arguments the constructor forces regardless of the manifest
    pub fn constructor_patches(&self) -> Vec<(&'static str, ManifestValue)> {
        match (self.architecture(), self.is_graph_backed()) {
            (Architecture::StableDiffusion, true) => vec![
                ("safety_checker", ManifestValue::Disabled),
                ("requires_safety_checker", ManifestValue::Literal(json!(false))),
            ],
            (Architecture::StableDiffusionXl, true) => vec![("config", ManifestValue::Literal(json!({})))],
            (_, false) => Vec::new(),
        }
    }

    /// Only framework classes know how to read a single checkpoint file
    pub fn supports_single_file(&self) -> bool {
        !self.is_graph_backed()
    }
}

impl fmt::Display for PipelineClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

impl FromStr for PipelineClass {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_class_name(s)
            .ok_or_else(|| PipelineError::InvalidConfiguration(format!("unknown pipeline class '{s}'")))
    }
}
