//! Static component registry
//!
//! Maps manifest `[library, class]` pairs to a [`ComponentKind`] and each
//! kind to the loader that builds it. Populated once at startup; nothing is
//! looked up by name at runtime.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sdonnx_model_cache::{is_binary_model_file, ComponentRef};

use crate::component::{Component, ConfiguredComponent};
use crate::config::RunConfig;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    InferenceGraph,
    Tokenizer,
    Scheduler,
    FeatureExtractor,
    /// Framework network (`AutoencoderKL`, `UNet2DConditionModel`, ...)
    FrameworkModule,
}

impl ComponentKind {
    /// Conventional config file inside the component directory
    pub fn config_file(&self) -> Option<&'static str> {
        match self {
            Self::InferenceGraph => None,
            Self::Tokenizer => Some("tokenizer_config.json"),
            Self::Scheduler => Some("scheduler_config.json"),
            Self::FeatureExtractor => Some("preprocessor_config.json"),
            Self::FrameworkModule => Some("config.json"),
        }
    }
}

/// Reference written for converted sub-components
pub fn graph_reference() -> ComponentRef {
    ComponentRef::new("diffusers", "OnnxRuntimeModel")
}

const TOKENIZERS: &[(&str, &str)] = &[
    ("transformers", "CLIPTokenizer"),
    ("transformers", "CLIPTokenizerFast"),
];

const FEATURE_EXTRACTORS: &[(&str, &str)] = &[
    ("transformers", "CLIPImageProcessor"),
    ("transformers", "CLIPFeatureExtractor"),
];

const SCHEDULERS: &[&str] = &[
    "DDIMScheduler",
    "DDPMScheduler",
    "DEISMultistepScheduler",
    "DPMSolverMultistepScheduler",
    "DPMSolverSinglestepScheduler",
    "EulerAncestralDiscreteScheduler",
    "EulerDiscreteScheduler",
    "HeunDiscreteScheduler",
    "KDPM2AncestralDiscreteScheduler",
    "KDPM2DiscreteScheduler",
    "LCMScheduler",
    "LMSDiscreteScheduler",
    "PNDMScheduler",
    "UniPCMultistepScheduler",
];

const FRAMEWORK_MODULES: &[(&str, &str)] = &[
    ("diffusers", "AutoencoderKL"),
    ("diffusers", "UNet2DConditionModel"),
    ("transformers", "CLIPTextModel"),
    ("transformers", "CLIPTextModelWithProjection"),
    ("transformers", "CLIPVisionModelWithProjection"),
    ("stable_diffusion", "StableDiffusionSafetyChecker"),
];

/// One sub-component to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmodelSpec {
    pub name: String,
    /// `<root>/<name>`
    pub directory: PathBuf,
    pub reference: ComponentRef,
    pub kind: ComponentKind,
}

/// Builds components of one kind
pub trait ComponentLoader: Send + Sync + fmt::Debug {
    fn load(&self, spec: &SubmodelSpec, run: &RunConfig) -> Result<Component>;
}

pub type DynComponentLoader = Arc<dyn ComponentLoader>;

#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    kinds: HashMap<ComponentRef, ComponentKind>,
    loaders: HashMap<ComponentKind, DynComponentLoader>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known diffusers/transformers classes, with [`ConfigDirLoader`] for
    /// every kind except graphs
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(graph_reference(), ComponentKind::InferenceGraph);
        for (library, class) in TOKENIZERS {
            registry.register(ComponentRef::new(*library, *class), ComponentKind::Tokenizer);
        }
        for (library, class) in FEATURE_EXTRACTORS {
            registry.register(ComponentRef::new(*library, *class), ComponentKind::FeatureExtractor);
        }
        for class in SCHEDULERS {
            registry.register(ComponentRef::new("diffusers", *class), ComponentKind::Scheduler);
        }
        for (library, class) in FRAMEWORK_MODULES {
            registry.register(ComponentRef::new(*library, *class), ComponentKind::FrameworkModule);
        }

        let config_dir: DynComponentLoader = Arc::new(ConfigDirLoader);
        for kind in [
            ComponentKind::Tokenizer,
            ComponentKind::Scheduler,
            ComponentKind::FeatureExtractor,
            ComponentKind::FrameworkModule,
        ] {
            registry.set_loader(kind, config_dir.clone());
        }

        registry
    }

    pub fn with_graph_loader(mut self, loader: DynComponentLoader) -> Self {
        self.set_loader(ComponentKind::InferenceGraph, loader);
        self
    }

    pub fn register(&mut self, reference: ComponentRef, kind: ComponentKind) {
        self.kinds.insert(reference, kind);
    }

    pub fn set_loader(&mut self, kind: ComponentKind, loader: DynComponentLoader) {
        self.loaders.insert(kind, loader);
    }

    pub fn kind_of(&self, reference: &ComponentRef) -> Option<ComponentKind> {
        self.kinds.get(reference).copied()
    }

    pub fn loader_for(&self, kind: ComponentKind) -> Option<&DynComponentLoader> {
        self.loaders.get(&kind)
    }

    /// Build the component `spec` describes
    pub fn load(&self, spec: &SubmodelSpec, run: &RunConfig) -> Result<Component> {
        let loader = self
            .loader_for(spec.kind)
            .ok_or(PipelineError::NoLoader(spec.kind))?;
        loader.load(spec, run)
    }
}

/// Framework weight formats besides the ones the cache already excludes
const WEIGHT_SUFFIXES: &[&str] = &[".bin", ".pt", ".pth", ".msgpack", ".h5"];

fn is_weight_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    is_binary_model_file(&lower) || WEIGHT_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

/// Loads a component from its directory and conventional config file
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigDirLoader;

impl ComponentLoader for ConfigDirLoader {
    fn load(&self, spec: &SubmodelSpec, _run: &RunConfig) -> Result<Component> {
        if !spec.directory.is_dir() {
            return Err(PipelineError::ComponentLoad {
                name: spec.name.clone(),
                message: format!("directory {} not found", spec.directory.display()),
            });
        }

        let mut files = BTreeMap::new();
        for entry in fs::read_dir(&spec.directory)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !entry.file_type()?.is_file() || is_weight_file(&name) {
                continue;
            }
            files.insert(name, fs::read(entry.path())?);
        }

        let config = match spec.kind.config_file().and_then(|f| files.get(f).map(|c| (f, c))) {
            Some((file, content)) => {
                let value = serde_json::from_slice(content).map_err(|e| PipelineError::ComponentLoad {
                    name: spec.name.clone(),
                    message: format!("{}: {}", spec.directory.join(file).display(), e),
                })?;
                Some(value)
            }
            None => None,
        };

        Ok(Component::Configured(ConfiguredComponent {
            kind: spec.kind,
            reference: spec.reference.clone(),
            directory: spec.directory.clone(),
            config,
            files,
        }))
    }
}
