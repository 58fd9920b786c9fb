//! Loaded sub-components and the pipelines built from them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use sdonnx_model_cache::{ComponentRef, ManifestValue, ModelManifest};

use crate::checkpoint::CheckpointInfo;
use crate::error::{PipelineError, Result};
use crate::registry::ComponentKind;
use crate::types::PipelineClass;

/// An inference graph handed to the backend
pub trait InferenceGraph: Send + Sync + fmt::Debug {
    fn model_path(&self) -> &Path;
}

/// A component described by a directory and its config file
///
/// The directory's small files (configs, vocabularies, merges) are read into
/// `files`, so the component stays usable after a temporary directory it
/// came from is removed. Weight files are left on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfiguredComponent {
    pub kind: ComponentKind,
    pub reference: ComponentRef,
    pub directory: PathBuf,
    /// Parsed conventional config file, when the directory has one
    pub config: Option<Value>,
    /// File name → contents
    pub files: BTreeMap<String, Vec<u8>>,
}

impl ConfiguredComponent {
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone)]
pub enum Component {
    Graph {
        reference: ComponentRef,
        graph: Arc<dyn InferenceGraph>,
    },
    Configured(ConfiguredComponent),
    Literal(Value),
    Disabled,
}

impl Component {
    pub fn kind(&self) -> Option<ComponentKind> {
        match self {
            Self::Graph { .. } => Some(ComponentKind::InferenceGraph),
            Self::Configured(c) => Some(c.kind),
            Self::Literal(_) | Self::Disabled => None,
        }
    }

    pub fn reference(&self) -> Option<&ComponentRef> {
        match self {
            Self::Graph { reference, .. } => Some(reference),
            Self::Configured(c) => Some(&c.reference),
            Self::Literal(_) | Self::Disabled => None,
        }
    }

    pub fn graph(&self) -> Option<&Arc<dyn InferenceGraph>> {
        match self {
            Self::Graph { graph, .. } => Some(graph),
            _ => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    /// Component for a constructor patch value
    pub fn from_patch(value: ManifestValue) -> Option<Self> {
        match value {
            ManifestValue::Disabled => Some(Self::Disabled),
            ManifestValue::Literal(v) => Some(Self::Literal(v)),
            ManifestValue::Reference(_) => None,
        }
    }

    pub fn to_manifest_value(&self) -> ManifestValue {
        match self {
            Self::Graph { reference, .. } => ManifestValue::Reference(reference.clone()),
            Self::Configured(c) => ManifestValue::Reference(c.reference.clone()),
            Self::Literal(v) => ManifestValue::Literal(v.clone()),
            Self::Disabled => ManifestValue::Disabled,
        }
    }
}

/// Where an assembled pipeline was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineSource {
    Directory(PathBuf),
    /// Opaque single-file checkpoint; the backend reads it itself
    SingleFile(PathBuf),
}

impl PipelineSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(p) | Self::SingleFile(p) => p,
        }
    }
}

/// Metadata copied onto every prepared pipeline
#[derive(Debug, Clone, Default)]
pub struct CarriedMetadata {
    pub checkpoint: Option<CheckpointInfo>,
    pub original_filename: Option<String>,
    pub scheduler: Option<Component>,
}

/// A pipeline ready for the inference backend
#[derive(Debug, Clone)]
pub struct AssembledPipeline {
    class: PipelineClass,
    source: PipelineSource,
    components: BTreeMap<String, Component>,
    checkpoint: Option<CheckpointInfo>,
    original_filename: Option<String>,
}

impl AssembledPipeline {
    /// Instantiate `class` from loaded components
    ///
    /// Fails when a required component is absent or disabled.
    pub fn from_components(
        class: PipelineClass,
        directory: &Path,
        components: BTreeMap<String, Component>,
    ) -> Result<Self> {
        let missing: Vec<String> = class
            .required_components()
            .iter()
            .filter(|name| components.get(**name).map_or(true, Component::is_disabled))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingComponents { class, missing });
        }

        Ok(Self {
            class,
            source: PipelineSource::Directory(directory.to_path_buf()),
            components,
            checkpoint: None,
            original_filename: None,
        })
    }

    pub fn single_file(class: PipelineClass, file: &Path) -> Result<Self> {
        if !class.supports_single_file() {
            return Err(PipelineError::UnsupportedSingleFile(class));
        }
        Ok(Self {
            class,
            source: PipelineSource::SingleFile(file.to_path_buf()),
            components: BTreeMap::new(),
            checkpoint: None,
            original_filename: None,
        })
    }

    pub fn class(&self) -> PipelineClass {
        self.class
    }

    pub fn source(&self) -> &PipelineSource {
        &self.source
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn components(&self) -> &BTreeMap<String, Component> {
        &self.components
    }

    pub fn graph(&self, name: &str) -> Option<&Arc<dyn InferenceGraph>> {
        self.components.get(name).and_then(Component::graph)
    }

    pub fn checkpoint(&self) -> Option<&CheckpointInfo> {
        self.checkpoint.as_ref()
    }

    pub fn original_filename(&self) -> Option<&str> {
        self.original_filename.as_deref()
    }

    /// Copy checkpoint info, source filename and scheduler onto this pipeline
    pub fn apply_carried(&mut self, carried: &CarriedMetadata) {
        self.checkpoint = carried.checkpoint.clone();
        self.original_filename = carried.original_filename.clone();
        if let Some(scheduler) = &carried.scheduler {
            self.components.insert("scheduler".to_string(), scheduler.clone());
        }
    }

    /// Manifest describing this pipeline's constructor arguments
    pub fn to_manifest(&self) -> ModelManifest {
        let mut manifest = ModelManifest::new();
        manifest.set_class_name(self.class.class_name());
        for (name, component) in &self.components {
            manifest.insert(name.clone(), component.to_manifest_value());
        }
        manifest
    }
}
