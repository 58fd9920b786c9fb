//! Submodel resolution
//!
//! Turns manifest entries into loaded components. Each sub-component is
//! resolved on its own; one failure never stops the others.

use std::collections::BTreeMap;
use std::path::Path;

use sdonnx_model_cache::{ManifestValue, ModelManifest};

use crate::component::Component;
use crate::config::RunConfig;
use crate::error::{PipelineError, Result};
use crate::registry::{ComponentRegistry, SubmodelSpec};

/// A manifest entry that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedComponent {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub loaded: BTreeMap<String, Component>,
    pub skipped: Vec<SkippedComponent>,
}

pub struct SubmodelResolver<'a> {
    registry: &'a ComponentRegistry,
    run: &'a RunConfig,
}

impl<'a> SubmodelResolver<'a> {
    pub fn new(registry: &'a ComponentRegistry, run: &'a RunConfig) -> Self {
        Self { registry, run }
    }

    /// Resolve one entry of the manifest rooted at `root`
    ///
    /// `Ok(None)` for disabled entries.
    pub fn resolve(&self, root: &Path, name: &str, value: &ManifestValue) -> Result<Option<Component>> {
        let reference = match value {
            ManifestValue::Disabled => return Ok(None),
            ManifestValue::Literal(v) => return Ok(Some(Component::Literal(v.clone()))),
            ManifestValue::Reference(r) => r,
        };

        let kind = self
            .registry
            .kind_of(reference)
            .ok_or_else(|| PipelineError::UnknownComponent(reference.clone()))?;

        let spec = SubmodelSpec {
            name: name.to_string(),
            directory: root.join(name),
            reference: reference.clone(),
            kind,
        };
        self.registry.load(&spec, self.run).map(Some)
    }

    /// Resolve every entry; failures are recorded, not raised
    pub fn resolve_all(&self, root: &Path, manifest: &ModelManifest) -> Resolution {
        let mut resolution = Resolution::default();

        for (name, value) in manifest.iter() {
            match self.resolve(root, name, value) {
                Ok(Some(component)) => {
                    resolution.loaded.insert(name.clone(), component);
                }
                Ok(None) => log::debug!("Component '{}' is disabled", name),
                Err(e) => {
                    log::debug!("Skipping component '{}' in {}: {}", name, root.display(), e);
                    resolution.skipped.push(SkippedComponent {
                        name: name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        resolution
    }
}
