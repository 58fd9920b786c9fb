//! Pipeline assembly: manifest, resolution, constructor patches, instantiation.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use sdonnx_model_cache::ModelManifest;

use crate::component::{AssembledPipeline, Component};
use crate::config::RunConfig;
use crate::error::Result;
use crate::registry::{graph_reference, ComponentKind, ComponentRegistry, SubmodelSpec};
use crate::resolver::SubmodelResolver;
use crate::types::{Architecture, PipelineClass};

pub struct PipelineAssembler<'a> {
    registry: &'a ComponentRegistry,
    run: &'a RunConfig,
}

impl<'a> PipelineAssembler<'a> {
    pub fn new(registry: &'a ComponentRegistry, run: &'a RunConfig) -> Self {
        Self { registry, run }
    }

    /// Load `class` from a model directory or a single checkpoint file
    pub fn load(&self, class: PipelineClass, path: &Path) -> Result<AssembledPipeline> {
        if path.is_dir() {
            let load = ModelManifest::load(path)?;
            log::info!("Loading {} from {}", class, path.display());
            self.assemble(class, path, &load.manifest, BTreeMap::new())
        } else if path.is_file() {
            log::info!("Loading {} from single file {}", class, path.display());
            AssembledPipeline::single_file(class, path)
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("model path {} does not exist", path.display()),
            )
            .into())
        }
    }

    /// Load `class` with its graphs from `graph_dir` and every other
    /// component from `component_root`
    pub fn load_split(&self, class: PipelineClass, graph_dir: &Path, component_root: &Path) -> Result<AssembledPipeline> {
        let mut rest = ModelManifest::load(graph_dir)?.manifest;
        let architecture = class.architecture();
        for submodel in architecture.submodels() {
            rest.remove(submodel);
        }
        let graphs = self.load_graphs(architecture, graph_dir)?;

        log::info!(
            "Loading {} with graphs from {} and components from {}",
            class,
            graph_dir.display(),
            component_root.display()
        );
        self.assemble(class, component_root, &rest, graphs)
    }

    /// Load `<dir>/<submodel>/model.onnx` for every sub-component of `architecture`
    pub fn load_graphs(&self, architecture: Architecture, dir: &Path) -> Result<BTreeMap<String, Component>> {
        let mut graphs = BTreeMap::new();
        for submodel in architecture.submodels() {
            let spec = SubmodelSpec {
                name: submodel.to_string(),
                directory: dir.join(submodel),
                reference: graph_reference(),
                kind: ComponentKind::InferenceGraph,
            };
            graphs.insert(submodel.to_string(), self.registry.load(&spec, self.run)?);
        }
        Ok(graphs)
    }

    /// Instantiate `class` from `manifest`
    ///
    /// Components in `preloaded` are used as-is; the rest resolve from
    /// `root`. Keys the class does not take are ignored.
    pub fn assemble(
        &self,
        class: PipelineClass,
        root: &Path,
        manifest: &ModelManifest,
        preloaded: BTreeMap<String, Component>,
    ) -> Result<AssembledPipeline> {
        let mut wanted = ModelManifest::new();
        for (name, value) in manifest.iter() {
            if preloaded.contains_key(name) {
                continue;
            }
            if class.accepts(name) {
                wanted.insert(name.clone(), value.clone());
            } else {
                log::debug!("{} does not take '{}', ignoring", class, name);
            }
        }

        let resolution = SubmodelResolver::new(self.registry, self.run).resolve_all(root, &wanted);
        let mut components = resolution.loaded;
        components.extend(preloaded);
        apply_constructor_patches(class, &mut components);

        AssembledPipeline::from_components(class, root, components)
    }
}

pub fn apply_constructor_patches(class: PipelineClass, components: &mut BTreeMap<String, Component>) {
    for (name, value) in class.constructor_patches() {
        if let Some(component) = Component::from_patch(value) {
            components.insert(name.to_string(), component);
        }
    }
}
