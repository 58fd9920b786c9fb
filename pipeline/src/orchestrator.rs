//! Conversion and optimization orchestration
//!
//! ```text
//! S0 configure ─► S1 convert ──fail──► fallback A: original model, framework class
//!                     │
//!                     ▼ (enable_olive)
//!                 S2 optimize ─fail──► fallback B: converted model, graph class
//!                     │
//!                     ▼
//!                 S3 assemble + carry metadata
//! ```
//!
//! Every branch removes the shared temp directory and carries the checkpoint
//! info, source filename and scheduler over. Only a failure to build the
//! original model in fallback A reaches the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sdonnx_execution_providers::ExecutionTarget;
use sdonnx_model_cache::{CacheKey, CacheLayout, ModelManifest, MODEL_INDEX};
use sdonnx_olive::{PythonOliveEngine, WorkflowEngine};

use crate::assembler::PipelineAssembler;
use crate::checkpoint::{CheckpointExtractor, CheckpointInfo, PythonCheckpointExtractor};
use crate::component::{AssembledPipeline, CarriedMetadata, Component};
use crate::config::{OnnxSettings, RunConfig};
use crate::conversion;
use crate::error::Result;
use crate::optimization;
use crate::ort_graph::OrtGraphLoader;
use crate::registry::ComponentRegistry;
use crate::resolver::SubmodelResolver;
use crate::stage::{remove_dir_quietly, StageContext, StageInput};
use crate::types::PipelineClass;

/// Directory under `temp_dir` single-file checkpoints are unpacked into,
/// one subdirectory per file name
const SOURCE_DIR: &str = "source";

/// Which branch produced a prepared pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreparationOutcome {
    /// Converted graphs; optimization disabled
    Converted,
    Optimized,
    /// Optimization failed; converted graphs used
    OptimizationFallback,
    /// Conversion failed; original model used
    ConversionFallback,
}

#[derive(Debug, Clone)]
pub struct PreparedPipeline {
    pub pipeline: AssembledPipeline,
    pub outcome: PreparationOutcome,
}

/// A model as opened, before any stage ran
#[derive(Debug, Clone)]
pub struct RawPipeline {
    class: PipelineClass,
    path: PathBuf,
    original_filename: String,
    manifest: ModelManifest,
    from_huggingface_cache: bool,
    checkpoint: Option<CheckpointInfo>,
    /// Unpacking the single-file checkpoint already failed once
    unpack_failed: bool,
}

impl RawPipeline {
    pub fn class(&self) -> PipelineClass {
        self.class
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    /// Manifest of the source model without the combined `vae` entry
    pub fn manifest(&self) -> &ModelManifest {
        &self.manifest
    }

    pub fn checkpoint(&self) -> Option<&CheckpointInfo> {
        self.checkpoint.as_ref()
    }

    pub fn from_huggingface_cache(&self) -> bool {
        self.from_huggingface_cache
    }

    pub fn is_single_file(&self) -> bool {
        !self.path.is_dir()
    }
}

pub struct Orchestrator {
    settings: OnnxSettings,
    target: ExecutionTarget,
    engine: Box<dyn WorkflowEngine>,
    extractor: Box<dyn CheckpointExtractor>,
    registry: ComponentRegistry,
}

impl Orchestrator {
    pub fn new(
        settings: OnnxSettings,
        target: ExecutionTarget,
        engine: Box<dyn WorkflowEngine>,
        extractor: Box<dyn CheckpointExtractor>,
        registry: ComponentRegistry,
    ) -> Self {
        Self {
            settings,
            target,
            engine,
            extractor,
            registry,
        }
    }

    /// Olive and diffusers through Python, graphs through ONNX Runtime
    ///
    /// A target without a runtime version gets the one installed in the
    /// Python environment Olive runs in.
    pub fn with_defaults(settings: OnnxSettings, target: ExecutionTarget) -> Self {
        let engine = PythonOliveEngine::new(settings.python.clone());
        let target = match target.runtime_version() {
            Some(_) => target,
            None => match engine.onnxruntime_version() {
                Ok(version) => {
                    log::info!("Olive environment has onnxruntime {}", version);
                    target.with_runtime_version(version)
                }
                Err(e) => {
                    log::warn!("Could not determine onnxruntime version: {}", e);
                    target
                }
            },
        };
        let registry =
            ComponentRegistry::with_defaults().with_graph_loader(Arc::new(OrtGraphLoader::new(target.clone())));
        let extractor = PythonCheckpointExtractor::new(settings.python.clone());
        Self::new(settings, target, Box::new(engine), Box::new(extractor), registry)
    }

    /// Load and validate settings from a TOML or JSON file
    pub fn from_settings_file<P: AsRef<Path>>(path: P, target: ExecutionTarget) -> anyhow::Result<Self> {
        let settings = OnnxSettings::from_file(path)?;
        settings.validate()?;
        Ok(Self::with_defaults(settings, target))
    }

    pub fn settings(&self) -> &OnnxSettings {
        &self.settings
    }

    pub fn target(&self) -> &ExecutionTarget {
        &self.target
    }

    /// Remove staging directories interrupted runs left in the cache
    pub fn sweep_stale_staging(&self) -> Result<usize> {
        Ok(CacheLayout::new(&self.settings.cache_root).sweep_stale_staging()?)
    }

    /// Open a model directory or single-file checkpoint
    ///
    /// Never fails. An unreadable model leaves an empty manifest and
    /// conversion later falls back to the original. A single file whose
    /// conversion is already cached is not unpacked; its manifest is read
    /// from the cache entry.
    pub fn open(
        &self,
        class: PipelineClass,
        path: impl Into<PathBuf>,
        checkpoint: Option<CheckpointInfo>,
    ) -> RawPipeline {
        let path = path.into();
        let original_filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut unpack_failed = false;
        let manifest_dir = if path.is_dir() {
            Some(path.clone())
        } else if let Some(entry) = self.cached_conversion(&self.identity(&original_filename, checkpoint.as_ref())) {
            Some(entry)
        } else {
            let unpacked = self.unpack(class, &path);
            unpack_failed = unpacked.is_none();
            unpacked
        };

        let mut manifest = match manifest_dir.as_deref().map(ModelManifest::load) {
            Some(Ok(load)) => load.manifest,
            Some(Err(e)) => {
                log::debug!("No usable manifest for {}: {}", path.display(), e);
                ModelManifest::new()
            }
            None => ModelManifest::new(),
        };
        manifest.remove("vae");

        RawPipeline {
            class,
            from_huggingface_cache: self.settings.is_huggingface_cached(&path),
            path,
            original_filename,
            manifest,
            checkpoint,
            unpack_failed,
        }
    }

    /// Convert, optionally optimize, and assemble `raw` for one run
    pub fn prepare(
        &self,
        raw: &RawPipeline,
        batch_size: u32,
        height: u32,
        width: u32,
    ) -> Result<PreparedPipeline> {
        let run = RunConfig::new(
            raw.class.architecture(),
            batch_size,
            height,
            width,
            raw.from_huggingface_cache,
        )?;

        let identity = self.identity(&raw.original_filename, raw.checkpoint.as_ref());
        let cached = self.cached_conversion(&identity);
        let source = if !raw.is_single_file() {
            Some(raw.path.clone())
        } else if cached.is_some() || raw.unpack_failed {
            None
        } else {
            self.unpack(raw.class, &raw.path)
        };

        let carried = CarriedMetadata {
            checkpoint: raw.checkpoint.clone(),
            original_filename: Some(raw.original_filename.clone()),
            scheduler: source
                .as_deref()
                .or(cached.as_deref())
                .and_then(|dir| self.capture_scheduler(raw, dir, &run)),
        };

        let result = self.run_stages(raw, &identity, source.as_deref(), &run, &carried);
        remove_dir_quietly(&self.settings.temp_dir);
        result
    }

    fn run_stages(
        &self,
        raw: &RawPipeline,
        identity: &str,
        source: Option<&Path>,
        run: &RunConfig,
        carried: &CarriedMetadata,
    ) -> Result<PreparedPipeline> {
        let ctx = StageContext {
            settings: &self.settings,
            target: &self.target,
            engine: self.engine.as_ref(),
            registry: &self.registry,
            run,
        };
        let input = StageInput {
            identity,
            class: raw.class.graph_class(),
            manifest: &raw.manifest,
        };
        let assembler = PipelineAssembler::new(&self.registry, run);

        // Without an unpacked source a cached entry can still hit
        let Some(converted) = conversion::convert(&ctx, &input, source.unwrap_or(&raw.path)) else {
            log::error!("Failed to convert model. The generation will fall back to unconverted one.");
            return self.load_original(raw, &assembler, carried);
        };

        let mut candidates = Vec::with_capacity(2);
        if self.settings.enable_olive {
            log::warn!(
                "Olive implementation is experimental. It contains potentially an issue and is subject to change at any time."
            );
            if !run.is_square() {
                log::warn!("Olive detected different width and height. The quality of the result is not guaranteed.");
            }

            match optimization::optimize(&ctx, &input, &converted) {
                Some(optimized) => candidates.push((optimized, PreparationOutcome::Optimized)),
                None => log::error!("Failed to optimize pipeline. The generation will fall back to unoptimized one."),
            }
            candidates.push((converted.clone(), PreparationOutcome::OptimizationFallback));
        } else {
            candidates.push((converted.clone(), PreparationOutcome::Converted));
        }

        for (dir, outcome) in candidates {
            match self.assemble_output(&assembler, raw, input.class, &dir) {
                Ok(mut pipeline) => {
                    pipeline.apply_carried(carried);
                    if outcome != PreparationOutcome::OptimizationFallback
                        && !self.settings.cache_converted
                        && self.is_transient(&converted)
                    {
                        remove_dir_quietly(&converted);
                    }
                    log::info!("Prepared {} from {} ({:?})", input.class, dir.display(), outcome);
                    return Ok(PreparedPipeline { pipeline, outcome });
                }
                Err(e) => {
                    log::error!("Failed to load {} from {}.", input.class, dir.display());
                    log::error!("{}", e);
                    if !self.is_transient(&dir) {
                        log::warn!("Removing unusable cache entry {}", dir.display());
                        remove_dir_quietly(&dir);
                    }
                }
            }
        }

        self.load_original(raw, &assembler, carried)
    }

    /// Assemble a stage output
    ///
    /// Outputs under `temp_dir` are removed before the pipeline is used, so
    /// for model directories only their graphs are taken from there and
    /// every other component comes from the original model.
    fn assemble_output(
        &self,
        assembler: &PipelineAssembler<'_>,
        raw: &RawPipeline,
        class: PipelineClass,
        dir: &Path,
    ) -> Result<AssembledPipeline> {
        if self.is_transient(dir) && !raw.is_single_file() {
            assembler.load_split(class, dir, &raw.path)
        } else {
            assembler.load(class, dir)
        }
    }

    fn is_transient(&self, dir: &Path) -> bool {
        dir.starts_with(&self.settings.temp_dir)
    }

    /// Fallback A; its failure is the only error `prepare` returns
    fn load_original(
        &self,
        raw: &RawPipeline,
        assembler: &PipelineAssembler<'_>,
        carried: &CarriedMetadata,
    ) -> Result<PreparedPipeline> {
        let mut pipeline = assembler.load(raw.class.framework_class(), &raw.path)?;
        pipeline.apply_carried(carried);
        Ok(PreparedPipeline {
            pipeline,
            outcome: PreparationOutcome::ConversionFallback,
        })
    }

    fn identity(&self, original_filename: &str, checkpoint: Option<&CheckpointInfo>) -> String {
        self.settings
            .cache_identity_for(original_filename, checkpoint.and_then(|c| c.short_hash.as_deref()))
    }

    /// Path of the conversion cache entry for `identity`, when present
    fn cached_conversion(&self, identity: &str) -> Option<PathBuf> {
        let key = CacheKey::conversion(identity).ok()?;
        let layout = CacheLayout::new(&self.settings.cache_root);
        layout.contains(&key).then(|| layout.entry_path(&key))
    }

    /// Unpack a single-file checkpoint into `<temp_dir>/source/<file name>`,
    /// reusing an earlier unpack
    fn unpack(&self, class: PipelineClass, path: &Path) -> Option<PathBuf> {
        let file_name = path.file_name()?;
        let dest = self.settings.temp_dir.join(SOURCE_DIR).join(file_name);
        if dest.join(MODEL_INDEX).is_file() {
            return Some(dest);
        }
        remove_dir_quietly(&dest);

        match self.extractor.extract(path, class.architecture(), &dest) {
            Ok(()) => Some(dest),
            Err(e) => {
                log::error!("Failed to load pipeline to optimize.");
                log::error!("{}", e);
                remove_dir_quietly(&dest);
                None
            }
        }
    }

    /// Scheduler of the model, resolved from `root`
    fn capture_scheduler(&self, raw: &RawPipeline, root: &Path, run: &RunConfig) -> Option<Component> {
        let value = match raw.manifest.get("scheduler") {
            Some(value) => value.clone(),
            None => ModelManifest::load(root).ok()?.manifest.get("scheduler")?.clone(),
        };
        match SubmodelResolver::new(&self.registry, run).resolve(root, "scheduler", &value) {
            Ok(scheduler) => scheduler,
            Err(e) => {
                log::debug!("Could not capture scheduler of {}: {}", raw.path.display(), e);
                None
            }
        }
    }
}
