//! Machinery shared by the conversion and optimization stages
//!
//! A stage either finds its cache entry, or builds one in a staging
//! directory (seeded from its input minus binaries), runs one workflow per
//! sub-component, copies each produced graph in, writes `model_index.json`
//! and publishes by rename. Any failure is logged and reported as `None`
//! after the stage's work area is removed.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use sdonnx_execution_providers::ExecutionTarget;
use sdonnx_model_cache::{copy_graph_artifacts, CacheKey, CacheLayout, ModelManifest, StagingDir};
use sdonnx_olive::{TemplateVars, Workflow, WorkflowEngine};

use crate::assembler::PipelineAssembler;
use crate::config::{absolute, OnnxSettings, RunConfig};
use crate::error::Result;
use crate::registry::ComponentRegistry;
use crate::types::PipelineClass;

/// Collaborators and settings of one run
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub settings: &'a OnnxSettings,
    pub target: &'a ExecutionTarget,
    pub engine: &'a dyn WorkflowEngine,
    pub registry: &'a ComponentRegistry,
    pub run: &'a RunConfig,
}

/// The model a stage works on
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    /// Cache identity (file name, optionally with hash)
    pub identity: &'a str,
    /// Graph-backed class the output is assembled with
    pub class: PipelineClass,
    /// Manifest of the original model, minus `vae`
    pub manifest: &'a ModelManifest,
}

/// What differs between stages
pub(crate) trait StagePlan {
    /// `convert` / `optimize`
    fn verb(&self) -> &'static str;

    /// Footprint pass whose output is kept
    fn pass(&self) -> &'static str;

    fn cache_key(&self, identity: &str, run: &RunConfig) -> Result<CacheKey>;

    /// Whether the output is kept in the cache
    fn retain(&self, settings: &OnnxSettings) -> bool;

    /// Output directory name under `temp_dir` when not retained
    fn temp_output(&self) -> &'static str;

    fn workflow(
        &self,
        ctx: &StageContext<'_>,
        submodel: &str,
        input_dir: &Path,
        work_dir: &Path,
    ) -> Result<Workflow>;
}

pub(crate) fn run_stage<P: StagePlan>(
    plan: &P,
    ctx: &StageContext<'_>,
    input: &StageInput<'_>,
    input_dir: &Path,
) -> Option<PathBuf> {
    let layout = CacheLayout::new(&ctx.settings.cache_root);
    let work_dir = ctx.settings.temp_dir.join("work").join(plan.verb());

    let result = plan.cache_key(input.identity, ctx.run).and_then(|key| {
        if layout.contains(&key) {
            let path = layout.entry_path(&key);
            log::info!("Using cached model {}", path.display());
            return Ok(path);
        }
        build(plan, ctx, input, input_dir, &layout, &key, &work_dir)
    });

    remove_dir_quietly(&work_dir);

    match result {
        Ok(path) => Some(path),
        Err(e) => {
            log::error!("Failed to {} model '{}'.", plan.verb(), input.identity);
            log::error!("{}", e);
            None
        }
    }
}

fn build<P: StagePlan>(
    plan: &P,
    ctx: &StageContext<'_>,
    input: &StageInput<'_>,
    input_dir: &Path,
    layout: &CacheLayout,
    key: &CacheKey,
    work_dir: &Path,
) -> Result<PathBuf> {
    let target = if plan.retain(ctx.settings) {
        layout.entry_path(key)
    } else {
        let target = ctx.settings.temp_dir.join(plan.temp_output());
        if target.exists() {
            fs::remove_dir_all(&target)?;
        }
        target
    };

    // Dropping `staging` on any error below discards the partial output
    let staging = StagingDir::create(&target)?;
    staging.seed_from(input_dir)?;
    fs::create_dir_all(work_dir)?;

    for submodel in ctx.run.architecture.submodels() {
        let workflow = plan.workflow(ctx, submodel, input_dir, &work_dir.join(submodel))?;
        let footprints = ctx.engine.run(&workflow)?;
        let graph = footprints.output_of(plan.pass())?;
        let copied = copy_graph_artifacts(&graph, &staging.path().join(submodel))?;
        log::info!("Processed {} ({}): {}", submodel, plan.pass(), copied.graph.display());
    }

    write_manifest(ctx, input, input_dir, staging.path())?;
    Ok(staging.publish()?)
}

/// Serialize the pipeline the staged graphs make up
///
/// The graphs load from `staged`, everything else from `input_dir`. Keys of
/// the original manifest the serialized one lacks are carried over.
fn write_manifest(
    ctx: &StageContext<'_>,
    input: &StageInput<'_>,
    input_dir: &Path,
    staged: &Path,
) -> Result<()> {
    let assembler = PipelineAssembler::new(ctx.registry, ctx.run);
    let graphs = assembler.load_graphs(ctx.run.architecture, staged)?;

    let mut rest = input.manifest.clone();
    for submodel in ctx.run.architecture.submodels() {
        rest.remove(submodel);
    }

    let pipeline = assembler.assemble(input.class, input_dir, &rest, graphs)?;
    let mut manifest = pipeline.to_manifest();
    manifest.merge_missing(&rest);

    let path = manifest.save(staged)?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}

/// `<templates_dir>/<family>/<sd|sdxl>_<submodel>.json`
pub(crate) fn template_path(ctx: &StageContext<'_>, family: &str, submodel: &str) -> PathBuf {
    ctx.settings.templates_dir.join(family).join(format!(
        "{}_{}.json",
        ctx.run.architecture.template_prefix(),
        submodel
    ))
}

pub(crate) fn template_vars(ctx: &StageContext<'_>, submodel: &str) -> TemplateVars {
    let mut vars = ctx.run.template_vars();
    vars.insert("submodel".into(), json!(submodel));
    vars.insert("execution_provider".into(), json!(ctx.target.name()));
    vars.insert("device".into(), json!(ctx.target.device_name()));
    vars
}

/// Point the workflow at the target and the per-stage work area
pub(crate) fn set_engine(workflow: &mut Workflow, ctx: &StageContext<'_>, work_dir: &Path) -> Result<()> {
    let work_dir = absolute(work_dir);
    workflow.set(&["engine", "execution_providers"], json!([ctx.target.name()]))?;
    workflow.set(&["engine", "cache_dir"], json!(work_dir.join("cache").to_string_lossy()))?;
    workflow.set(&["engine", "output_dir"], json!(work_dir.to_string_lossy()))?;
    Ok(())
}

pub(crate) fn remove_dir_quietly(dir: &Path) {
    if !dir.exists() {
        return;
    }
    if let Err(e) = fs::remove_dir_all(dir) {
        log::warn!("Could not remove {}: {}", dir.display(), e);
    }
}
