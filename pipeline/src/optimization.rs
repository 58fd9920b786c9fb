//! Optimization stage: provider-specific Olive passes over converted graphs.

use std::path::{Path, PathBuf};

use serde_json::json;

use sdonnx_model_cache::{CacheKey, GRAPH_FILE};
use sdonnx_olive::{Workflow, OPTIMIZATION_PASS};

use crate::config::{absolute, OnnxSettings, RunConfig};
use crate::error::Result;
use crate::stage::{self, StageContext, StageInput, StagePlan};

/// Template family under `templates_dir`
pub const TEMPLATE_FAMILY: &str = "olive";

/// Workflow pass selected for a provider, e.g. `optimize_CUDAExecutionProvider`
pub fn pass_key(provider_name: &str) -> String {
    format!("optimize_{provider_name}")
}

struct Optimization;

impl StagePlan for Optimization {
    fn verb(&self) -> &'static str {
        "optimize"
    }

    fn pass(&self) -> &'static str {
        OPTIMIZATION_PASS
    }

    fn cache_key(&self, identity: &str, run: &RunConfig) -> Result<CacheKey> {
        Ok(CacheKey::optimization(identity, run.width, run.height)?)
    }

    fn retain(&self, settings: &OnnxSettings) -> bool {
        settings.cache_optimized
    }

    fn temp_output(&self) -> &'static str {
        "optimized"
    }

    fn workflow(
        &self,
        ctx: &StageContext<'_>,
        submodel: &str,
        input_dir: &Path,
        work_dir: &Path,
    ) -> Result<Workflow> {
        let template = stage::template_path(ctx, TEMPLATE_FAMILY, submodel);
        let mut workflow = Workflow::from_template(submodel, &template, &stage::template_vars(ctx, submodel))?;
        let key = pass_key(ctx.target.name());

        workflow.set(&["pass_flows"], json!([[key]]))?;
        workflow.set(
            &["input_model", "config", "model_path"],
            json!(absolute(&input_dir.join(submodel).join(GRAPH_FILE)).to_string_lossy()),
        )?;
        workflow.set(&["passes", key.as_str(), "config", "float16"], json!(ctx.settings.olive_float16))?;

        if ctx.target.needs_skip_group_norm_workaround() {
            log::debug!("Disabling skip group norm fusion for {}", ctx.target.name());
            workflow.set(
                &["passes", key.as_str(), "config", "optimization_options"],
                json!({ "enable_skip_group_norm": false }),
            )?;
        }

        stage::set_engine(&mut workflow, ctx, work_dir)?;
        Ok(workflow)
    }
}

/// Optimize the converted model in `converted_dir`, or find it in the cache
pub fn optimize(ctx: &StageContext<'_>, input: &StageInput<'_>, converted_dir: &Path) -> Option<PathBuf> {
    stage::run_stage(&Optimization, ctx, input, converted_dir)
}

/// Workflow the optimization stage would run for `submodel`
pub fn optimization_workflow(
    ctx: &StageContext<'_>,
    submodel: &str,
    converted_dir: &Path,
    work_dir: &Path,
) -> Result<Workflow> {
    Optimization.workflow(ctx, submodel, converted_dir, work_dir)
}
