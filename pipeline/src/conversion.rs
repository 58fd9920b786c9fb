//! Conversion stage: framework sub-networks to ONNX graphs.

use std::path::{Path, PathBuf};

use serde_json::json;

use sdonnx_model_cache::CacheKey;
use sdonnx_olive::{Workflow, CONVERSION_PASS};

use crate::config::{absolute, OnnxSettings, RunConfig};
use crate::error::Result;
use crate::stage::{self, StageContext, StageInput, StagePlan};

/// Template family under `templates_dir`
pub const TEMPLATE_FAMILY: &str = "onnx";

struct Conversion;

impl StagePlan for Conversion {
    fn verb(&self) -> &'static str {
        "convert"
    }

    fn pass(&self) -> &'static str {
        CONVERSION_PASS
    }

    fn cache_key(&self, identity: &str, _run: &RunConfig) -> Result<CacheKey> {
        Ok(CacheKey::conversion(identity)?)
    }

    fn retain(&self, settings: &OnnxSettings) -> bool {
        settings.cache_converted
    }

    fn temp_output(&self) -> &'static str {
        "converted"
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

        workflow.set(
            &["input_model", "config", "model_path"],
            json!(absolute(input_dir).to_string_lossy()),
        )?;
        stage::set_engine(&mut workflow, ctx, work_dir)?;

        Ok(workflow)
    }
}

/// Convert the model in `source_dir`, or find it in the cache
///
/// `None` when conversion failed; the failure has been logged and the
/// partial output removed.
pub fn convert(ctx: &StageContext<'_>, input: &StageInput<'_>, source_dir: &Path) -> Option<PathBuf> {
    stage::run_stage(&Conversion, ctx, input, source_dir)
}

/// Workflow the conversion stage would run for `submodel`
pub fn conversion_workflow(
    ctx: &StageContext<'_>,
    submodel: &str,
    source_dir: &Path,
    work_dir: &Path,
) -> Result<Workflow> {
    Conversion.workflow(ctx, submodel, source_dir, work_dir)
}
