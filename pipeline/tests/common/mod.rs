//! Fixtures shared by the pipeline integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use sdonnx_execution_providers::{BackendType, ExecutionTarget, TargetOptions};
use sdonnx_model_cache::GRAPH_FILE;
use sdonnx_olive::{
    Footprint, FootprintSet, OliveError, Workflow, WorkflowEngine, CONVERSION_PASS, OPTIMIZATION_PASS,
};
use sdonnx_pipeline::{
    Architecture, CheckpointExtractor, Component, ComponentLoader, ComponentRegistry, InferenceGraph,
    OnnxSettings, Orchestrator, PipelineError, RunConfig, SubmodelSpec,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug)]
pub struct StubGraph(PathBuf);

impl InferenceGraph for StubGraph {
    fn model_path(&self) -> &Path {
        &self.0
    }
}

/// Accepts any `model.onnx` file without parsing it
#[derive(Debug, Default)]
pub struct StubGraphLoader;

impl ComponentLoader for StubGraphLoader {
    fn load(&self, spec: &SubmodelSpec, _run: &RunConfig) -> sdonnx_pipeline::Result<Component> {
        let path = spec.directory.join(GRAPH_FILE);
        if !path.is_file() {
            return Err(PipelineError::ComponentLoad {
                name: spec.name.clone(),
                message: format!("{} missing", path.display()),
            });
        }
        Ok(Component::Graph {
            reference: spec.reference.clone(),
            graph: Arc::new(StubGraph(path)),
        })
    }
}

pub fn registry() -> ComponentRegistry {
    ComponentRegistry::with_defaults().with_graph_loader(Arc::new(StubGraphLoader))
}

/// Fake Olive: writes a dummy graph into the workflow's output directory
#[derive(Clone, Default)]
pub struct StubEngine {
    pub calls: Arc<AtomicUsize>,
    pub workflows: Arc<Mutex<Vec<Workflow>>>,
    fail_pass: Option<&'static str>,
    fail_submodel: Option<&'static str>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_pass(mut self, pass: &'static str) -> Self {
        self.fail_pass = Some(pass);
        self
    }

    pub fn failing_submodel(mut self, submodel: &'static str) -> Self {
        self.fail_submodel = Some(submodel);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn workflows(&self) -> Vec<Workflow> {
        self.workflows.lock().unwrap().clone()
    }
}

impl WorkflowEngine for StubEngine {
    fn run(&self, workflow: &Workflow) -> sdonnx_olive::Result<FootprintSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.workflows.lock().unwrap().push(workflow.clone());

        let pass = if workflow.get(&["pass_flows"]).is_some() {
            OPTIMIZATION_PASS
        } else {
            CONVERSION_PASS
        };
        if self.fail_pass == Some(pass) || self.fail_submodel == Some(workflow.name()) {
            return Err(OliveError::Process {
                command: "python -m olive.workflows.run".into(),
                status: "exit status: 1".into(),
                stderr: format!("{pass} failed for {}", workflow.name()),
            });
        }

        let out = workflow.output_dir().expect("engine.output_dir").join("output_model");
        fs::create_dir_all(&out)?;
        let graph = out.join(GRAPH_FILE);
        fs::write(&graph, format!("{pass}:{}", workflow.name()))?;
        if workflow.name() == "unet" {
            fs::write(out.join("model.onnx.data"), b"weights")?;
        }

        Ok(FootprintSet::from_records(vec![
            Footprint {
                id: "input_model".into(),
                parent_model_id: None,
                from_pass: None,
                model_config: json!({}),
            },
            Footprint {
                id: format!("0_{pass}"),
                parent_model_id: Some("input_model".into()),
                from_pass: Some(pass.into()),
                model_config: json!({ "config": { "model_path": graph.to_string_lossy() } }),
            },
        ]))
    }
}

/// Fake single-file unpacker
#[derive(Clone, Default)]
pub struct StubExtractor {
    pub calls: Arc<AtomicUsize>,
    fail: bool,
}

impl StubExtractor {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl CheckpointExtractor for StubExtractor {
    fn extract(&self, checkpoint: &Path, architecture: Architecture, dest: &Path) -> sdonnx_pipeline::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::Extraction(format!("cannot read {}", checkpoint.display())));
        }
        write_model(dest, architecture);
        Ok(())
    }
}

fn write_json(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

/// A diffusers-style model directory with weights and configs
pub fn write_model(dir: &Path, architecture: Architecture) {
    let mut index = json!({
        "_class_name": "StableDiffusionPipeline",
        "_diffusers_version": "0.25.0",
        "feature_extractor": ["transformers", "CLIPImageProcessor"],
        "image_encoder": [null, null],
        "requires_safety_checker": true,
        "safety_checker": [null, null],
        "scheduler": ["diffusers", "PNDMScheduler"],
        "text_encoder": ["transformers", "CLIPTextModel"],
        "tokenizer": ["transformers", "CLIPTokenizer"],
        "unet": ["diffusers", "UNet2DConditionModel"],
        "vae": ["diffusers", "AutoencoderKL"],
        "watermark_hook": ["my_extension", "Watermark"]
    });
    if architecture.is_xl() {
        let map = index.as_object_mut().unwrap();
        map.insert("_class_name".into(), json!("StableDiffusionXLPipeline"));
        map.insert("text_encoder_2".into(), json!(["transformers", "CLIPTextModelWithProjection"]));
        map.insert("tokenizer_2".into(), json!(["transformers", "CLIPTokenizer"]));
        map.insert("force_zeros_for_empty_prompt".into(), json!(true));
        map.remove("requires_safety_checker");
        map.remove("safety_checker");
    }
    write_json(&dir.join("model_index.json"), &index);

    write_json(&dir.join("scheduler/scheduler_config.json"), &json!({ "_class_name": "PNDMScheduler" }));
    write_json(&dir.join("tokenizer/tokenizer_config.json"), &json!({ "model_max_length": 77 }));
    write_json(&dir.join("tokenizer/vocab.json"), &json!({ "a</w>": 0, "photo</w>": 1 }));
    write_json(&dir.join("feature_extractor/preprocessor_config.json"), &json!({ "crop_size": 224 }));

    let mut modules = vec!["text_encoder", "unet", "vae"];
    if architecture.is_xl() {
        modules.push("text_encoder_2");
        write_json(&dir.join("tokenizer_2/tokenizer_config.json"), &json!({ "model_max_length": 77 }));
    }
    for module in modules {
        write_json(&dir.join(module).join("config.json"), &json!({ "name": module }));
        fs::write(dir.join(module).join("model.safetensors"), b"weights").unwrap();
    }
}

/// Conversion and optimization templates for both architectures
pub fn write_templates(dir: &Path) {
    for arch in [Architecture::StableDiffusion, Architecture::StableDiffusionXl] {
        for submodel in arch.submodels() {
            let name = format!("{}_{}.json", arch.template_prefix(), submodel);

            write_json(
                &dir.join("onnx").join(&name),
                &json!({
                    "input_model": {
                        "type": "PyTorchModel",
                        "config": {
                            "model_path": "",
                            "model_loader": "{{submodel}}_load",
                            "dummy_inputs_func": "{{submodel}}_conversion_inputs",
                            "io_config": { "dynamic_axes": { "sample": { "0": "{{unet_batch_size}}" } } }
                        }
                    },
                    "passes": { "convert": { "type": "OnnxConversion", "config": { "target_opset": 14 } } },
                    "engine": { "log_severity_level": 0, "output_name": "{{submodel}}" }
                }),
            );

            let mut passes = serde_json::Map::new();
            for backend in BackendType::ALL {
                passes.insert(
                    format!("optimize_{}", backend.provider_name()),
                    json!({ "type": "OrtTransformersOptimization", "config": { "model_type": "unet", "float16": false } }),
                );
            }
            write_json(
                &dir.join("olive").join(&name),
                &json!({
                    "input_model": { "type": "ONNXModel", "config": { "model_path": "" } },
                    "systems": { "local_system": { "type": "LocalSystem" } },
                    "passes": passes,
                    "pass_flows": [],
                    "engine": { "output_name": "{{submodel}}", "target": "local_system" }
                }),
            );
        }
    }
}

/// Settings rooted in `root`, with templates written
pub fn settings(root: &Path) -> OnnxSettings {
    let templates = root.join("configs");
    write_templates(&templates);
    OnnxSettings {
        cache_root: root.join("cache"),
        temp_dir: root.join("temp"),
        templates_dir: templates,
        ..Default::default()
    }
}

pub fn cpu_target() -> ExecutionTarget {
    ExecutionTarget::from_backend(BackendType::CPU, &TargetOptions::default())
}

pub fn orchestrator(settings: OnnxSettings, engine: &StubEngine, extractor: &StubExtractor) -> Orchestrator {
    Orchestrator::new(
        settings,
        cpu_target(),
        Box::new(engine.clone()),
        Box::new(extractor.clone()),
        registry(),
    )
}

/// Names directly under `dir`, sorted; empty when `dir` is missing
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
