//! End-to-end preparation: conversion, optimization and both fallbacks

mod common;

use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;

use common::*;
use sdonnx_pipeline::{
    AssembledPipeline, Architecture, CheckpointInfo, Component, OnnxSettings, PipelineClass, PipelineSource,
    PreparationOutcome,
};

fn checkpoint() -> CheckpointInfo {
    CheckpointInfo {
        title: "model.ckpt [abc123]".into(),
        filename: "model.ckpt".into(),
        hash: Some("abc123def456".into()),
        short_hash: Some("abc123".into()),
    }
}

#[test]
fn test_single_file_checkpoint_512() {
    init_logging();
    let root = tempfile::tempdir().unwrap();
    let settings = settings(root.path());
    let ckpt = root.path().join("models").join("model.ckpt");
    fs::create_dir_all(ckpt.parent().unwrap()).unwrap();
    fs::write(&ckpt, b"checkpoint").unwrap();

    let engine = StubEngine::new();
    let extractor = StubExtractor::default();
    let orchestrator = orchestrator(settings.clone(), &engine, &extractor);

    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusion, &ckpt, Some(checkpoint()));
    assert!(raw.is_single_file());
    assert_eq!(raw.original_filename(), "model.ckpt");
    assert!(raw.manifest().contains_key("unet"));
    assert!(!raw.manifest().contains_key("vae"));

    let prepared = orchestrator.prepare(&raw, 1, 512, 512).unwrap();
    assert_eq!(prepared.outcome, PreparationOutcome::Converted);
    assert_eq!(engine.calls(), 4);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1, "unpacked once at open");

    let entry = settings.cache_root.join("model.ckpt");
    assert!(entry.join("model_index.json").is_file());
    for submodel in Architecture::StableDiffusion.submodels() {
        assert!(entry.join(submodel).join("model.onnx").is_file());
    }

    let pipeline = &prepared.pipeline;
    assert_eq!(pipeline.class(), PipelineClass::OnnxStableDiffusion);
    assert_eq!(pipeline.source(), &PipelineSource::Directory(entry.clone()));
    assert_eq!(pipeline.original_filename(), Some("model.ckpt"));
    assert_eq!(pipeline.checkpoint(), Some(&checkpoint()));
    assert!(pipeline.graph("unet").is_some());
    assert!(matches!(pipeline.component("scheduler"), Some(Component::Configured(_))));
    assert!(!settings.temp_dir.exists(), "temp dir must be removed");
}

#[test]
fn test_second_prepare_uses_cache() {
    let root = tempfile::tempdir().unwrap();
    let source = root.path().join("models").join("my-model");
    write_model(&source, Architecture::StableDiffusion);

    let engine = StubEngine::new();
    let orchestrator = orchestrator(settings(root.path()), &engine, &StubExtractor::default());
    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusion, &source, None);

    orchestrator.prepare(&raw, 1, 512, 512).unwrap();
    let again = orchestrator.prepare(&raw, 2, 512, 512).unwrap();

    assert_eq!(again.outcome, PreparationOutcome::Converted);
    assert_eq!(engine.calls(), 4);
}

#[test]
fn test_conversion_failure_falls_back_to_original() {
    init_logging();
    let root = tempfile::tempdir().unwrap();
    let settings = settings(root.path());
    let source = root.path().join("models").join("my-model");
    write_model(&source, Architecture::StableDiffusion);

    let engine = StubEngine::new().failing_submodel("unet");
    let orchestrator = orchestrator(settings.clone(), &engine, &StubExtractor::default());
    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusionImg2Img, &source, Some(checkpoint()));

    let prepared = orchestrator.prepare(&raw, 1, 512, 512).unwrap();
    assert_eq!(prepared.outcome, PreparationOutcome::ConversionFallback);

    let pipeline = &prepared.pipeline;
    assert_eq!(pipeline.class(), PipelineClass::StableDiffusion);
    assert_eq!(pipeline.source(), &PipelineSource::Directory(source.clone()));
    assert!(matches!(pipeline.component("vae"), Some(Component::Configured(_))));
    assert_eq!(pipeline.checkpoint(), Some(&checkpoint()));
    assert_eq!(pipeline.original_filename(), Some("my-model"));

    assert!(!settings.cache_root.join("my-model").exists());
    assert!(!settings.temp_dir.exists());
}

#[test]
fn test_unreadable_checkpoint_falls_back_to_original() {
    let root = tempfile::tempdir().unwrap();
    let settings = settings(root.path());
    let ckpt = root.path().join("model.safetensors");
    fs::write(&ckpt, b"not a checkpoint").unwrap();

    let engine = StubEngine::new();
    let extractor = StubExtractor::failing();
    let orchestrator = orchestrator(settings.clone(), &engine, &extractor);
    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusionXl, &ckpt, None);
    assert!(raw.manifest().is_empty());

    let prepared = orchestrator.prepare(&raw, 1, 1024, 1024).unwrap();
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1, "a failed unpack is not retried");
    assert_eq!(prepared.outcome, PreparationOutcome::ConversionFallback);
    assert_eq!(prepared.pipeline.class(), PipelineClass::StableDiffusionXl);
    assert_eq!(prepared.pipeline.source(), &PipelineSource::SingleFile(ckpt));
    assert_eq!(engine.calls(), 0);
    assert!(!settings.temp_dir.exists());
}

#[test]
fn test_fallback_a_failure_propagates() {
    let root = tempfile::tempdir().unwrap();
    let settings = settings(root.path());
    let engine = StubEngine::new();
    let orchestrator = orchestrator(settings.clone(), &engine, &StubExtractor::failing());

    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusion, root.path().join("missing"), None);
    assert!(orchestrator.prepare(&raw, 1, 512, 512).is_err());
    assert!(!settings.temp_dir.exists());
}

#[test]
fn test_optimization_success() {
    init_logging();
    let root = tempfile::tempdir().unwrap();
    let settings = OnnxSettings {
        enable_olive: true,
        cache_converted: false,
        ..settings(root.path())
    };
    let source = root.path().join("models").join("my-model");
    write_model(&source, Architecture::StableDiffusion);

    let engine = StubEngine::new();
    let orchestrator = orchestrator(settings.clone(), &engine, &StubExtractor::default());
    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusion, &source, None);

    let prepared = orchestrator.prepare(&raw, 1, 512, 768).unwrap();
    assert_eq!(prepared.outcome, PreparationOutcome::Optimized);
    assert_eq!(engine.calls(), 8);

    let optimized = settings.cache_root.join("my-model-768w-512h");
    assert_eq!(prepared.pipeline.source(), &PipelineSource::Directory(optimized.clone()));
    let unet = prepared.pipeline.graph("unet").unwrap();
    assert_eq!(unet.model_path(), optimized.join("unet/model.onnx").as_path());

    assert!(!settings.cache_root.join("my-model").exists(), "conversion not retained");
    assert!(!settings.temp_dir.exists());
}

#[test]
fn test_optimization_failure_falls_back_to_converted() {
    init_logging();
    let root = tempfile::tempdir().unwrap();
    let settings = OnnxSettings {
        enable_olive: true,
        ..settings(root.path())
    };
    let source = root.path().join("models").join("my-model");
    write_model(&source, Architecture::StableDiffusionXl);

    let engine = StubEngine::new().failing_pass("OrtTransformersOptimization");
    let orchestrator = orchestrator(settings.clone(), &engine, &StubExtractor::default());
    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusionXl, &source, Some(checkpoint()));

    let prepared = orchestrator.prepare(&raw, 1, 1024, 1024).unwrap();
    assert_eq!(prepared.outcome, PreparationOutcome::OptimizationFallback);

    let converted = settings.cache_root.join("my-model");
    assert_eq!(prepared.pipeline.source(), &PipelineSource::Directory(converted));
    assert_eq!(prepared.pipeline.class(), PipelineClass::OnnxStableDiffusionXl);
    assert_eq!(prepared.pipeline.checkpoint(), Some(&checkpoint()));
    assert!(prepared.pipeline.graph("text_encoder_2").is_some());

    assert!(!settings.cache_root.join("my-model-1024w-1024h").exists());
    assert!(!settings.temp_dir.exists());
}

#[test]
fn test_hash_keyed_cache_identity() {
    let root = tempfile::tempdir().unwrap();
    let settings = OnnxSettings {
        cache_identity: sdonnx_pipeline::CacheIdentity::FileNameAndHash,
        ..settings(root.path())
    };
    let source = root.path().join("models").join("my-model");
    write_model(&source, Architecture::StableDiffusion);

    let orchestrator = orchestrator(settings.clone(), &StubEngine::new(), &StubExtractor::default());
    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusion, &source, Some(checkpoint()));
    orchestrator.prepare(&raw, 1, 512, 512).unwrap();

    assert!(settings.cache_root.join("my-model-abc123").join("model_index.json").is_file());
}

#[test]
fn test_sweep_stale_staging() {
    let root = tempfile::tempdir().unwrap();
    let settings = settings(root.path());
    fs::create_dir_all(settings.cache_root.join(".staging-abc/unet")).unwrap();
    fs::create_dir_all(settings.cache_root.join("my-model")).unwrap();

    let orchestrator = orchestrator(settings.clone(), &StubEngine::new(), &StubExtractor::default());
    assert_eq!(orchestrator.sweep_stale_staging().unwrap(), 1);
    assert_eq!(entries(&settings.cache_root), vec!["my-model".to_string()]);
}

/// Every configured component is self-contained and its origin still exists
fn assert_usable_after_cleanup(pipeline: &AssembledPipeline) {
    let tokenizer = match pipeline.component("tokenizer") {
        Some(Component::Configured(c)) => c,
        other => panic!("expected a tokenizer, got {:?}", other),
    };
    assert!(tokenizer.file("vocab.json").is_some());
    assert!(tokenizer.file("tokenizer_config.json").is_some());

    for (name, component) in pipeline.components() {
        if let Component::Configured(c) = component {
            assert!(c.directory.is_dir(), "{name}: {} was removed", c.directory.display());
        }
    }
    assert!(pipeline.source().path().exists());
}

#[test]
fn test_uncached_conversion_uses_original_components() {
    init_logging();
    let root = tempfile::tempdir().unwrap();
    let settings = OnnxSettings {
        cache_converted: false,
        ..settings(root.path())
    };
    let source = root.path().join("models").join("my-model");
    write_model(&source, Architecture::StableDiffusion);

    let orchestrator = orchestrator(settings.clone(), &StubEngine::new(), &StubExtractor::default());
    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusion, &source, None);
    let prepared = orchestrator.prepare(&raw, 1, 512, 512).unwrap();

    assert_eq!(prepared.outcome, PreparationOutcome::Converted);
    assert_eq!(prepared.pipeline.class(), PipelineClass::OnnxStableDiffusion);
    assert_eq!(prepared.pipeline.source(), &PipelineSource::Directory(source.clone()));
    for submodel in Architecture::StableDiffusion.submodels() {
        assert!(prepared.pipeline.graph(submodel).is_some(), "{submodel} graph");
    }
    assert!(matches!(
        prepared.pipeline.component("requires_safety_checker"),
        Some(Component::Literal(serde_json::Value::Bool(false)))
    ));
    assert_usable_after_cleanup(&prepared.pipeline);

    assert!(!settings.temp_dir.exists());
    assert!(!settings.cache_root.join("my-model").exists());
}

#[test]
fn test_uncached_fallback_b_uses_original_components() {
    let root = tempfile::tempdir().unwrap();
    let settings = OnnxSettings {
        enable_olive: true,
        cache_converted: false,
        ..settings(root.path())
    };
    let source = root.path().join("models").join("my-model");
    write_model(&source, Architecture::StableDiffusion);

    let engine = StubEngine::new().failing_pass("OrtTransformersOptimization");
    let orchestrator = orchestrator(settings.clone(), &engine, &StubExtractor::default());
    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusion, &source, None);
    let prepared = orchestrator.prepare(&raw, 1, 512, 512).unwrap();

    assert_eq!(prepared.outcome, PreparationOutcome::OptimizationFallback);
    assert_eq!(prepared.pipeline.source(), &PipelineSource::Directory(source));
    assert_usable_after_cleanup(&prepared.pipeline);
    assert!(!settings.temp_dir.exists());
}

#[test]
fn test_uncached_single_file_components_outlive_temp_dir() {
    let root = tempfile::tempdir().unwrap();
    let settings = OnnxSettings {
        cache_converted: false,
        ..settings(root.path())
    };
    let ckpt = root.path().join("model.ckpt");
    fs::write(&ckpt, b"checkpoint").unwrap();

    let orchestrator = orchestrator(settings.clone(), &StubEngine::new(), &StubExtractor::default());
    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusion, &ckpt, None);
    let prepared = orchestrator.prepare(&raw, 1, 512, 512).unwrap();

    assert_eq!(prepared.outcome, PreparationOutcome::Converted);
    assert!(!settings.temp_dir.exists());
    match prepared.pipeline.component("tokenizer") {
        Some(Component::Configured(c)) => assert!(c.file("vocab.json").is_some()),
        other => panic!("expected a tokenizer, got {:?}", other),
    }
    assert!(matches!(prepared.pipeline.component("scheduler"), Some(Component::Configured(c)) if c.config.is_some()));
}

#[test]
fn test_cached_single_file_is_not_unpacked_again() {
    init_logging();
    let root = tempfile::tempdir().unwrap();
    let settings = settings(root.path());
    let ckpt = root.path().join("model.ckpt");
    fs::write(&ckpt, b"checkpoint").unwrap();

    let engine = StubEngine::new();
    let extractor = StubExtractor::default();
    let orchestrator = orchestrator(settings.clone(), &engine, &extractor);

    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusion, &ckpt, None);
    orchestrator.prepare(&raw, 1, 512, 512).unwrap();
    let again = orchestrator.prepare(&raw, 1, 512, 512).unwrap();

    assert_eq!(again.outcome, PreparationOutcome::Converted);
    assert_eq!(engine.calls(), 4);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    assert!(matches!(again.pipeline.component("scheduler"), Some(Component::Configured(_))));

    // Reopening reads the manifest from the cache entry
    let reopened = orchestrator.open(PipelineClass::OnnxStableDiffusion, &ckpt, None);
    assert!(reopened.manifest().contains_key("scheduler"));
    let third = orchestrator.prepare(&reopened, 1, 512, 512).unwrap();
    assert_eq!(third.outcome, PreparationOutcome::Converted);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    assert!(!settings.temp_dir.exists());
}

#[test]
fn test_unusable_optimized_entry_is_removed() {
    init_logging();
    let root = tempfile::tempdir().unwrap();
    let settings = OnnxSettings {
        enable_olive: true,
        ..settings(root.path())
    };
    let source = root.path().join("models").join("my-model");
    write_model(&source, Architecture::StableDiffusion);

    // An entry without graphs still counts as a hit
    let broken = settings.cache_root.join("my-model-512w-512h");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("model_index.json"), r#"{"_class_name": "OnnxStableDiffusionPipeline"}"#).unwrap();

    let engine = StubEngine::new();
    let orchestrator = orchestrator(settings.clone(), &engine, &StubExtractor::default());
    let raw = orchestrator.open(PipelineClass::OnnxStableDiffusion, &source, None);
    let prepared = orchestrator.prepare(&raw, 1, 512, 512).unwrap();

    assert_eq!(prepared.outcome, PreparationOutcome::OptimizationFallback);
    assert_eq!(engine.calls(), 4, "optimization hit the cache");
    assert!(!broken.exists());
    assert!(settings.cache_root.join("my-model").join("model_index.json").is_file());

    // The next run rebuilds the optimized entry
    let rebuilt = orchestrator.prepare(&raw, 1, 512, 512).unwrap();
    assert_eq!(rebuilt.outcome, PreparationOutcome::Optimized);
    assert_eq!(engine.calls(), 8);
}

#[cfg(unix)]
fn fake_python(dir: &Path, body: &str) -> sdonnx_olive::PythonCommand {
    let script = dir.join("fake_python.sh");
    fs::write(&script, body).unwrap();
    sdonnx_olive::PythonCommand::new("sh").with_leading_args([script.to_string_lossy().into_owned()])
}

#[cfg(unix)]
#[test]
fn test_default_orchestrator_detects_runtime_version() {
    use sdonnx_execution_providers::{BackendType, ExecutionTarget, RuntimeVersion, TargetOptions};
    use sdonnx_pipeline::Orchestrator;

    let root = tempfile::tempdir().unwrap();
    let cuda = ExecutionTarget::from_backend(BackendType::Cuda, &TargetOptions::default());

    let old_runtime = OnnxSettings {
        python: fake_python(root.path(), "echo 1.16.3\n"),
        ..settings(root.path())
    };
    let orchestrator = Orchestrator::with_defaults(old_runtime.clone(), cuda.clone());
    assert_eq!(orchestrator.target().runtime_version(), Some(RuntimeVersion::new(1, 16, 3)));
    assert!(orchestrator.target().needs_skip_group_norm_workaround());

    // An explicit version is kept
    let pinned = cuda.clone().with_runtime_version(RuntimeVersion::new(1, 17, 1));
    let orchestrator = Orchestrator::with_defaults(old_runtime, pinned);
    assert_eq!(orchestrator.target().runtime_version(), Some(RuntimeVersion::new(1, 17, 1)));

    let no_runtime = OnnxSettings {
        python: fake_python(root.path(), "echo 'ModuleNotFoundError: onnxruntime' >&2\nexit 1\n"),
        ..settings(root.path())
    };
    let orchestrator = Orchestrator::with_defaults(no_runtime, cuda);
    assert_eq!(orchestrator.target().runtime_version(), None);
    assert!(!orchestrator.target().needs_skip_group_norm_workaround());
}
