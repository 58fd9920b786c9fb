//! Runs `PythonOliveEngine` against a stand-in interpreter script

#![cfg(unix)]

use std::fs;
use std::path::Path;

use sdonnx_olive::*;
use serde_json::json;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A `sh` script standing in for `python -m olive.workflows.run --config <file>`
fn fake_python(dir: &Path, body: &str) -> PythonCommand {
    let script = dir.join("fake_olive.sh");
    fs::write(&script, body).unwrap();
    PythonCommand::new("sh").with_leading_args([script.to_string_lossy().into_owned()])
}

fn unet_workflow(output_dir: &Path) -> Workflow {
    Workflow::from_value(
        "unet",
        json!({
            "input_model": { "config": { "model_path": "/models/sd15" } },
            "engine": {
                "execution_providers": ["DmlExecutionProvider"],
                "output_dir": output_dir,
                "output_name": "unet"
            }
        }),
    )
}

#[test]
fn test_engine_reads_footprints() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    let footprints = json!({
        "0_OnnxConversion-x": {
            "from_pass": "OnnxConversion",
            "model_config": { "config": { "model_path": work.join("out/model.onnx") } }
        }
    });
    let script = format!(
        "[ \"$1\" = \"-m\" ] && [ \"$2\" = \"olive.workflows.run\" ] && [ \"$3\" = \"--config\" ] || exit 8\n\
         test -f \"$4\" || exit 9\n\
         cat > '{}' <<'JSON'\n{}\nJSON\n",
        work.join("unet_gpu-dml_footprints.json").display(),
        footprints
    );

    let engine = PythonOliveEngine::new(fake_python(dir.path(), &script));
    let set = engine.run(&unet_workflow(&work)).unwrap();

    assert_eq!(set.len(), 1);
    assert_eq!(set.output_of(CONVERSION_PASS).unwrap(), work.join("out/model.onnx"));
    assert!(work.join("unet_workflow.json").is_file());
}

#[test]
fn test_engine_without_footprints_fails() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    fs::create_dir_all(&work).unwrap();
    // Left over from an earlier run; must not be picked up
    fs::write(work.join("unet_gpu-dml_footprints.json"), "{}").unwrap();

    let engine = PythonOliveEngine::new(fake_python(dir.path(), "exit 0\n"));
    let result = engine.run(&unet_workflow(&work));

    assert!(matches!(result, Err(OliveError::FootprintsNotFound(_))));
}

#[test]
fn test_engine_process_failure() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let engine = PythonOliveEngine::new(fake_python(dir.path(), "echo 'CUDA out of memory' >&2\nexit 1\n"));

    match engine.run(&unet_workflow(&dir.path().join("work"))) {
        Err(OliveError::Process { stderr, .. }) => assert!(stderr.contains("out of memory")),
        other => panic!("expected process error, got {:?}", other),
    }
}

#[test]
fn test_onnxruntime_version_query() {
    let dir = tempfile::tempdir().unwrap();
    let engine = PythonOliveEngine::new(fake_python(
        dir.path(),
        "[ \"$1\" = \"-c\" ] || exit 8\necho 'warning: something'\necho '1.16.3'\n",
    ));
    assert_eq!(
        engine.onnxruntime_version().unwrap(),
        sdonnx_execution_providers::RuntimeVersion::new(1, 16, 3)
    );

    let garbled = PythonOliveEngine::new(fake_python(dir.path(), "echo 'no version here'\n"));
    assert!(matches!(
        garbled.onnxruntime_version(),
        Err(OliveError::InvalidRuntimeVersion(_))
    ));
}
