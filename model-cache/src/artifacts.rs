//! Copying graph files and model trees into cache entries

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ModelCacheError, Result};

/// File name every sub-component graph is stored under
pub const GRAPH_FILE: &str = "model.onnx";

/// Suffix of an ONNX external-data sidecar (`model.onnx.data`)
pub const EXTERNAL_DATA_SUFFIX: &str = ".data";

/// Weights sidecar some exporters write next to the graph
pub const WEIGHTS_FILE: &str = "weights.pb";

/// Files that are never carried over when seeding an entry from a source
/// tree: they are either regenerated by the stage or are the framework
/// weights being replaced.
pub fn is_binary_model_file(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    lower == WEIGHTS_FILE
        || lower.ends_with(".onnx")
        || lower.ends_with(".onnx.data")
        || lower.ends_with(".safetensors")
        || lower.ends_with(".ckpt")
}

/// Recursively copy `src` into `dest`, skipping files for which `exclude`
/// returns true. Returns the number of files copied.
pub fn copy_tree_filtered(src: &Path, dest: &Path, exclude: &dyn Fn(&str) -> bool) -> Result<usize> {
    fs::create_dir_all(dest)?;

    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let target = dest.join(&name);

        if entry.path().is_dir() {
            copied += copy_tree_filtered(&entry.path(), &target, exclude)?;
        } else if !name.to_str().is_some_and(exclude) {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Where a graph and its sidecars ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedGraph {
    pub graph: PathBuf,
    pub external_data: Option<PathBuf>,
    pub weights: Option<PathBuf>,
}

/// Copy a produced graph into `dest_dir/model.onnx`
///
/// `<graph>.data` is renamed to follow the graph (`model.onnx.data`);
/// a `weights.pb` beside the graph is copied as-is.
pub fn copy_graph_artifacts(graph: &Path, dest_dir: &Path) -> Result<CopiedGraph> {
    if !graph.is_file() {
        return Err(ModelCacheError::ArtifactNotFound(graph.to_path_buf()));
    }
    fs::create_dir_all(dest_dir)?;

    let dest_graph = dest_dir.join(GRAPH_FILE);
    fs::copy(graph, &dest_graph)?;

    let mut data_src = graph.as_os_str().to_owned();
    data_src.push(EXTERNAL_DATA_SUFFIX);
    let data_src = PathBuf::from(data_src);
    let external_data = if data_src.is_file() {
        let dest = dest_dir.join(format!("{GRAPH_FILE}{EXTERNAL_DATA_SUFFIX}"));
        fs::copy(&data_src, &dest)?;
        Some(dest)
    } else {
        None
    };

    let weights_src = graph.parent().map(|p| p.join(WEIGHTS_FILE));
    let weights = match weights_src {
        Some(src) if src.is_file() => {
            let dest = dest_dir.join(WEIGHTS_FILE);
            fs::copy(&src, &dest)?;
            Some(dest)
        }
        _ => None,
    };

    Ok(CopiedGraph {
        graph: dest_graph,
        external_data,
        weights,
    })
}
