//! On-disk cache of converted and optimized diffusion pipelines
//!
//! Each entry is a directory holding one folder per sub-component
//! (`model.onnx` plus optional sidecars) and a `model_index.json` manifest.
//! Entries are built in a [`StagingDir`] and published by rename, so a
//! visible entry is always complete.

pub mod error;
pub mod manifest;
pub mod layout;
pub mod staging;
pub mod artifacts;

pub use error::{ModelCacheError, Result};
pub use manifest::{
    ComponentRef, ManifestLoad, ManifestValue, ModelManifest, SkippedEntry, CLASS_NAME_KEY,
    MODEL_INDEX,
};
pub use layout::{sweep_staging_in, CacheKey, CacheLayout, STAGING_PREFIX};
pub use staging::StagingDir;
pub use artifacts::{
    copy_graph_artifacts, copy_tree_filtered, is_binary_model_file, CopiedGraph,
    EXTERNAL_DATA_SUFFIX, GRAPH_FILE, WEIGHTS_FILE,
};
