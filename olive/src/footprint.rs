//! Olive footprints: the per-run record of every model a workflow produced

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OliveError, Result};

/// Pass that turns a framework model into an ONNX graph
pub const CONVERSION_PASS: &str = "OnnxConversion";

/// Pass that fuses and (optionally) halves an ONNX graph
pub const OPTIMIZATION_PASS: &str = "OrtTransformersOptimization";

/// Graph file Olive writes inside a model directory
const DEFAULT_ONNX_FILE_NAME: &str = "model.onnx";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub parent_model_id: Option<String>,
    #[serde(default)]
    pub from_pass: Option<String>,
    #[serde(default)]
    pub model_config: Value,
}

impl Footprint {
    /// Path of the ONNX graph this footprint describes
    ///
    /// `model_config.config.model_path` may name the graph itself or the
    /// directory holding it (then `onnx_file_name`, default `model.onnx`).
    pub fn model_path(&self) -> Result<PathBuf> {
        let config = self.model_config.get("config");
        let model_path = config
            .and_then(|c| c.get("model_path"))
            .and_then(Value::as_str)
            .ok_or_else(|| OliveError::InvalidFootprint {
                id: self.id.clone(),
                message: "model_config.config.model_path is missing".into(),
            })?;

        let path = PathBuf::from(model_path);
        if path.is_dir() {
            let file_name = config
                .and_then(|c| c.get("onnx_file_name"))
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_ONNX_FILE_NAME);
            Ok(path.join(file_name))
        } else {
            Ok(path)
        }
    }
}

/// All footprints of one workflow run, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FootprintSet {
    records: Vec<Footprint>,
}

impl FootprintSet {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(OliveError::FootprintsNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_json(serde_json::from_str(&content)?)
    }

    /// Parse the `{ "<model id>": { ...footprint... }, ... }` mapping
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(OliveError::InvalidFootprint {
                id: String::new(),
                message: "footprint file must be a JSON object".into(),
            });
        };

        let mut records = Vec::with_capacity(map.len());
        for (id, node) in map {
            let mut footprint: Footprint =
                serde_json::from_value(node).map_err(|e| OliveError::InvalidFootprint {
                    id: id.clone(),
                    message: e.to_string(),
                })?;
            if footprint.id.is_empty() {
                footprint.id = id;
            }
            records.push(footprint);
        }

        Ok(Self { records })
    }

    pub fn from_records(records: Vec<Footprint>) -> Self {
        Self { records }
    }

    /// Last footprint produced by `pass`
    pub fn last_from_pass(&self, pass: &str) -> Option<&Footprint> {
        self.records
            .iter()
            .rev()
            .find(|f| f.from_pass.as_deref() == Some(pass))
    }

    /// Graph path of the last footprint produced by `pass`
    pub fn output_of(&self, pass: &str) -> Result<PathBuf> {
        self.last_from_pass(pass)
            .ok_or_else(|| OliveError::NoMatchingFootprint(pass.to_string()))?
            .model_path()
    }

    pub fn records(&self) -> &[Footprint] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
