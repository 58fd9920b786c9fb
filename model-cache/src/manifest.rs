//! `model_index.json`: the map from sub-component name to the library/class
//! pair that builds it, plus literal constructor arguments and `_`-prefixed
//! metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ModelCacheError, Result};

/// File name of a pipeline manifest inside a model directory
pub const MODEL_INDEX: &str = "model_index.json";

/// Manifest key holding the pipeline class name
pub const CLASS_NAME_KEY: &str = "_class_name";

/// A `[library, class]` pair naming how a sub-component is built
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentRef {
    pub library: String,
    pub class: String,
}

impl ComponentRef {
    pub fn new(library: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            class: class.into(),
        }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.library, self.class)
    }
}

/// One manifest entry
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestValue {
    Reference(ComponentRef),
    /// Plain constructor argument (`requires_safety_checker`, `config`, ...)
    Literal(Value),
    /// Component explicitly switched off; written as `[null, null]`
    Disabled,
}

impl ManifestValue {
    /// Classify a raw JSON value. `Err` carries the reason the entry is unusable.
    fn from_json(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Array(pair) if pair.len() == 2 && pair.iter().all(|v| v.is_string() || v.is_null()) => {
                match (&pair[0], &pair[1]) {
                    (Value::String(library), Value::String(class)) => {
                        Ok(Self::Reference(ComponentRef::new(library.as_str(), class.as_str())))
                    }
                    (library, class) => {
                        Err(format!("reference has a null member: [{library}, {class}]"))
                    }
                }
            }
            other => Ok(Self::Literal(other)),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Reference(r) => Value::Array(vec![
                Value::String(r.library.clone()),
                Value::String(r.class.clone()),
            ]),
            Self::Literal(v) => v.clone(),
            Self::Disabled => Value::Array(vec![Value::Null, Value::Null]),
        }
    }

    pub fn as_reference(&self) -> Option<&ComponentRef> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }
}

/// An entry dropped while reading a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub key: String,
    pub reason: String,
}

/// Result of reading a manifest: the usable entries and what was dropped
#[derive(Debug, Clone, Default)]
pub struct ManifestLoad {
    pub manifest: ModelManifest,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelManifest {
    entries: BTreeMap<String, ManifestValue>,
    metadata: Map<String, Value>,
}

impl ModelManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `model_index.json` from a model directory or an explicit file path
    pub fn load(path: impl AsRef<Path>) -> Result<ManifestLoad> {
        let path = Self::index_path(path.as_ref());
        let content = fs::read_to_string(&path)?;
        let value: Value = serde_json::from_str(&content)?;
        if !value.is_object() {
            return Err(ModelCacheError::Manifest(format!(
                "{} is not a JSON object",
                path.display()
            )));
        }

        let load = Self::from_partials([value]);
        for skipped in &load.skipped {
            log::debug!(
                "Skipping {} while loading manifest '{}': {}",
                skipped.key,
                path.display(),
                skipped.reason
            );
        }
        Ok(load)
    }

    /// Merge partial mappings in order; later keys overwrite earlier ones
    ///
    /// Never fails: non-object partials and unusable entries end up in
    /// `skipped`.
    pub fn from_partials(partials: impl IntoIterator<Item = Value>) -> ManifestLoad {
        let mut merged = Map::new();
        let mut skipped = Vec::new();

        for (i, partial) in partials.into_iter().enumerate() {
            match partial {
                Value::Object(map) => merged.extend(map),
                other => skipped.push(SkippedEntry {
                    key: format!("<partial {i}>"),
                    reason: format!("expected a JSON object, found {other}"),
                }),
            }
        }

        let mut manifest = Self::new();
        for (key, value) in merged {
            if key.starts_with('_') {
                manifest.metadata.insert(key, value);
                continue;
            }
            match ManifestValue::from_json(value) {
                Ok(v) => {
                    manifest.entries.insert(key, v);
                }
                Err(reason) => skipped.push(SkippedEntry { key, reason }),
            }
        }

        ManifestLoad { manifest, skipped }
    }

    pub fn to_json(&self) -> Value {
        let mut map = self.metadata.clone();
        for (key, value) in &self.entries {
            map.insert(key.clone(), value.to_json());
        }
        Value::Object(map)
    }

    /// Write as pretty JSON to a model directory or an explicit file path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = Self::index_path(path.as_ref());
        let json = serde_json::to_string_pretty(&self.to_json())?;
        fs::write(&path, json)?;
        Ok(path)
    }

    /// Copy every key of `other` that `self` lacks, unchanged
    pub fn merge_missing(&mut self, other: &ModelManifest) {
        for (key, value) in &other.entries {
            self.entries.entry(key.clone()).or_insert_with(|| value.clone());
        }
        for (key, value) in &other.metadata {
            if !self.metadata.contains_key(key) {
                self.metadata.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        self.metadata.get(CLASS_NAME_KEY).and_then(Value::as_str)
    }

    pub fn set_class_name(&mut self, class_name: &str) {
        self.metadata
            .insert(CLASS_NAME_KEY.to_string(), Value::String(class_name.to_string()));
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ManifestValue> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ManifestValue) -> Option<ManifestValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<ManifestValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ManifestValue)> {
        self.entries.iter()
    }

    /// Entries that name a component to build
    pub fn references(&self) -> impl Iterator<Item = (&str, &ComponentRef)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_reference().map(|r| (k.as_str(), r)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn index_path(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join(MODEL_INDEX)
        } else {
            path.to_path_buf()
        }
    }
}
