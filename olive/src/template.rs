//! Olive workflow templates
//!
//! Templates are plain Olive workflow JSON files. String values may contain
//! `{{name}}` placeholders; a string that is exactly one placeholder takes the
//! variable's JSON type (so `"{{batch_size}}"` becomes a number).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{OliveError, Result};

/// Values substituted into `{{name}}` placeholders
pub type TemplateVars = BTreeMap<String, Value>;

/// A rendered workflow ready to be patched and run
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    name: String,
    source: PathBuf,
    document: Value,
}

impl Workflow {
    /// Load `path`, render placeholders from `vars`
    pub fn from_template(name: &str, path: &Path, vars: &TemplateVars) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| OliveError::Template {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut document: Value = serde_json::from_str(&content).map_err(|e| OliveError::Template {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if !document.is_object() {
            return Err(OliveError::Template {
                path: path.to_path_buf(),
                message: "workflow must be a JSON object".into(),
            });
        }

        render(&mut document, vars)?;
        log::debug!("Rendered workflow template {}", path.display());

        Ok(Self {
            name: name.to_string(),
            source: path.to_path_buf(),
            document,
        })
    }

    pub fn from_value(name: &str, document: Value) -> Self {
        Self {
            name: name.to_string(),
            source: PathBuf::new(),
            document,
        }
    }

    /// Sub-component this workflow produces
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Set the value at a dotted key path. Every parent must already be an
    /// object; only the last key may be created.
    pub fn set(&mut self, path: &[&str], value: Value) -> Result<()> {
        set_at(&mut self.document, path, value)
    }

    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.document, |node, key| node.get(*key))
    }

    /// `engine.output_dir`
    pub fn output_dir(&self) -> Option<PathBuf> {
        self.get(&["engine", "output_dir"])
            .and_then(Value::as_str)
            .map(PathBuf::from)
    }

    /// `engine.output_name`, defaulting to the workflow name
    pub fn output_name(&self) -> String {
        self.get(&["engine", "output_name"])
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.name.clone())
    }

    /// First entry of `engine.execution_providers`
    pub fn execution_provider(&self) -> Option<&str> {
        self.get(&["engine", "execution_providers"])
            .and_then(Value::as_array)
            .and_then(|eps| eps.first())
            .and_then(Value::as_str)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }
}

/// Set `root[path[0]][path[1]]...` to `value`
pub fn set_at(root: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    for (depth, key) in parents.iter().enumerate() {
        node = node
            .get_mut(*key)
            .filter(|v| v.is_object())
            .ok_or_else(|| OliveError::MissingField(path[..=depth].join(".")))?;
    }

    match node.as_object_mut() {
        Some(map) => {
            map.insert((*last).to_string(), value);
            Ok(())
        }
        None => Err(OliveError::MissingField(parents.join("."))),
    }
}

fn render(node: &mut Value, vars: &TemplateVars) -> Result<()> {
    match node {
        Value::String(s) => {
            if let Some(replacement) = render_string(s, vars)? {
                *node = replacement;
            }
        }
        Value::Array(items) => {
            for item in items {
                render(item, vars)?;
            }
        }
        Value::Object(map) => {
            for value in map.values_mut() {
                render(value, vars)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// `None` when the string has no placeholders
fn render_string(s: &str, vars: &TemplateVars) -> Result<Option<Value>> {
    if !s.contains("{{") {
        return Ok(None);
    }

    let lookup = |name: &str| {
        vars.get(name.trim())
            .ok_or_else(|| OliveError::UnknownVariable(name.trim().to_string()))
    };

    // Whole-string placeholder keeps the variable's type
    if let Some(inner) = s.strip_prefix("{{").and_then(|r| r.strip_suffix("}}")) {
        if !inner.contains("{{") && !inner.contains("}}") {
            return Ok(Some(lookup(inner)?.clone()));
        }
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| OliveError::UnknownVariable(after.to_string()))?;
        match lookup(&after[..end])? {
            Value::String(v) => out.push_str(v),
            other => out.push_str(&other.to_string()),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(Some(Value::String(out)))
}
