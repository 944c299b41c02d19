//! Defines the `shader.toml` schema shared by the embedded catalog and
//! on-disk descriptor packs, so both paths produce identical
//! `ShaderDescriptor`s.
//!
//! Types:
//!
//! - `DescriptorManifest` captures display metadata, the source file names,
//!   and the ordered `[[params]]` table.
//! - `ParamEntry` is one row of that table exactly as written in TOML.
//!
//! Functions:
//!
//! - `DescriptorManifest::validate` returns human-readable issues so loaders
//!   can report every problem in a pack at once instead of failing on the
//!   first.
//! - `DescriptorManifest::into_descriptor` pairs the manifest with resolved
//!   GLSL text and builds the immutable descriptor.
use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::descriptor::{DescriptorError, ParameterSpec, ShaderDescriptor};
use crate::value::{ParameterKind, ParameterValue};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DescriptorManifest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Vertex source; the shared surface vertex shader when absent.
    #[serde(default)]
    pub vertex: Option<PathBuf>,
    #[serde(default = "default_fragment")]
    pub fragment: PathBuf,
    #[serde(default)]
    pub params: Vec<ParamEntry>,
}

fn default_fragment() -> PathBuf {
    PathBuf::from("fragment.glsl")
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ParamEntry {
    pub key: String,
    pub kind: ParameterKind,
    #[serde(default)]
    pub default: Option<ParameterValue>,
    #[serde(default)]
    pub min: Option<f32>,
    #[serde(default)]
    pub max: Option<f32>,
    #[serde(default)]
    pub step: Option<f32>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
}

impl ParamEntry {
    fn resolved_default(&self) -> ParameterValue {
        match (&self.default, self.kind) {
            (Some(value), ParameterKind::Boolean) => match value {
                ParameterValue::Scalar(v) => ParameterValue::Boolean(*v != 0.0),
                other => other.clone(),
            },
            (Some(value), _) => value.clone(),
            (None, ParameterKind::Texture) => ParameterValue::Empty,
            (None, ParameterKind::Scalar) => ParameterValue::Scalar(self.min.unwrap_or(0.0)),
            (None, ParameterKind::Boolean) => ParameterValue::Boolean(false),
            (None, ParameterKind::Color) => ParameterValue::Color("#ffffff".to_string()),
            (None, ParameterKind::Vector2) => ParameterValue::Vector2([0.0; 2]),
            (None, ParameterKind::Vector3) => ParameterValue::Vector3([0.0; 3]),
        }
    }

    fn to_spec(&self) -> ParameterSpec {
        ParameterSpec {
            key: self.key.clone(),
            kind: self.kind,
            default: self.resolved_default(),
            min: self.min,
            max: self.max,
            step: self.step,
            label: self.label.clone(),
            folder: self.folder.clone(),
        }
    }
}

impl DescriptorManifest {
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.name.trim().is_empty() {
            issues.push("manifest name must not be empty".to_string());
        }
        let mut seen = HashSet::new();
        for entry in &self.params {
            if entry.key.trim().is_empty() {
                issues.push("parameter with empty key".to_string());
                continue;
            }
            if !seen.insert(entry.key.as_str()) {
                issues.push(format!("parameter '{}' is declared more than once", entry.key));
            }
            let default = entry.resolved_default();
            if !default.matches_kind(entry.kind) {
                issues.push(format!(
                    "parameter '{}' default {} does not match kind {}",
                    entry.key, default, entry.kind
                ));
            }
            let has_bounds = entry.min.is_some() || entry.max.is_some() || entry.step.is_some();
            if has_bounds && entry.kind != ParameterKind::Scalar {
                issues.push(format!(
                    "parameter '{}' declares min/max/step but is {}",
                    entry.key, entry.kind
                ));
            }
            if let (Some(min), Some(max)) = (entry.min, entry.max) {
                if min > max {
                    issues.push(format!("parameter '{}' has min > max", entry.key));
                }
            }
            if let Some(step) = entry.step {
                if step <= 0.0 {
                    issues.push(format!("parameter '{}' step must be positive", entry.key));
                }
            }
        }
        issues
    }

    pub fn into_descriptor(
        self,
        id: &str,
        vertex_source: String,
        fragment_source: String,
    ) -> Result<ShaderDescriptor, DescriptorError> {
        let params = self.params.iter().map(ParamEntry::to_spec).collect();
        ShaderDescriptor::new(
            id,
            self.name,
            self.description.unwrap_or_default(),
            vertex_source,
            fragment_source,
            params,
        )
    }
}
