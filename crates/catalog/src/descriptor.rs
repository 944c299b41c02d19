//! Immutable shader descriptors and their parameter tables.
//!
//! A `ShaderDescriptor` is built once (from an embedded or on-disk manifest)
//! and then shared behind `Arc` by the store, the control panel, and the
//! material synchronizer. Construction validates the parameter table and runs
//! the uniform scan, so capability flags are cached with the descriptor and
//! never recomputed per frame.
use std::collections::HashSet;

use crate::glsl::{scan_uniforms, Capabilities};
use crate::value::{ParameterKind, ParameterValue, ParameterValueMap};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DescriptorError {
    #[error("descriptor id must not be empty")]
    EmptyId,
    #[error("parameter key '{0}' is declared more than once")]
    DuplicateKey(String),
    #[error("parameter '{key}' default does not match kind {kind}")]
    DefaultMismatch { key: String, kind: ParameterKind },
    #[error("parameter '{0}' declares bounds but is not a scalar")]
    BoundsOnNonScalar(String),
    #[error("parameter '{0}' has min greater than max")]
    InvertedRange(String),
}

/// One entry in a descriptor's parameter table.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub key: String,
    pub kind: ParameterKind,
    pub default: ParameterValue,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub step: Option<f32>,
    pub label: Option<String>,
    /// Optional sub-group inside the shader's control group.
    pub folder: Option<String>,
}

impl ParameterSpec {
    pub fn new(key: impl Into<String>, kind: ParameterKind, default: ParameterValue) -> Self {
        Self {
            key: key.into(),
            kind,
            default,
            min: None,
            max: None,
            step: None,
            label: None,
            folder: None,
        }
    }

    pub fn scalar(key: impl Into<String>, default: f32) -> Self {
        Self::new(key, ParameterKind::Scalar, ParameterValue::Scalar(default))
    }

    pub fn with_range(mut self, min: f32, max: f32, step: Option<f32>) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self.step = step;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Scalars declared with `min = 0, max = 1, step = 1` surface as toggles.
    pub fn is_boolean_surfaced(&self) -> bool {
        self.kind == ParameterKind::Scalar
            && self.min == Some(0.0)
            && self.max == Some(1.0)
            && self.step == Some(1.0)
    }

    /// Label shown by control surfaces: the declared label, else the key
    /// with its first `u` dropped (`uAngle` reads as `Angle`).
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self.key.replacen('u', "", 1),
        }
    }
}

/// Static declaration of one shader: sources plus an ordered parameter table.
#[derive(Debug, Clone)]
pub struct ShaderDescriptor {
    id: String,
    name: String,
    description: String,
    vertex_source: String,
    fragment_source: String,
    params: Vec<ParameterSpec>,
    capabilities: Capabilities,
}

impl ShaderDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        vertex_source: impl Into<String>,
        fragment_source: impl Into<String>,
        params: Vec<ParameterSpec>,
    ) -> Result<Self, DescriptorError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DescriptorError::EmptyId);
        }

        let mut seen = HashSet::new();
        for spec in &params {
            if !seen.insert(spec.key.as_str()) {
                return Err(DescriptorError::DuplicateKey(spec.key.clone()));
            }
            if !spec.default.matches_kind(spec.kind) {
                return Err(DescriptorError::DefaultMismatch {
                    key: spec.key.clone(),
                    kind: spec.kind,
                });
            }
            let has_bounds = spec.min.is_some() || spec.max.is_some() || spec.step.is_some();
            if has_bounds && spec.kind != ParameterKind::Scalar {
                return Err(DescriptorError::BoundsOnNonScalar(spec.key.clone()));
            }
            if let (Some(min), Some(max)) = (spec.min, spec.max) {
                if min > max {
                    return Err(DescriptorError::InvertedRange(spec.key.clone()));
                }
            }
        }

        let vertex_source = vertex_source.into();
        let fragment_source = fragment_source.into();
        let capabilities = Capabilities::detect(
            &scan_uniforms(&vertex_source),
            &scan_uniforms(&fragment_source),
        );

        Ok(Self {
            id,
            name: name.into(),
            description: description.into(),
            vertex_source,
            fragment_source,
            params,
            capabilities,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|spec| spec.key == key)
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn needs_pointer(&self) -> bool {
        self.capabilities.uses_pointer
    }

    /// Fresh value map holding every declared key at its default.
    pub fn default_values(&self) -> ParameterValueMap {
        self.params
            .iter()
            .map(|spec| (spec.key.clone(), spec.default.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = "uniform float uAngle;\nuniform vec2 uMouse;\nvoid main() {}\n";

    fn angle() -> ParameterSpec {
        ParameterSpec::scalar("uAngle", 45.0).with_range(0.0, 360.0, Some(1.0))
    }

    #[test]
    fn defaults_cover_every_key() {
        let descriptor =
            ShaderDescriptor::new("grad", "Gradient", "", "", FRAGMENT, vec![angle()]).unwrap();
        let values = descriptor.default_values();
        assert_eq!(values.len(), 1);
        assert_eq!(values["uAngle"], ParameterValue::Scalar(45.0));
        assert!(descriptor.needs_pointer());
    }

    #[test]
    fn rejects_duplicate_keys() {
        let err = ShaderDescriptor::new("grad", "Gradient", "", "", "", vec![angle(), angle()])
            .unwrap_err();
        assert_eq!(err, DescriptorError::DuplicateKey("uAngle".into()));
    }

    #[test]
    fn rejects_mismatched_default() {
        let spec = ParameterSpec::new("uTint", ParameterKind::Color, ParameterValue::Scalar(1.0));
        let err = ShaderDescriptor::new("tint", "Tint", "", "", "", vec![spec]).unwrap_err();
        assert!(matches!(err, DescriptorError::DefaultMismatch { .. }));
    }

    #[test]
    fn rejects_bounds_on_colors() {
        let mut spec =
            ParameterSpec::new("uTint", ParameterKind::Color, ParameterValue::Color("#fff".into()));
        spec.min = Some(0.0);
        let err = ShaderDescriptor::new("tint", "Tint", "", "", "", vec![spec]).unwrap_err();
        assert_eq!(err, DescriptorError::BoundsOnNonScalar("uTint".into()));
    }

    #[test]
    fn boolean_surfaced_scalar_detection() {
        let toggle = ParameterSpec::scalar("uAnimated", 0.0).with_range(0.0, 1.0, Some(1.0));
        assert!(toggle.is_boolean_surfaced());
        assert!(!angle().is_boolean_surfaced());
    }

    #[test]
    fn label_falls_back_to_key() {
        assert_eq!(angle().display_label(), "Angle");
        assert_eq!(angle().with_label("Tilt").display_label(), "Tilt");
    }
}
