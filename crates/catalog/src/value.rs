use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of a shader parameter.
///
/// The kind decides both the control a surface renders and how the value is
/// coerced before it reaches a uniform slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Scalar,
    Boolean,
    Color,
    Vector2,
    Vector3,
    Texture,
}

impl ParameterKind {
    /// GLSL type used when the parameter is written out as a uniform declaration.
    pub fn glsl_type(self) -> &'static str {
        match self {
            ParameterKind::Scalar | ParameterKind::Boolean => "float",
            ParameterKind::Color | ParameterKind::Vector3 => "vec3",
            ParameterKind::Vector2 => "vec2",
            ParameterKind::Texture => "sampler2D",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParameterKind::Scalar => "scalar",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Color => "color",
            ParameterKind::Vector2 => "vector2",
            ParameterKind::Vector3 => "vector3",
            ParameterKind::Texture => "texture",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live parameter value as stored, persisted, and exported.
///
/// Serialized untagged so presets and settings exports read as plain JSON
/// (`45`, `true`, `"#ff6b6b"`, `[0.3, 0.3]`, `null`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Boolean(bool),
    Scalar(f32),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Color(String),
    Empty,
}

impl ParameterValue {
    /// True when the value has the shape `kind` expects.
    pub fn matches_kind(&self, kind: ParameterKind) -> bool {
        matches!(
            (kind, self),
            (ParameterKind::Scalar, ParameterValue::Scalar(_))
                | (ParameterKind::Boolean, ParameterValue::Boolean(_))
                | (ParameterKind::Color, ParameterValue::Color(_))
                | (ParameterKind::Vector2, ParameterValue::Vector2(_))
                | (ParameterKind::Vector3, ParameterValue::Vector3(_))
                | (ParameterKind::Texture, ParameterValue::Empty)
        )
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            ParameterValue::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Boolean(value) => write!(f, "{value}"),
            ParameterValue::Scalar(value) => write!(f, "{value}"),
            ParameterValue::Vector2([x, y]) => write!(f, "{x},{y}"),
            ParameterValue::Vector3([x, y, z]) => write!(f, "{x},{y},{z}"),
            ParameterValue::Color(hex) => f.write_str(hex),
            ParameterValue::Empty => f.write_str("null"),
        }
    }
}

/// Current values keyed by parameter key.
pub type ParameterValueMap = BTreeMap<String, ParameterValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_json_shapes() {
        let parsed: Vec<ParameterValue> =
            serde_json::from_str(r##"[45, true, "#ff6b6b", [0.3, 0.3], [1, 2, 3], null]"##)
                .unwrap();
        assert_eq!(
            parsed,
            vec![
                ParameterValue::Scalar(45.0),
                ParameterValue::Boolean(true),
                ParameterValue::Color("#ff6b6b".into()),
                ParameterValue::Vector2([0.3, 0.3]),
                ParameterValue::Vector3([1.0, 2.0, 3.0]),
                ParameterValue::Empty,
            ]
        );
    }

    #[test]
    fn kind_matching() {
        assert!(ParameterValue::Scalar(1.0).matches_kind(ParameterKind::Scalar));
        assert!(!ParameterValue::Scalar(1.0).matches_kind(ParameterKind::Boolean));
        assert!(ParameterValue::Empty.matches_kind(ParameterKind::Texture));
    }

    #[test]
    fn glsl_types_follow_kind() {
        assert_eq!(ParameterKind::Color.glsl_type(), "vec3");
        assert_eq!(ParameterKind::Texture.glsl_type(), "sampler2D");
        assert_eq!(ParameterKind::Boolean.glsl_type(), "float");
    }
}
