//! The single coercion table shared by control surfaces and the GPU upload path.
//!
//! Every representation change a parameter value goes through lives here:
//!
//! - `control_for` picks the control a surface renders for a spec.
//! - `value_from_control` turns a control edit into a stored value.
//! - `reflect_value` turns a stored value back into a control display value.
//! - `to_uniform` turns a stored value into the numeric payload written into
//!   a uniform slot.
//!
//! Keeping both directions in one place guarantees the panel and the
//! synchronizer agree on what `true` or `"#ff6b6b"` means.
use crate::descriptor::ParameterSpec;
use crate::value::{ParameterKind, ParameterValue};

/// Control rendered for a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    Toggle,
    Slider {
        min: f32,
        max: f32,
        step: Option<f32>,
    },
    ColorPicker,
    NumberTuple {
        len: usize,
    },
    FilePicker,
}

/// Value shown by, or received from, a control.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlValue {
    Toggle(bool),
    Number(f32),
    Color(String),
    Tuple(Vec<f32>),
    /// Path of the picked file, `None` when cleared.
    File(Option<String>),
}

/// Numeric payload for one uniform slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
}

pub fn control_for(spec: &ParameterSpec) -> ControlKind {
    match spec.kind {
        ParameterKind::Scalar if spec.is_boolean_surfaced() => ControlKind::Toggle,
        ParameterKind::Scalar => ControlKind::Slider {
            min: spec.min.unwrap_or(0.0),
            max: spec.max.unwrap_or(1.0),
            step: spec.step,
        },
        ParameterKind::Boolean => ControlKind::Toggle,
        ParameterKind::Color => ControlKind::ColorPicker,
        ParameterKind::Vector2 => ControlKind::NumberTuple { len: 2 },
        ParameterKind::Vector3 => ControlKind::NumberTuple { len: 3 },
        ParameterKind::Texture => ControlKind::FilePicker,
    }
}

/// Converts a control edit into the value stored for `spec`.
///
/// Returns `None` when the input does not fit the parameter, and always for
/// textures, whose values arrive through the asynchronous decode path.
/// Numeric inputs are passed through without range clamping.
pub fn value_from_control(spec: &ParameterSpec, input: &ControlValue) -> Option<ParameterValue> {
    match (spec.kind, input) {
        (ParameterKind::Scalar, ControlValue::Toggle(on)) if spec.is_boolean_surfaced() => {
            Some(ParameterValue::Scalar(if *on { 1.0 } else { 0.0 }))
        }
        (ParameterKind::Scalar, ControlValue::Number(value)) => Some(ParameterValue::Scalar(*value)),
        (ParameterKind::Boolean, ControlValue::Toggle(on)) => Some(ParameterValue::Boolean(*on)),
        (ParameterKind::Color, ControlValue::Color(hex)) => Some(ParameterValue::Color(hex.clone())),
        (ParameterKind::Vector2, ControlValue::Tuple(items)) if items.len() == 2 => {
            Some(ParameterValue::Vector2([items[0], items[1]]))
        }
        (ParameterKind::Vector3, ControlValue::Tuple(items)) if items.len() == 3 => {
            Some(ParameterValue::Vector3([items[0], items[1], items[2]]))
        }
        _ => None,
    }
}

/// Converts a stored value into what the control for `spec` displays.
pub fn reflect_value(spec: &ParameterSpec, value: &ParameterValue) -> Option<ControlValue> {
    match (spec.kind, value) {
        (ParameterKind::Scalar, ParameterValue::Scalar(v)) if spec.is_boolean_surfaced() => {
            Some(ControlValue::Toggle(*v != 0.0))
        }
        (ParameterKind::Scalar, ParameterValue::Scalar(v)) => Some(ControlValue::Number(*v)),
        (ParameterKind::Boolean, ParameterValue::Boolean(on)) => Some(ControlValue::Toggle(*on)),
        (ParameterKind::Color, ParameterValue::Color(hex)) => Some(ControlValue::Color(hex.clone())),
        (ParameterKind::Vector2, ParameterValue::Vector2(v)) => Some(ControlValue::Tuple(v.to_vec())),
        (ParameterKind::Vector3, ParameterValue::Vector3(v)) => Some(ControlValue::Tuple(v.to_vec())),
        (ParameterKind::Texture, _) => Some(ControlValue::File(None)),
        _ => None,
    }
}

/// Converts a stored value into the uniform payload for `kind`.
///
/// Colors become linear RGB, booleans become 0/1, vectors become fixed
/// tuples. Textures and mismatched shapes yield `None` and are skipped by
/// the caller.
pub fn to_uniform(kind: ParameterKind, value: &ParameterValue) -> Option<UniformValue> {
    match (kind, value) {
        (ParameterKind::Scalar, ParameterValue::Scalar(v)) => Some(UniformValue::Float(*v)),
        (ParameterKind::Scalar | ParameterKind::Boolean, ParameterValue::Boolean(on)) => {
            Some(UniformValue::Float(if *on { 1.0 } else { 0.0 }))
        }
        (ParameterKind::Boolean, ParameterValue::Scalar(v)) => {
            Some(UniformValue::Float(if *v != 0.0 { 1.0 } else { 0.0 }))
        }
        (ParameterKind::Color, ParameterValue::Color(hex)) => {
            hex_to_linear_rgb(hex).map(UniformValue::Vec3)
        }
        (ParameterKind::Vector2, ParameterValue::Vector2(v)) => Some(UniformValue::Vec2(*v)),
        (ParameterKind::Vector3, ParameterValue::Vector3(v)) => Some(UniformValue::Vec3(*v)),
        _ => None,
    }
}

/// Parses `#rgb` or `#rrggbb` (leading `#` optional) into sRGB components in `[0, 1]`.
pub fn parse_hex_color(raw: &str) -> Option<[f32; 3]> {
    let hex = raw.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |text: &str| u8::from_str_radix(text, 16).ok();
    let bytes = match hex.len() {
        3 => {
            let mut out = [0u8; 3];
            for (slot, ch) in out.iter_mut().zip(hex.chars()) {
                let nibble = ch.to_digit(16)? as u8;
                *slot = nibble * 17;
            }
            out
        }
        6 => [channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?],
        _ => return None,
    };
    Some(bytes.map(|byte| f32::from(byte) / 255.0))
}

/// sRGB transfer function inverse for a single channel.
pub fn srgb_to_linear(channel: f32) -> f32 {
    if channel <= 0.04045 {
        channel / 12.92
    } else {
        ((channel + 0.055) / 1.055).powf(2.4)
    }
}

pub fn hex_to_linear_rgb(raw: &str) -> Option<[f32; 3]> {
    parse_hex_color(raw).map(|rgb| rgb.map(srgb_to_linear))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggle_spec() -> ParameterSpec {
        ParameterSpec::scalar("uAnimated", 0.0).with_range(0.0, 1.0, Some(1.0))
    }

    #[test]
    fn boolean_surfaced_scalar_uses_toggle() {
        let spec = toggle_spec();
        assert_eq!(control_for(&spec), ControlKind::Toggle);
        assert_eq!(
            value_from_control(&spec, &ControlValue::Toggle(true)),
            Some(ParameterValue::Scalar(1.0))
        );
        assert_eq!(
            value_from_control(&spec, &ControlValue::Toggle(false)),
            Some(ParameterValue::Scalar(0.0))
        );
        assert_eq!(
            reflect_value(&spec, &ParameterValue::Scalar(1.0)),
            Some(ControlValue::Toggle(true))
        );
    }

    #[test]
    fn general_scalar_uses_slider_without_clamping() {
        let spec = ParameterSpec::scalar("uAngle", 45.0).with_range(0.0, 360.0, Some(1.0));
        assert_eq!(
            control_for(&spec),
            ControlKind::Slider {
                min: 0.0,
                max: 360.0,
                step: Some(1.0)
            }
        );
        assert_eq!(
            value_from_control(&spec, &ControlValue::Number(720.0)),
            Some(ParameterValue::Scalar(720.0))
        );
    }

    #[test]
    fn booleans_upload_as_numbers() {
        assert_eq!(
            to_uniform(ParameterKind::Boolean, &ParameterValue::Boolean(true)),
            Some(UniformValue::Float(1.0))
        );
        assert_eq!(
            to_uniform(ParameterKind::Boolean, &ParameterValue::Boolean(false)),
            Some(UniformValue::Float(0.0))
        );
        assert_eq!(
            to_uniform(ParameterKind::Scalar, &ParameterValue::Scalar(1.0)),
            Some(UniformValue::Float(1.0))
        );
    }

    #[test]
    fn colors_upload_as_linear_rgb() {
        let Some(UniformValue::Vec3(white)) =
            to_uniform(ParameterKind::Color, &ParameterValue::Color("#ffffff".into()))
        else {
            panic!("expected vec3");
        };
        assert!(white.iter().all(|c| (c - 1.0).abs() < 1e-6));

        let Some(UniformValue::Vec3(rgb)) =
            to_uniform(ParameterKind::Color, &ParameterValue::Color("#808080".into()))
        else {
            panic!("expected vec3");
        };
        assert!((rgb[0] - 0.215_861).abs() < 1e-4);
    }

    #[test]
    fn textures_are_never_uniform_payloads() {
        assert_eq!(to_uniform(ParameterKind::Texture, &ParameterValue::Empty), None);
        let spec = ParameterSpec::new("uTexture", ParameterKind::Texture, ParameterValue::Empty);
        assert_eq!(
            value_from_control(&spec, &ControlValue::File(Some("a.png".into()))),
            None
        );
    }

    #[test]
    fn hex_parsing_accepts_short_and_long_forms() {
        assert_eq!(parse_hex_color("#fff"), Some([1.0, 1.0, 1.0]));
        assert_eq!(parse_hex_color("000000"), Some([0.0, 0.0, 0.0]));
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#gggggg"), None);
    }

    #[test]
    fn vector_tuples_must_match_length() {
        let spec = ParameterSpec::new(
            "uCenter",
            ParameterKind::Vector2,
            ParameterValue::Vector2([0.0, 0.0]),
        );
        assert_eq!(
            value_from_control(&spec, &ControlValue::Tuple(vec![0.5, 0.25])),
            Some(ParameterValue::Vector2([0.5, 0.25]))
        );
        assert_eq!(
            value_from_control(&spec, &ControlValue::Tuple(vec![0.5])),
            None
        );
    }
}
