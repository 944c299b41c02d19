mod builtin;
mod coerce;
mod descriptor;
mod glsl;
mod manifest;
mod pack;
mod registry;
mod value;

pub use builtin::{builtin_descriptors, SURFACE_VERTEX};
pub use coerce::{
    control_for, hex_to_linear_rgb, parse_hex_color, reflect_value, srgb_to_linear, to_uniform,
    value_from_control, ControlKind, ControlValue, UniformValue,
};
pub use descriptor::{DescriptorError, ParameterSpec, ShaderDescriptor};
pub use glsl::{scan_uniforms, Capabilities, GlslType, UniformDecl};
pub use manifest::{DescriptorManifest, ParamEntry};
pub use pack::{LocalPack, PackError};
pub use registry::{Catalog, CatalogEntry};
pub use value::{ParameterKind, ParameterValue, ParameterValueMap};

/// Uniform driven by the animation clock; never surfaced as a control.
pub const TIME_UNIFORM: &str = "uTime";
/// Pointer position in surface uv space. Its declaration marks a shader as pointer-aware.
pub const POINTER_POSITION_UNIFORM: &str = "uMouse";
/// Smoothed pointer velocity in uv units per second.
pub const POINTER_VELOCITY_UNIFORM: &str = "uMouseVelocity";
/// Pointer press flag written as 0.0 or 1.0.
pub const POINTER_PRESSED_UNIFORM: &str = "uMouseDown";

/// Returns true for uniform names the engine drives itself.
pub fn is_reserved_uniform(name: &str) -> bool {
    matches!(
        name,
        TIME_UNIFORM | POINTER_POSITION_UNIFORM | POINTER_VELOCITY_UNIFORM | POINTER_PRESSED_UNIFORM
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_names_cover_driver_uniforms() {
        assert!(is_reserved_uniform("uTime"));
        assert!(is_reserved_uniform("uMouseDown"));
        assert!(!is_reserved_uniform("uAngle"));
    }
}
