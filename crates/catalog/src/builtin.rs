use tracing::warn;

use crate::descriptor::ShaderDescriptor;
use crate::manifest::DescriptorManifest;

/// Shared vertex shader used by every descriptor that does not ship its own.
pub const SURFACE_VERTEX: &str = include_str!("../shaders/common/vertex.glsl");

struct Embedded {
    id: &'static str,
    manifest: &'static str,
    fragment: &'static str,
}

const EMBEDDED: &[Embedded] = &[
    Embedded {
        id: "gradient",
        manifest: include_str!("../shaders/gradient/shader.toml"),
        fragment: include_str!("../shaders/gradient/fragment.glsl"),
    },
    Embedded {
        id: "ripple",
        manifest: include_str!("../shaders/ripple/shader.toml"),
        fragment: include_str!("../shaders/ripple/fragment.glsl"),
    },
    Embedded {
        id: "plasma",
        manifest: include_str!("../shaders/plasma/shader.toml"),
        fragment: include_str!("../shaders/plasma/fragment.glsl"),
    },
    Embedded {
        id: "texture-fx",
        manifest: include_str!("../shaders/texture-fx/shader.toml"),
        fragment: include_str!("../shaders/texture-fx/fragment.glsl"),
    },
    Embedded {
        id: "julia",
        manifest: include_str!("../shaders/julia/shader.toml"),
        fragment: include_str!("../shaders/julia/fragment.glsl"),
    },
];

/// Descriptors compiled into the binary, in catalog order.
///
/// An embedded manifest that fails to load is logged and skipped; the unit
/// tests below keep that from shipping.
pub fn builtin_descriptors() -> Vec<ShaderDescriptor> {
    EMBEDDED
        .iter()
        .filter_map(|embedded| match load_embedded(embedded) {
            Ok(descriptor) => Some(descriptor),
            Err(err) => {
                warn!(shader = embedded.id, error = %err, "skipping built-in descriptor");
                None
            }
        })
        .collect()
}

fn load_embedded(embedded: &Embedded) -> anyhow::Result<ShaderDescriptor> {
    let manifest = DescriptorManifest::from_toml_str(embedded.manifest)?;
    let issues = manifest.validate();
    if !issues.is_empty() {
        anyhow::bail!("manifest validation failed: {issues:?}");
    }
    Ok(manifest.into_descriptor(
        embedded.id,
        SURFACE_VERTEX.to_string(),
        embedded.fragment.to_string(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParameterKind, TIME_UNIFORM};

    #[test]
    fn every_embedded_descriptor_loads() {
        for embedded in EMBEDDED {
            load_embedded(embedded)
                .unwrap_or_else(|err| panic!("{} failed to load: {err}", embedded.id));
        }
        assert_eq!(builtin_descriptors().len(), EMBEDDED.len());
    }

    #[test]
    fn only_ripple_needs_pointer() {
        let pointer_aware: Vec<_> = builtin_descriptors()
            .into_iter()
            .filter(|descriptor| descriptor.needs_pointer())
            .map(|descriptor| descriptor.id().to_string())
            .collect();
        assert_eq!(pointer_aware, vec!["ripple".to_string()]);
    }

    #[test]
    fn every_declared_param_has_a_uniform() {
        for descriptor in builtin_descriptors() {
            for spec in descriptor.params() {
                assert!(
                    descriptor.capabilities().uniform(&spec.key).is_some(),
                    "{} declares {} without a uniform",
                    descriptor.id(),
                    spec.key
                );
            }
            assert!(descriptor.capabilities().uses_time || descriptor.param(TIME_UNIFORM).is_none());
        }
    }

    #[test]
    fn catalog_covers_every_kind() {
        let descriptors = builtin_descriptors();
        for kind in [
            ParameterKind::Scalar,
            ParameterKind::Boolean,
            ParameterKind::Color,
            ParameterKind::Vector2,
            ParameterKind::Vector3,
            ParameterKind::Texture,
        ] {
            assert!(
                descriptors
                    .iter()
                    .any(|d| d.params().iter().any(|spec| spec.kind == kind)),
                "no built-in uses {kind}"
            );
        }
    }
}
