use std::borrow::Cow;

use catalog::{GlslType, SURFACE_VERTEX};
use wgpu::naga::ShaderStage;

use crate::layout::{block_type, ProgramLayout, PADDING_MEMBER};

/// Vertex attribute locations shared with the mesh vertex buffer layout.
pub(crate) const POSITION_LOCATION: u32 = 0;
pub(crate) const NORMAL_LOCATION: u32 = 1;
pub(crate) const UV_LOCATION: u32 = 2;

/// Bind group slots used by every wrapped program.
pub(crate) const SCENE_BINDING: u32 = 0;
pub(crate) const PARAMS_BINDING: u32 = 1;

/// Flat-shaded program drawn while the active shader is unknown or failed
/// to compile.
const FALLBACK_FRAGMENT: &str = r"varying vec3 vNormal;

void main() {
    vec3 light = normalize(vec3(0.4, 0.8, 0.6));
    float shade = 0.35 + 0.65 * max(dot(normalize(vNormal), light), 0.0);
    gl_FragColor = vec4(vec3(0.55, 0.57, 0.62) * shade, 1.0);
}
";

/// Vulkan-flavoured GLSL ready for naga's frontend.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WrappedProgram {
    pub vertex: String,
    pub fragment: String,
}

/// Turns WebGL-style sources into a pair of `#version 450` shaders.
///
/// Steps performed on both stages:
///
/// 1. Blank out `#version`, `precision` and `uniform` lines so line numbers
///    still match the original source.
/// 2. Prepend the scene block, the parameter block described by `layout`,
///    the texture bindings, and macros mapping each original uniform name
///    onto its block member.
/// 3. Rewrite `varying` declarations into located `out`/`in` variables;
///    locations follow the vertex stage's declaration order.
///
/// An empty vertex source selects the shared surface vertex shader.
pub(crate) fn wrap_program(vertex: &str, fragment: &str, layout: &ProgramLayout) -> WrappedProgram {
    let vertex = if vertex.trim().is_empty() {
        SURFACE_VERTEX
    } else {
        vertex
    };
    let varyings = collect_varyings(vertex);
    let prelude = uniform_prelude(layout);

    let vertex_body = rewrite_body(vertex, Stage::Vertex, &varyings);
    let fragment_body = rewrite_body(fragment, Stage::Fragment, &varyings);

    WrappedProgram {
        vertex: format!("{VERTEX_HEADER}{prelude}#line 1\n{vertex_body}"),
        fragment: format!("{FRAGMENT_HEADER}{prelude}#line 1\n{fragment_body}"),
    }
}

pub(crate) fn fallback_program() -> WrappedProgram {
    wrap_program(SURFACE_VERTEX, FALLBACK_FRAGMENT, &ProgramLayout::default())
}

pub(crate) fn compile_module(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    stage: ShaderStage,
) -> wgpu::ShaderModule {
    tracing::trace!(label, "compiling wrapped GLSL:\n{source}");
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_owned()),
            stage,
            defines: &[],
        },
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    Vertex,
    Fragment,
}

/// `(type, name)` of every varying the vertex stage declares, in order.
fn collect_varyings(vertex: &str) -> Vec<(String, String)> {
    vertex
        .lines()
        .filter_map(parse_varying)
        .flatten()
        .collect()
}

fn parse_varying(line: &str) -> Option<Vec<(String, String)>> {
    let declaration = line.trim().strip_prefix("varying ")?;
    let declaration = declaration.split(';').next()?;
    let mut tokens = declaration
        .split_whitespace()
        .filter(|token| !matches!(*token, "lowp" | "mediump" | "highp" | "flat" | "smooth"));
    let ty = tokens.next()?.to_string();
    let names: Vec<String> = tokens
        .collect::<Vec<_>>()
        .join(" ")
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    Some(names.into_iter().map(|name| (ty.clone(), name)).collect())
}

fn rewrite_body(source: &str, stage: Stage, varyings: &[(String, String)]) -> String {
    let mut body = String::with_capacity(source.len() + 256);
    let mut extra_location = varyings.len();
    for line in source.lines() {
        let trimmed = line.trim_start();
        let skip = trimmed.starts_with("#version")
            || trimmed.starts_with("precision ")
            || is_uniform_declaration(trimmed)
            || (stage == Stage::Vertex && trimmed.starts_with("attribute "));
        if skip {
            body.push('\n');
            continue;
        }

        if let Some(declared) = parse_varying(trimmed) {
            let direction = match stage {
                Stage::Vertex => "out",
                Stage::Fragment => "in",
            };
            let mut rewritten = Vec::with_capacity(declared.len());
            for (ty, name) in declared {
                let location = match varyings.iter().position(|(_, known)| *known == name) {
                    Some(index) => index,
                    None => {
                        extra_location += 1;
                        extra_location - 1
                    }
                };
                rewritten.push(format!(
                    "layout(location = {location}) {direction} {ty} {name};"
                ));
            }
            body.push_str(&rewritten.join(" "));
            body.push('\n');
            continue;
        }

        body.push_str(line);
        body.push('\n');
    }
    body
}

fn is_uniform_declaration(trimmed: &str) -> bool {
    trimmed.starts_with("uniform ")
        || (trimmed.starts_with("layout") && trimmed.contains(" uniform "))
}

fn uniform_prelude(layout: &ProgramLayout) -> String {
    let mut prelude = String::from(SCENE_BLOCK);

    prelude.push_str(&format!(
        "layout(std140, set = 0, binding = {PARAMS_BINDING}) uniform ShaderlabParams {{\n"
    ));
    if layout.members().is_empty() {
        prelude.push_str(&format!("    float {PADDING_MEMBER};\n"));
    }
    for member in layout.members() {
        prelude.push_str(&format!("    {} _{};\n", block_type(member.ty), member.name));
    }
    prelude.push_str("} shaderlab_params;\n");
    for member in layout.members() {
        let name = &member.name;
        if member.ty == GlslType::Bool {
            prelude.push_str(&format!("#define {name} (shaderlab_params._{name} > 0.5)\n"));
        } else {
            prelude.push_str(&format!("#define {name} shaderlab_params._{name}\n"));
        }
    }

    for (index, name) in layout.samplers().iter().enumerate() {
        let texture_binding = index * 2;
        let sampler_binding = index * 2 + 1;
        prelude.push_str(&format!(
            "layout(set = 1, binding = {texture_binding}) uniform texture2D shaderlab_{name}_texture;\n\
             layout(set = 1, binding = {sampler_binding}) uniform sampler shaderlab_{name}_sampler;\n\
             #define {name} sampler2D(shaderlab_{name}_texture, shaderlab_{name}_sampler)\n"
        ));
    }
    prelude.push_str("#define texture2D texture\n");
    prelude
}

const VERTEX_HEADER: &str = r"#version 450
layout(location = 0) in vec3 position;
layout(location = 1) in vec3 normal;
layout(location = 2) in vec2 uv;
";

const FRAGMENT_HEADER: &str = r"#version 450
layout(location = 0) out vec4 shaderlab_FragColor;
#define gl_FragColor shaderlab_FragColor
";

/// Layout must match `SceneUniforms` in `gpu/uniforms.rs`.
const SCENE_BLOCK: &str = r"layout(std140, set = 0, binding = 0) uniform ShaderlabScene {
    mat4 _projectionMatrix;
    mat4 _modelViewMatrix;
    mat4 _modelMatrix;
    mat4 _viewMatrix;
    mat4 _normalMatrix;
    vec4 _cameraPosition;
} shaderlab_scene;
#define projectionMatrix shaderlab_scene._projectionMatrix
#define modelViewMatrix shaderlab_scene._modelViewMatrix
#define modelMatrix shaderlab_scene._modelMatrix
#define viewMatrix shaderlab_scene._viewMatrix
#define normalMatrix mat3(shaderlab_scene._normalMatrix)
#define cameraPosition shaderlab_scene._cameraPosition.xyz
";
