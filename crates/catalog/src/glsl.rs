//! Lightweight scan of GLSL source for top-level `uniform` declarations.
//!
//! This is not a parser. It strips comments, splits statements on `;`, and
//! reads the type and names following each `uniform` keyword. Interface
//! blocks and arrays are skipped; the built-in shaders and the manifest
//! format only declare plain uniforms.
use std::fmt;

use crate::{POINTER_POSITION_UNIFORM, TIME_UNIFORM};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlslType {
    Float,
    Int,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Sampler2D,
}

impl GlslType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "float" => Some(Self::Float),
            "int" => Some(Self::Int),
            "bool" => Some(Self::Bool),
            "vec2" => Some(Self::Vec2),
            "vec3" => Some(Self::Vec3),
            "vec4" => Some(Self::Vec4),
            "sampler2D" => Some(Self::Sampler2D),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Sampler2D => "sampler2D",
        }
    }

    pub fn is_sampler(self) -> bool {
        matches!(self, Self::Sampler2D)
    }
}

impl fmt::Display for GlslType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: String,
    pub ty: GlslType,
}

/// Returns the uniforms declared in `source`, in declaration order.
pub fn scan_uniforms(source: &str) -> Vec<UniformDecl> {
    let stripped = strip_comments(source);
    let mut uniforms = Vec::new();
    for statement in stripped.split(';') {
        let statement = match statement.rfind(['{', '}']) {
            Some(index) => &statement[index + 1..],
            None => statement,
        };
        let statement: String = statement
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n");
        let tokens: Vec<&str> = statement.split_whitespace().collect();
        let Some(index) = tokens.iter().position(|token| *token == "uniform") else {
            continue;
        };
        // Only a layout qualifier may precede the keyword.
        if index > 0 && !tokens[0].starts_with("layout") {
            continue;
        }
        let mut tokens = tokens[index + 1..].iter().copied();

        let mut ty = None;
        for token in tokens.by_ref() {
            if matches!(token, "lowp" | "mediump" | "highp") {
                continue;
            }
            ty = GlslType::from_token(token);
            break;
        }
        let Some(ty) = ty else {
            continue;
        };

        let rest: Vec<&str> = tokens.collect();
        let names = rest.join(" ");
        if names.contains('[') || names.contains('{') {
            continue;
        }
        for name in names.split(',') {
            let name = name.split('=').next().unwrap_or_default().trim();
            if is_identifier(name) {
                uniforms.push(UniformDecl {
                    name: name.to_string(),
                    ty,
                });
            }
        }
    }
    uniforms
}

/// Capability flags derived from a descriptor's sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub uses_time: bool,
    pub uses_pointer: bool,
    /// Union of vertex and fragment uniforms, vertex first, deduplicated by name.
    pub uniforms: Vec<UniformDecl>,
}

impl Capabilities {
    pub fn detect(vertex: &[UniformDecl], fragment: &[UniformDecl]) -> Self {
        let mut uniforms: Vec<UniformDecl> = Vec::new();
        for decl in vertex.iter().chain(fragment) {
            if uniforms.iter().all(|existing| existing.name != decl.name) {
                uniforms.push(decl.clone());
            }
        }
        let uses_time = uniforms.iter().any(|decl| decl.name == TIME_UNIFORM);
        let uses_pointer = fragment
            .iter()
            .any(|decl| decl.name == POINTER_POSITION_UNIFORM);
        Self {
            uses_time,
            uses_pointer,
            uniforms,
        }
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformDecl> {
        self.uniforms.iter().find(|decl| decl.name == name)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '/' {
            match chars.peek() {
                Some('/') => {
                    for next in chars.by_ref() {
                        if next == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    chars.next();
                    let mut previous = '\0';
                    for next in chars.by_ref() {
                        if previous == '*' && next == '/' {
                            break;
                        }
                        previous = next;
                    }
                    out.push(' ');
                    continue;
                }
                _ => {}
            }
        }
        out.push(ch);
    }
    out
}
