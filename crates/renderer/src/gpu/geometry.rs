//! Procedural meshes for the preview surfaces.
//!
//! Sizes and tessellation match the playground's scene: a 3x3 plane facing
//! the camera, a sphere of radius 1.5, a torus with radius 1 and tube 0.4,
//! and a 2x2x2 box. All meshes are indexed triangle lists with position,
//! normal, and uv attributes.
use std::f32::consts::{PI, TAU};

use bytemuck::{Pod, Zeroable};
use engine::{GeometryKind, PLANE_SIZE};
use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::compile::{NORMAL_LOCATION, POSITION_LOCATION, UV_LOCATION};

const PLANE_SEGMENTS: u32 = 64;
const SPHERE_RADIUS: f32 = 1.5;
const SPHERE_SEGMENTS: u32 = 64;
const TORUS_RADIUS: f32 = 1.0;
const TORUS_TUBE: f32 = 0.4;
const TORUS_RADIAL_SEGMENTS: u32 = 32;
const TORUS_TUBULAR_SEGMENTS: u32 = 100;
const BOX_SIZE: f32 = 2.0;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x3,
            offset: 0,
            shader_location: POSITION_LOCATION,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x3,
            offset: 12,
            shader_location: NORMAL_LOCATION,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 24,
            shader_location: UV_LOCATION,
        },
    ];

    pub(crate) fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    fn new(position: Vec3, normal: Vec3, uv: [f32; 2]) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub(crate) fn build(kind: GeometryKind) -> Self {
        match kind {
            GeometryKind::Plane => plane(PLANE_SIZE, PLANE_SEGMENTS),
            GeometryKind::Sphere => sphere(SPHERE_RADIUS, SPHERE_SEGMENTS, SPHERE_SEGMENTS),
            GeometryKind::Torus => torus(
                TORUS_RADIUS,
                TORUS_TUBE,
                TORUS_RADIAL_SEGMENTS,
                TORUS_TUBULAR_SEGMENTS,
            ),
            GeometryKind::Box => cube(BOX_SIZE),
        }
    }

    /// Appends the two triangles of the quad `a b c d` (counter-clockwise).
    fn quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.indices.extend_from_slice(&[a, b, d, b, c, d]);
    }
}

/// Grid in the `z = 0` plane; uv `(0, 0)` is the bottom-left corner.
fn plane(size: f32, segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let row = segments + 1;
    for iy in 0..=segments {
        let v = iy as f32 / segments as f32;
        for ix in 0..=segments {
            let u = ix as f32 / segments as f32;
            mesh.vertices.push(Vertex::new(
                Vec3::new((u - 0.5) * size, (v - 0.5) * size, 0.0),
                Vec3::Z,
                [u, v],
            ));
        }
    }
    for iy in 0..segments {
        for ix in 0..segments {
            let a = iy * row + ix;
            mesh.quad(a, a + 1, a + row + 1, a + row);
        }
    }
    mesh
}

fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let row = width_segments + 1;
    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let normal = Vec3::new(
                -(u * TAU).cos() * (v * PI).sin(),
                (v * PI).cos(),
                (u * TAU).sin() * (v * PI).sin(),
            );
            mesh.vertices
                .push(Vertex::new(normal * radius, normal, [u, 1.0 - v]));
        }
    }
    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;
            if iy != 0 {
                mesh.indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                mesh.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    mesh
}

fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let row = tubular_segments + 1;
    for j in 0..=radial_segments {
        let v = j as f32 / radial_segments as f32 * TAU;
        for i in 0..=tubular_segments {
            let u = i as f32 / tubular_segments as f32 * TAU;
            let position = Vec3::new(
                (radius + tube * v.cos()) * u.cos(),
                (radius + tube * v.cos()) * u.sin(),
                tube * v.sin(),
            );
            let center = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
            mesh.vertices.push(Vertex::new(
                position,
                (position - center).normalize_or_zero(),
                [
                    i as f32 / tubular_segments as f32,
                    j as f32 / radial_segments as f32,
                ],
            ));
        }
    }
    for j in 1..=radial_segments {
        for i in 1..=tubular_segments {
            let a = row * j + i - 1;
            let b = row * (j - 1) + i - 1;
            let c = row * (j - 1) + i;
            let d = row * j + i;
            mesh.indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }
    mesh
}

fn cube(size: f32) -> MeshData {
    let half = size * 0.5;
    // (normal, u axis, v axis) per face; the u x v = normal keeps winding outward.
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    let mut mesh = MeshData::default();
    for (normal, u_axis, v_axis) in faces {
        let base = mesh.vertices.len() as u32;
        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let position =
                (normal + u_axis * (u * 2.0 - 1.0) + v_axis * (v * 2.0 - 1.0)) * half;
            mesh.vertices.push(Vertex::new(position, normal, [u, v]));
        }
        mesh.quad(base, base + 1, base + 2, base + 3);
    }
    mesh
}

/// Mesh uploaded to vertex and index buffers.
pub(crate) struct GpuMesh {
    pub kind: GeometryKind,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub(crate) fn new(device: &wgpu::Device, kind: GeometryKind) -> Self {
        let data = MeshData::build(kind);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} vertices", kind.as_str())),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} indices", kind.as_str())),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        tracing::debug!(
            geometry = kind.as_str(),
            vertices = data.vertices.len(),
            triangles = data.indices.len() / 3,
            "uploaded mesh"
        );
        Self {
            kind,
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
        }
    }
}
