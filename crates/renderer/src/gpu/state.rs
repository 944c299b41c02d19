use anyhow::Result;
use engine::{Camera, GeometryKind, MaterialFrame, ProgramHandle, TextureHandle};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::compile::{
    fallback_program, wrap_program, WrappedProgram, PARAMS_BINDING, SCENE_BINDING,
};
use crate::layout::ProgramLayout;
use crate::types::{Antialiasing, ColorSpaceMode};

use super::context::{GpuContext, DEPTH_FORMAT};
use super::geometry::GpuMesh;
use super::pipeline::{MaterialPipeline, PipelineLayouts};
use super::textures::TextureCache;
use super::uniforms::SceneUniforms;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.04,
    g: 0.04,
    b: 0.05,
    a: 1.0,
};

/// Pipeline built for one program generation, with the buffers and bind
/// groups its layout needs.
struct ActiveMaterial {
    shader_id: String,
    generation: u64,
    layout: ProgramLayout,
    pipeline: MaterialPipeline,
    params_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_bind_group: Option<wgpu::BindGroup>,
    bound_textures: Vec<Option<u64>>,
}

/// Depth buffer plus the optional MSAA color target, sized to the surface.
struct FrameTargets {
    depth_view: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
}

impl FrameTargets {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        sample_count: u32,
    ) -> Self {
        let extent = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth target"),
            size: extent,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let msaa_view = (sample_count > 1).then(|| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("msaa color target"),
                    size: extent,
                    mip_level_count: 1,
                    sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });
        Self {
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            msaa_view,
        }
    }
}

/// Owns every GPU resource of the preview: surface, meshes, the fallback
/// pipeline and the pipeline of the active program.
pub(crate) struct GpuState {
    context: GpuContext,
    layouts: PipelineLayouts,
    scene_buffer: wgpu::Buffer,
    fallback: ActiveMaterial,
    material: Option<ActiveMaterial>,
    /// Generation whose program failed to build; not retried until it changes.
    failed_generation: Option<u64>,
    textures: TextureCache,
    mesh: GpuMesh,
    targets: FrameTargets,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
        color_space: ColorSpaceMode,
        geometry: GeometryKind,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size, antialiasing, color_space)?;
        let layouts = PipelineLayouts::new(&context.device);
        let scene_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let fallback = build_material(
            &context,
            &layouts,
            &scene_buffer,
            "fallback",
            0,
            ProgramLayout::default(),
            &fallback_program(),
        )?;
        let textures = TextureCache::new(&context.device, &context.queue, context.color_space);
        let mesh = GpuMesh::new(&context.device, geometry);
        let targets = FrameTargets::new(
            &context.device,
            context.surface_format,
            context.size,
            context.sample_count,
        );
        tracing::info!(
            adapter = %context.adapter_name,
            samples = context.sample_count,
            format = ?context.surface_format,
            "renderer ready"
        );

        Ok(Self {
            context,
            layouts,
            scene_buffer,
            fallback,
            material: None,
            failed_generation: None,
            textures,
            mesh,
            targets,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.targets = FrameTargets::new(
            &self.context.device,
            self.context.surface_format,
            self.context.size,
            self.context.sample_count,
        );
    }

    /// Draws `geometry` with the program described by `frame`.
    ///
    /// A relink (or a generation the current pipeline was not built for)
    /// rebuilds the pipeline. When that fails the fallback program draws
    /// until the store moves to another generation.
    pub(crate) fn render(
        &mut self,
        frame: MaterialFrame<'_>,
        geometry: GeometryKind,
        camera: &Camera,
    ) -> Result<(), wgpu::SurfaceError> {
        if self.mesh.kind != geometry {
            self.mesh = GpuMesh::new(&self.context.device, geometry);
        }

        let program = match frame {
            MaterialFrame::Program { program, relink } => {
                self.sync_program(program, relink);
                Some(program)
            }
            MaterialFrame::Fallback => None,
        };

        let surface_texture = self.context.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let scene = SceneUniforms::from_camera(camera);
        self.context
            .queue
            .write_buffer(&self.scene_buffer, 0, bytemuck::bytes_of(&scene));

        let use_program = program.is_some() && self.material.is_some();
        if let (Some(program), Some(material)) = (program, self.material.as_mut()) {
            let bytes = material.layout.pack(program.uniforms());
            self.context
                .queue
                .write_buffer(&material.params_buffer, 0, &bytes);
            refresh_textures(&self.context, &mut self.textures, material, program);
        }

        let material = match self.material.as_ref() {
            Some(material) if use_program => material,
            _ => &self.fallback,
        };

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });
        {
            let (attachment_view, resolve_target) = match self.targets.msaa_view.as_ref() {
                Some(msaa) => (msaa, Some(&view)),
                None => (&view, None),
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment_view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&material.pipeline.pipeline);
            render_pass.set_bind_group(0, &material.uniform_bind_group, &[]);
            if let Some(textures) = material.texture_bind_group.as_ref() {
                render_pass.set_bind_group(1, textures, &[]);
            }
            render_pass.set_vertex_buffer(0, self.mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..self.mesh.index_count, 0, 0..1);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    fn sync_program(&mut self, program: &ProgramHandle, relink: bool) {
        let current = self
            .material
            .as_ref()
            .map(|material| (material.shader_id.as_str(), material.generation));
        let up_to_date = current == Some((program.shader_id(), program.generation()));
        if up_to_date && !relink {
            return;
        }
        if self.failed_generation == Some(program.generation()) && !relink {
            return;
        }

        let layout = ProgramLayout::from_table(program.uniforms());
        let wrapped = wrap_program(program.vertex_source(), program.fragment_source(), &layout);
        match build_material(
            &self.context,
            &self.layouts,
            &self.scene_buffer,
            program.shader_id(),
            program.generation(),
            layout,
            &wrapped,
        ) {
            Ok(material) => {
                tracing::info!(
                    shader = %program.shader_id(),
                    generation = program.generation(),
                    samplers = material.pipeline.sampler_count,
                    "linked shader program"
                );
                self.material = Some(material);
                self.failed_generation = None;
            }
            Err(err) => {
                tracing::error!(
                    shader = %program.shader_id(),
                    generation = program.generation(),
                    "{err:#}; drawing fallback"
                );
                self.material = None;
                self.failed_generation = Some(program.generation());
            }
        }
    }
}

fn build_material(
    context: &GpuContext,
    layouts: &PipelineLayouts,
    scene_buffer: &wgpu::Buffer,
    shader_id: &str,
    generation: u64,
    layout: ProgramLayout,
    wrapped: &WrappedProgram,
) -> Result<ActiveMaterial> {
    let pipeline = MaterialPipeline::new(
        &context.device,
        layouts,
        &format!("{shader_id} pipeline"),
        wrapped,
        layout.samplers().len(),
        context.surface_format,
        context.sample_count,
    )?;
    let params_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("parameter uniforms"),
        size: u64::from(layout.size()),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let uniform_bind_group = context
        .device
        .create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: &layouts.uniform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: SCENE_BINDING,
                    resource: scene_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: PARAMS_BINDING,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });
    let texture_bind_group = (layout.samplers().is_empty()).then(|| {
        context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("empty texture bind group"),
                layout: &pipeline.texture_layout,
                entries: &[],
            })
    });

    Ok(ActiveMaterial {
        shader_id: shader_id.to_string(),
        generation,
        layout,
        pipeline,
        params_buffer,
        uniform_bind_group,
        texture_bind_group,
        bound_textures: Vec::new(),
    })
}

/// Rebuilds the texture bind group when the set of bound handles changed.
fn refresh_textures(
    context: &GpuContext,
    cache: &mut TextureCache,
    material: &mut ActiveMaterial,
    program: &ProgramHandle,
) {
    let sampler_count = material.layout.samplers().len();
    if sampler_count == 0 {
        return;
    }

    let handles: Vec<Option<&TextureHandle>> = material
        .layout
        .samplers()
        .iter()
        .map(|name| {
            program
                .uniforms()
                .textures()
                .find(|(slot, _)| *slot == name.as_str())
                .and_then(|(_, handle)| handle)
        })
        .collect();
    let ids: Vec<Option<u64>> = handles
        .iter()
        .map(|handle| handle.map(TextureHandle::id))
        .collect();
    if material.texture_bind_group.is_some() && ids == material.bound_textures {
        return;
    }

    for handle in handles.iter().flatten() {
        cache.prepare(&context.device, &context.queue, handle);
    }
    let live: Vec<u64> = ids.iter().flatten().copied().collect();
    cache.retain(&live);

    let mut entries = Vec::with_capacity(sampler_count * 2);
    for (index, handle) in handles.iter().enumerate() {
        let resource = cache.get(*handle);
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2,
            resource: wgpu::BindingResource::TextureView(&resource.view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2 + 1,
            resource: wgpu::BindingResource::Sampler(&resource.sampler),
        });
    }
    material.texture_bind_group = Some(context.device.create_bind_group(
        &wgpu::BindGroupDescriptor {
            label: Some("texture bind group"),
            layout: &material.pipeline.texture_layout,
            entries: &entries,
        },
    ));
    tracing::debug!(
        shader = %material.shader_id,
        bound = live.len(),
        resident = cache.len(),
        "rebound textures"
    );
    material.bound_textures = ids;
}
