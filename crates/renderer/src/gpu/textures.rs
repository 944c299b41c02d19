use std::collections::HashMap;

use engine::TextureHandle;
use wgpu::util::{DeviceExt, TextureDataOrder};

use super::context::SurfaceColorSpace;

pub(crate) struct TextureResource {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

/// GPU copies of decoded textures, keyed by handle id.
///
/// Unbound samplers read a 1x1 placeholder. Uploads that no current binding
/// references are dropped by `retain`.
pub(crate) struct TextureCache {
    color_space: SurfaceColorSpace,
    placeholder: TextureResource,
    uploads: HashMap<u64, TextureResource>,
}

impl TextureCache {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_space: SurfaceColorSpace,
    ) -> Self {
        let placeholder = upload_rgba(
            device,
            queue,
            "placeholder texture",
            1,
            1,
            &[255, 255, 255, 255],
            color_space,
        );
        Self {
            color_space,
            placeholder,
            uploads: HashMap::new(),
        }
    }

    /// Uploads `handle` unless it is already resident. Returns false when the
    /// payload cannot be uploaded; `get` then serves the placeholder.
    pub(crate) fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        handle: &TextureHandle,
    ) -> bool {
        if self.uploads.contains_key(&handle.id()) {
            return true;
        }
        let image = handle.image();
        if image.width == 0
            || image.height == 0
            || image.pixels.len() != (image.width * image.height * 4) as usize
        {
            tracing::warn!(
                source = handle.source(),
                width = image.width,
                height = image.height,
                "texture payload has unexpected size; using placeholder"
            );
            return false;
        }
        tracing::debug!(
            id = handle.id(),
            source = handle.source(),
            width = image.width,
            height = image.height,
            "uploading texture"
        );
        let resource = upload_rgba(
            device,
            queue,
            &format!("texture #{} ({})", handle.id(), handle.source()),
            image.width,
            image.height,
            &image.pixels,
            self.color_space,
        );
        self.uploads.insert(handle.id(), resource);
        true
    }

    /// Resource for an optional binding; unbound or missing uploads read the
    /// placeholder.
    pub(crate) fn get(&self, handle: Option<&TextureHandle>) -> &TextureResource {
        handle
            .and_then(|handle| self.uploads.get(&handle.id()))
            .unwrap_or(&self.placeholder)
    }

    /// Drops uploads whose id is not in `live`.
    pub(crate) fn retain(&mut self, live: &[u64]) {
        self.uploads.retain(|id, _| live.contains(id));
    }

    pub(crate) fn len(&self) -> usize {
        self.uploads.len()
    }
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    rgba: &[u8],
    color_space: SurfaceColorSpace,
) -> TextureResource {
    let texture_format = match color_space {
        SurfaceColorSpace::Gamma => wgpu::TextureFormat::Rgba8Unorm,
        SurfaceColorSpace::Linear => wgpu::TextureFormat::Rgba8UnormSrgb,
    };
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        rgba,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    TextureResource {
        _texture: texture,
        view,
        sampler,
    }
}
