use anyhow::{anyhow, bail, Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::TextureFormatFeatureFlags;
use winit::dpi::PhysicalSize;

use crate::types::{Antialiasing, ColorSpaceMode};

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Highest MSAA sample count `Antialiasing::Auto` will pick.
const AUTO_SAMPLE_CAP: u32 = 4;

/// Encoding of the swapchain; decides sRGB vs. unorm texture uploads too.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SurfaceColorSpace {
    Gamma,
    Linear,
}

impl From<ColorSpaceMode> for SurfaceColorSpace {
    fn from(mode: ColorSpaceMode) -> Self {
        match mode {
            ColorSpaceMode::Auto | ColorSpaceMode::Gamma => SurfaceColorSpace::Gamma,
            ColorSpaceMode::Linear => SurfaceColorSpace::Linear,
        }
    }
}

/// Device, queue and configured surface for the preview window.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub sample_count: u32,
    pub surface_format: wgpu::TextureFormat,
    pub color_space: SurfaceColorSpace,
    pub adapter_name: String,
}

impl GpuContext {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
        color_space: ColorSpaceMode,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });
        let surface = create_surface(&instance, target)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no GPU adapter can present to the preview window")?;
        let info = adapter.get_info();
        let software = info.device_type == wgpu::DeviceType::Cpu;
        tracing::debug!(
            name = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            "picked adapter"
        );

        let limits = adapter.limits();
        let size = PhysicalSize::new(initial_size.width.max(1), initial_size.height.max(1));
        let max_side = limits.max_texture_dimension_2d;
        if size.width > max_side || size.height > max_side {
            bail!(
                "window of {}x{} exceeds the adapter's {max_side}px texture limit",
                size.width,
                size.height
            );
        }

        let caps = surface.get_capabilities(&adapter);
        let color_space = SurfaceColorSpace::from(color_space);
        let surface_format = choose_surface_format(&caps, color_space)?;
        let sample_count = if software {
            if antialiasing != Antialiasing::Off {
                tracing::warn!("software adapter; rendering without MSAA");
            }
            1
        } else {
            let format_flags = adapter.get_texture_format_features(surface_format).flags;
            let depth_flags = adapter.get_texture_format_features(DEPTH_FORMAT).flags;
            select_sample_count(format_flags, depth_flags, antialiasing)
        };

        let required_features = if sample_count > AUTO_SAMPLE_CAP {
            wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES
        } else {
            wgpu::Features::empty()
        };
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("shaderlab device"),
            required_features,
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to open the GPU device")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: choose_present_mode(&caps),
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        tracing::debug!(
            format = ?surface_format,
            present_mode = ?config.present_mode,
            sample_count,
            "surface configured"
        );

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            size,
            sample_count,
            surface_format,
            color_space,
            adapter_name: info.name,
        })
    }

    /// Reconfigures the swapchain; zero-sized (minimised) windows are ignored.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }
}

fn create_surface<T>(instance: &wgpu::Instance, target: &T) -> Result<wgpu::Surface<'static>>
where
    T: HasDisplayHandle + HasWindowHandle,
{
    let window = target
        .window_handle()
        .map_err(|err| anyhow!("window handle unavailable: {err}"))?;
    let display = target
        .display_handle()
        .map_err(|err| anyhow!("display handle unavailable: {err}"))?;
    // The window outlives the surface: both are owned by the event loop closure.
    unsafe {
        instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
            raw_display_handle: display.as_raw(),
            raw_window_handle: window.as_raw(),
        })
    }
    .context("failed to create the preview surface")
}

/// Prefers an sRGB swapchain for linear output and a unorm one otherwise,
/// settling for the first reported format.
fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    color_space: SurfaceColorSpace,
) -> Result<wgpu::TextureFormat> {
    let wants_srgb = color_space == SurfaceColorSpace::Linear;
    if let Some(format) = caps.formats.iter().copied().find(|f| f.is_srgb() == wants_srgb) {
        return Ok(format);
    }
    let Some(&first) = caps.formats.first() else {
        bail!("the surface reports no usable formats");
    };
    tracing::warn!(?first, wants_srgb, "no matching surface format; colors may be off");
    Ok(first)
}

fn choose_present_mode(caps: &wgpu::SurfaceCapabilities) -> wgpu::PresentMode {
    if caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
        wgpu::PresentMode::Fifo
    } else {
        caps.present_modes
            .first()
            .copied()
            .unwrap_or(wgpu::PresentMode::Fifo)
    }
}

/// Sample count usable for both the color target and the depth buffer.
fn select_sample_count(
    format_flags: TextureFormatFeatureFlags,
    depth_flags: TextureFormatFeatureFlags,
    antialiasing: Antialiasing,
) -> u32 {
    if !format_flags.contains(TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE) {
        if antialiasing != Antialiasing::Off {
            tracing::debug!("surface format cannot resolve MSAA; using 1 sample");
        }
        return 1;
    }
    let depth_counts = depth_flags.supported_sample_counts();
    let usable: Vec<u32> = format_flags
        .supported_sample_counts()
        .into_iter()
        .filter(|count| depth_counts.contains(count))
        .collect();
    let best_up_to = |limit: u32| {
        usable
            .iter()
            .copied()
            .filter(|&count| count <= limit)
            .max()
            .unwrap_or(1)
    };

    match antialiasing {
        Antialiasing::Off => 1,
        Antialiasing::Auto => best_up_to(AUTO_SAMPLE_CAP),
        Antialiasing::Samples(requested) if usable.contains(&requested) => requested,
        Antialiasing::Samples(requested) => {
            let chosen = best_up_to(requested);
            tracing::warn!(requested, chosen, ?usable, "MSAA sample count unsupported");
            chosen
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msaa_flags() -> TextureFormatFeatureFlags {
        TextureFormatFeatureFlags::MULTISAMPLE_X2
            | TextureFormatFeatureFlags::MULTISAMPLE_X4
            | TextureFormatFeatureFlags::MULTISAMPLE_X8
            | TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE
    }

    #[test]
    fn auto_caps_at_four_samples() {
        let count = select_sample_count(msaa_flags(), msaa_flags(), Antialiasing::Auto);
        assert_eq!(count, 4);
    }

    #[test]
    fn depth_support_limits_the_choice() {
        let depth = TextureFormatFeatureFlags::MULTISAMPLE_X2;
        assert_eq!(select_sample_count(msaa_flags(), depth, Antialiasing::Samples(8)), 2);
        assert_eq!(select_sample_count(msaa_flags(), depth, Antialiasing::Auto), 2);
    }

    #[test]
    fn missing_resolve_disables_msaa() {
        let flags = TextureFormatFeatureFlags::MULTISAMPLE_X4;
        assert_eq!(select_sample_count(flags, flags, Antialiasing::Samples(4)), 1);
        assert_eq!(select_sample_count(msaa_flags(), msaa_flags(), Antialiasing::Off), 1);
    }

    #[test]
    fn linear_output_maps_to_srgb_swapchain() {
        assert_eq!(
            SurfaceColorSpace::from(ColorSpaceMode::Linear),
            SurfaceColorSpace::Linear
        );
        assert_eq!(
            SurfaceColorSpace::from(ColorSpaceMode::Auto),
            SurfaceColorSpace::Gamma
        );
    }
}
