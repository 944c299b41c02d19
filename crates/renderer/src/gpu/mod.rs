//! GPU side of the preview window.
//!
//! - `context` owns wgpu instance/device/surface wiring and rebuilds the
//!   swapchain when the window resizes.
//! - `geometry` tessellates the preview surfaces and uploads them.
//! - `pipeline` links wrapped GLSL into render pipelines.
//! - `textures` uploads decoded texture parameters and caches them by id.
//! - `uniforms` holds the camera block shared by every program.
//! - `state` glues everything together behind `GpuState::render`.

mod context;
mod geometry;
mod pipeline;
mod state;
mod textures;
mod uniforms;

pub(crate) use state::GpuState;
