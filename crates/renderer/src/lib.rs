//! Preview renderer for the shaderlab playground.
//!
//! The crate turns the engine's per-frame `MaterialFrame` into pixels:
//!
//! ```text
//!   Playground::frame ──▶ MaterialFrame ──▶ GpuState::render
//!                               │                  │
//!                               │                  ├─▶ wrap_program + pipeline (on new generation)
//!                               │                  ├─▶ ProgramLayout::pack ─▶ params UBO
//!                               │                  └─▶ TextureCache ─▶ sampler bind group
//!                               └─▶ Fallback ─────────▶ built-in lit program
//! ```
//!
//! `run_window` owns the winit loop and feeds pointer and resize events back
//! into the playground. Catalog shaders are written in WebGL-style GLSL; the
//! `compile` module rewrites them into Vulkan GLSL with explicit bindings so
//! naga can ingest them.

mod compile;
mod gpu;
mod layout;
mod runtime;
mod types;
mod window;

pub use layout::{BlockMember, ProgramLayout};
pub use runtime::{FrameScheduler, FrameStats};
pub use types::{Antialiasing, ColorSpaceMode, RendererConfig};
pub use window::{run_window, WindowCommand, WindowControl};
