use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use engine::{Playground, PresetStorage};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use tracing::{debug, error, info, warn};

use crate::gpu::GpuState;
use crate::runtime::{FrameScheduler, FrameStats};
use crate::types::RendererConfig;

/// Messages other threads can post into the window's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCommand {
    /// Request a redraw, e.g. after a control event was queued.
    Wake,
    Quit,
}

/// Cloneable handle used to reach a running preview window.
#[derive(Clone)]
pub struct WindowControl {
    proxy: EventLoopProxy<WindowCommand>,
}

impl WindowControl {
    /// Returns false once the event loop has exited.
    pub fn wake(&self) -> bool {
        self.proxy.send_event(WindowCommand::Wake).is_ok()
    }

    pub fn quit(&self) -> bool {
        self.proxy.send_event(WindowCommand::Quit).is_ok()
    }
}

/// Window, GPU state, and the playground it renders.
struct PreviewWindow<S: PresetStorage> {
    window: Arc<Window>,
    gpu: GpuState,
    playground: Playground<S>,
    scheduler: FrameScheduler,
    stats: FrameStats,
    config: RendererConfig,
    shown_shader: Option<String>,
}

impl<S: PresetStorage> PreviewWindow<S> {
    fn new(window: Arc<Window>, config: RendererConfig, mut playground: Playground<S>) -> Result<Self> {
        let size = window.inner_size();
        let gpu = GpuState::new(
            window.as_ref(),
            size,
            config.antialiasing,
            config.color_space,
            playground.store().geometry(),
        )?;
        playground.resize(size.width.max(1) as f32, size.height.max(1) as f32);
        let now = Instant::now();
        Ok(Self {
            window,
            gpu,
            playground,
            scheduler: FrameScheduler::new(config.target_fps),
            stats: FrameStats::new(now),
            config,
            shown_shader: None,
        })
    }

    fn window(&self) -> &Window {
        self.window.as_ref()
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.gpu.resize(new_size);
        self.playground
            .resize(new_size.width as f32, new_size.height as f32);
    }

    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        self.playground
            .pointer_moved(position.x as f32, position.y as f32, Instant::now());
    }

    fn handle_mouse_button(&mut self, state: ElementState) {
        match state {
            ElementState::Pressed => self.playground.pointer_pressed(),
            ElementState::Released => self.playground.pointer_released(),
        }
    }

    fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        // Apply queued control events first so camera and geometry are current.
        self.playground.process_events();
        let camera = *self.playground.camera();
        let geometry = self.playground.store().geometry();
        let frame = self.playground.frame(now);
        self.gpu.render(frame, geometry, &camera)?;

        if let Some(fps) = self.stats.record(now) {
            debug!(
                fps = fps.round(),
                frames = self.stats.total_frames(),
                shader = %self.playground.store().shader_id(),
                "render stats"
            );
        }
        self.sync_title();
        Ok(())
    }

    fn sync_title(&mut self) {
        let info = self.playground.shader_info();
        if self.shown_shader.as_deref() == Some(info.id.as_str()) {
            return;
        }
        let name = if info.fallback { &info.id } else { &info.name };
        self.window.set_title(&self.config.window_title(name));
        self.shown_shader = Some(info.id);
    }
}

/// Opens the preview window and drives `playground` from the winit loop
/// until the window closes or a `WindowCommand::Quit` arrives.
///
/// `on_ready` receives a `WindowControl` once the loop exists, before the
/// first frame; callers use it to hand the loop to other threads.
pub fn run_window<S, F>(config: RendererConfig, playground: Playground<S>, on_ready: F) -> Result<()>
where
    S: PresetStorage,
    F: FnOnce(WindowControl),
{
    let event_loop = EventLoopBuilder::<WindowCommand>::with_user_event()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let proxy = event_loop.create_proxy();

    let window_size = PhysicalSize::new(config.surface_size.0.max(1), config.surface_size.1.max(1));
    let window = WindowBuilder::new()
        .with_title(config.title.clone())
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut state = PreviewWindow::new(window, config, playground)
        .map_err(|err| anyhow!("failed to initialise window renderer: {err:#}"))?;
    info!(
        shader = %state.playground.store().shader_id(),
        geometry = %state.playground.store().geometry(),
        "preview window open"
    );
    on_ready(WindowControl { proxy });

    if state.scheduler.ready_for_frame(Instant::now()) {
        state.window().request_redraw();
    }

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::UserEvent(WindowCommand::Quit) => elwt.exit(),
        Event::UserEvent(WindowCommand::Wake) => {
            if state.scheduler.ready_for_frame(Instant::now()) {
                state.window().request_redraw();
            }
        }
        Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    elwt.exit();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state == ElementState::Pressed
                        && matches!(event.logical_key, Key::Named(NamedKey::Escape))
                    {
                        elwt.exit();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    state.handle_cursor_moved(position);
                }
                WindowEvent::CursorLeft { .. } => {
                    state.playground.pointer_left();
                }
                WindowEvent::MouseInput {
                    state: button_state,
                    button: MouseButton::Left,
                    ..
                } => {
                    state.handle_mouse_button(button_state);
                }
                WindowEvent::Resized(new_size) => {
                    state.resize(new_size);
                }
                WindowEvent::RedrawRequested => {
                    match state.render_frame() {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            let size = state.gpu.size();
                            state.resize(size);
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            error!("surface out of memory; exiting preview");
                            elwt.exit();
                        }
                        Err(wgpu::SurfaceError::Timeout) => {
                            warn!("surface timeout; retrying next frame");
                        }
                        Err(other) => {
                            warn!("surface error: {other:?}; retrying next frame");
                        }
                    }
                    state.scheduler.mark_rendered(Instant::now());
                }
                _ => {}
            }
        }
        Event::AboutToWait => {
            let now = Instant::now();
            if state.scheduler.ready_for_frame(now) {
                state.window().request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = state.scheduler.next_deadline() {
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
