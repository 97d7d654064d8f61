use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::gpu::GpuState;
use crate::source::ShaderSources;
use crate::types::RendererConfig;

/// GPU state plus the window its surface was created from.
///
/// `gpu` is declared first so the surface is dropped before the window.
pub(crate) struct WindowState {
    gpu: Option<GpuState>,
    window: Arc<Window>,
}

impl WindowState {
    pub(crate) fn new(
        window: Arc<Window>,
        config: &RendererConfig,
        sources: &ShaderSources,
    ) -> Result<Self> {
        let size = window.inner_size();
        let gpu = GpuState::new(window.as_ref(), size, config, sources)?;
        Ok(Self {
            gpu: Some(gpu),
            window,
        })
    }

    pub(crate) fn window(&self) -> &Window {
        self.window.as_ref()
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize(new_size);
        }
    }

    /// Renders one frame. Returns `false` when the loop should stop.
    fn render_frame(&mut self) -> bool {
        let Some(gpu) = self.gpu.as_mut() else {
            return false;
        };
        match gpu.render() {
            Ok(()) => true,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("surface lost or outdated; reconfiguring");
                let size = gpu.size();
                gpu.resize(size);
                true
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("surface out of memory; closing window");
                false
            }
            Err(other) => {
                warn!("surface error: {other:?}; skipping frame");
                true
            }
        }
    }

    /// Releases the GPU resources. Safe to call more than once.
    fn teardown(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            drop(gpu);
            debug!("GPU state released");
        }
    }
}

/// Opens the window and draws frames until it is closed.
pub(crate) fn run_window(config: RendererConfig, sources: ShaderSources) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, &config, &sources)
        .map_err(|err| anyhow!("failed to initialise window renderer: {err:#}"))?;
    info!(title = %config.title, "window opened");

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    debug!("close requested");
                    elwt.exit();
                }
                WindowEvent::Resized(new_size) => {
                    state.resize(new_size);
                }
                WindowEvent::RedrawRequested => {
                    if !state.render_frame() {
                        elwt.exit();
                    }
                }
                _ => {}
            }
        }
        Event::AboutToWait => {
            elwt.set_control_flow(ControlFlow::Poll);
            state.window().request_redraw();
        }
        Event::LoopExiting => {
            state.teardown();
            info!("window closed");
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
