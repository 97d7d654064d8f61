//! GPU side of the renderer.
//!
//! - `context` owns the wgpu instance, device, and surface, and reconfigures
//!   the swapchain when the window resizes.
//! - `pipeline` turns linked shader sources into the outline render pipeline.
//! - `uniforms` keeps the CPU image of the uniform block and the per-draw
//!   dynamic-offset slots it is copied into.
//! - `state` replays each recorded frame into a single render pass. The pass
//!   itself only needs a texture view, so it also renders offscreen.

mod context;
mod pipeline;
mod state;
mod uniforms;

pub use pipeline::{build_program, GpuProgram};
pub(crate) use state::GpuState;

/// Device and queue on any adapter, without a surface. `None` when the
/// machine has no usable GPU or software rasteriser.
#[cfg(test)]
pub(crate) fn headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::LowPower,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok()?;
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).ok()
}
