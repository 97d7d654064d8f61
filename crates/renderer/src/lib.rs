//! Renderer crate for lintrans, the linear-transformation outline demo.
//!
//! One quad outline is drawn five times per frame, each time through a
//! different affine transform and in a different color. The overall flow is:
//!
//! ```text
//!   CLI / lintrans
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ ShaderSources::load ──▶ build_program ──▶ GpuProgram
//!          │                                                       │
//!          └─▶ winit event loop ──▶ GpuState::render ──▶ FrameRenderer::render
//!                                                          └─▶ upload + draw × 5
//! ```
//!
//! Everything up to linking runs without a GPU: [`source`] splits the combined
//! shader asset, [`compile`] turns each stage into a validated naga module and
//! [`program`] links the two and reflects the uniform block. The per-frame
//! sequence in [`frame`] is written against the [`FrameEncoder`] trait, so it
//! is exercised in tests with a recorder instead of a device.

pub mod compile;
pub mod frame;
pub mod geometry;
mod gpu;
pub mod program;
pub mod source;
pub mod transform;
mod types;
mod window;

use anyhow::Result;

pub use compile::{compile_stage, CompiledStage, StageError};
pub use frame::{FrameEncoder, FrameRenderer, GeometryBinding, UniformLocations};
pub use gpu::{build_program, GpuProgram};
pub use program::{
    link_program, BuildError, LinkedProgram, UniformKind, UniformLayout, UniformLocation,
};
pub use source::{ShaderSources, Stage};
pub use transform::{Rgba, TransformKind, TransformPreset, CLEAR_COLOR, PRESETS};
pub use types::{GpuPowerPreference, RendererConfig};

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Loads the shader asset, opens the window and renders until it closes.
    ///
    /// A missing asset is not an error by itself; it yields empty sources,
    /// which then fail to compile and abort start-up with a `BuildError`.
    pub fn run(&mut self) -> Result<()> {
        let sources = ShaderSources::load(&self.config.shader_source);
        window::run_window(self.config.clone(), sources)
    }
}
