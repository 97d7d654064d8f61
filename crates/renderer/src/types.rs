use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::transform::{Rgba, TransformPreset, CLEAR_COLOR, PRESETS};

/// Adapter selection hint forwarded to wgpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    /// Prefer integrated or otherwise power-efficient adapters.
    #[default]
    Low,
    /// Prefer discrete adapters.
    High,
}

impl From<GpuPowerPreference> for wgpu::PowerPreference {
    fn from(value: GpuPowerPreference) -> Self {
        match value {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        }
    }
}

impl fmt::Display for GpuPowerPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuPowerPreference::Low => f.write_str("low"),
            GpuPowerPreference::High => f.write_str("high"),
        }
    }
}

impl FromStr for GpuPowerPreference {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "low-power" | "integrated" => Ok(GpuPowerPreference::Low),
            "high" | "high-performance" | "discrete" => Ok(GpuPowerPreference::High),
            other => Err(format!(
                "unknown GPU power preference '{other}'; expected low or high"
            )),
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors the CLI flags: which shader file to load, how
/// large the window should be, and what to draw into it.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    pub title: String,
    /// Combined shader file with `#shader vertex` and `#shader fragment`
    /// sections.
    pub shader_source: PathBuf,
    pub gpu_power: GpuPowerPreference,
    /// Wait for vertical blank when presenting.
    pub vsync: bool,
    pub clear_color: Rgba,
    /// Drawn in order, one outline per entry.
    pub presets: Vec<TransformPreset>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (900, 900),
            title: "Linear Transformations".to_string(),
            shader_source: PathBuf::from("shaders/basic.shader"),
            gpu_power: GpuPowerPreference::default(),
            vsync: true,
            clear_color: CLEAR_COLOR,
            presets: PRESETS.to_vec(),
        }
    }
}
