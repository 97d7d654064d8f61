//! Per-frame transform and draw sequence.
//!
//! [`FrameRenderer`] knows nothing about wgpu. It drives a [`FrameEncoder`],
//! which the GPU backend implements and tests replace with a recorder. Binding
//! the geometry hands out a [`GeometryBinding`] token; draws borrow it and
//! unbinding consumes it, so no draw can be issued outside a binding.

use glam::Mat4;
use tracing::warn;

use crate::program::{
    UniformKind, UniformLayout, UniformLocation, COLOR_UNIFORM, TRANSFORM_UNIFORM,
};
use crate::transform::{Rgba, TransformPreset, CLEAR_COLOR, PRESETS};

/// Proof that the shared vertex and index buffers are bound.
#[derive(Debug, PartialEq, Eq)]
pub struct GeometryBinding {
    _bound: (),
}

impl GeometryBinding {
    pub(crate) fn new() -> Self {
        Self { _bound: () }
    }
}

/// Command sink for one frame.
pub trait FrameEncoder {
    fn clear(&mut self, color: Rgba);

    fn bind_geometry(&mut self) -> GeometryBinding;

    fn upload_matrix(&mut self, location: UniformLocation, value: &Mat4);

    fn upload_vec4(&mut self, location: UniformLocation, value: [f32; 4]);

    /// Draws `index_count` indices of the bound geometry as a closed line loop.
    fn draw_outline(&mut self, binding: &GeometryBinding, index_count: u32);

    fn unbind_geometry(&mut self, binding: GeometryBinding);
}

/// Uniform locations resolved once against the linked program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformLocations {
    pub transform: Option<UniformLocation>,
    pub color: Option<UniformLocation>,
}

impl UniformLocations {
    pub fn resolve(layout: Option<&UniformLayout>) -> Self {
        let Some(layout) = layout else {
            warn!("program declares no uniform block; transforms and colors are ignored");
            return Self::default();
        };
        Self {
            transform: layout.typed_location(TRANSFORM_UNIFORM, UniformKind::Mat4),
            color: layout.typed_location(COLOR_UNIFORM, UniformKind::Vec4),
        }
    }
}

/// Draws every preset over the shared quad, in preset order.
#[derive(Debug, Clone)]
pub struct FrameRenderer {
    presets: Vec<TransformPreset>,
    locations: UniformLocations,
    clear_color: Rgba,
    index_count: u32,
}

impl FrameRenderer {
    pub fn new(
        presets: Vec<TransformPreset>,
        locations: UniformLocations,
        index_count: u32,
    ) -> Self {
        Self {
            presets,
            locations,
            clear_color: CLEAR_COLOR,
            index_count,
        }
    }

    /// Renderer for the default presets.
    pub fn with_default_presets(locations: UniformLocations, index_count: u32) -> Self {
        Self::new(PRESETS.to_vec(), locations, index_count)
    }

    pub fn with_clear_color(mut self, color: Rgba) -> Self {
        self.clear_color = color;
        self
    }

    pub fn presets(&self) -> &[TransformPreset] {
        &self.presets
    }

    /// Records one frame into `encoder`.
    pub fn render<E: FrameEncoder + ?Sized>(&self, encoder: &mut E) {
        encoder.clear(self.clear_color);
        let binding = encoder.bind_geometry();

        for preset in &self.presets {
            if let Some(location) = self.locations.transform {
                encoder.upload_matrix(location, &preset.matrix());
            }
            if let Some(location) = self.locations.color {
                encoder.upload_vec4(location, preset.color.to_array());
            }
            encoder.draw_outline(&binding, self.index_count);
        }

        encoder.unbind_geometry(binding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Clear([f32; 4]),
        Bind,
        Matrix(u32, [f32; 16]),
        Vec4(u32, [f32; 4]),
        Draw(u32),
        Unbind,
    }

    #[derive(Default)]
    struct Recorder {
        ops: Vec<Op>,
    }

    impl FrameEncoder for Recorder {
        fn clear(&mut self, color: Rgba) {
            self.ops.push(Op::Clear(color.to_array()));
        }

        fn bind_geometry(&mut self) -> GeometryBinding {
            self.ops.push(Op::Bind);
            GeometryBinding::new()
        }

        fn upload_matrix(&mut self, location: UniformLocation, value: &Mat4) {
            self.ops.push(Op::Matrix(location.offset, value.to_cols_array()));
        }

        fn upload_vec4(&mut self, location: UniformLocation, value: [f32; 4]) {
            self.ops.push(Op::Vec4(location.offset, value));
        }

        fn draw_outline(&mut self, _binding: &GeometryBinding, index_count: u32) {
            self.ops.push(Op::Draw(index_count));
        }

        fn unbind_geometry(&mut self, _binding: GeometryBinding) {
            self.ops.push(Op::Unbind);
        }
    }

    fn locations() -> UniformLocations {
        UniformLocations {
            transform: Some(UniformLocation {
                offset: 0,
                kind: UniformKind::Mat4,
            }),
            color: Some(UniformLocation {
                offset: 64,
                kind: UniformKind::Vec4,
            }),
        }
    }

    #[test]
    fn frame_follows_clear_bind_draw_unbind_sequence() {
        let renderer = FrameRenderer::with_default_presets(locations(), 6);
        let mut recorder = Recorder::default();
        renderer.render(&mut recorder);

        assert_eq!(recorder.ops.first(), Some(&Op::Clear(CLEAR_COLOR.to_array())));
        assert_eq!(recorder.ops.get(1), Some(&Op::Bind));
        assert_eq!(recorder.ops.last(), Some(&Op::Unbind));

        let body = &recorder.ops[2..recorder.ops.len() - 1];
        assert_eq!(body.len(), PRESETS.len() * 3);
        for (chunk, preset) in body.chunks(3).zip(PRESETS.iter()) {
            assert_eq!(chunk[0], Op::Matrix(0, preset.matrix().to_cols_array()));
            assert_eq!(chunk[1], Op::Vec4(64, preset.color.to_array()));
            assert_eq!(chunk[2], Op::Draw(6));
        }
    }

    #[test]
    fn consecutive_frames_are_identical() {
        let renderer = FrameRenderer::with_default_presets(locations(), 6);
        let mut first = Recorder::default();
        let mut second = Recorder::default();
        renderer.render(&mut first);
        renderer.render(&mut second);
        assert_eq!(first.ops, second.ops);
    }

    #[test]
    fn missing_locations_skip_uploads_but_still_draw() {
        let renderer = FrameRenderer::with_default_presets(UniformLocations::default(), 6);
        let mut recorder = Recorder::default();
        renderer.render(&mut recorder);

        let draws = recorder
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Draw(6)))
            .count();
        assert_eq!(draws, PRESETS.len());
        assert!(!recorder
            .ops
            .iter()
            .any(|op| matches!(op, Op::Matrix(..) | Op::Vec4(..))));
    }

    #[test]
    fn custom_clear_color_is_used() {
        let color = Rgba::new(0.0, 0.0, 0.0, 1.0);
        let renderer =
            FrameRenderer::with_default_presets(locations(), 6).with_clear_color(color);
        let mut recorder = Recorder::default();
        renderer.render(&mut recorder);
        assert_eq!(recorder.ops[0], Op::Clear(color.to_array()));
    }

    #[test]
    fn resolves_locations_from_layout() {
        let sources =
            crate::source::ShaderSources::parse(include_str!("../../../shaders/basic.shader"));
        let program = crate::program::link_program(&sources).unwrap();
        let resolved = UniformLocations::resolve(program.uniforms.as_ref());
        assert_eq!(resolved, locations());
        assert_eq!(UniformLocations::resolve(None), UniformLocations::default());
    }
}
