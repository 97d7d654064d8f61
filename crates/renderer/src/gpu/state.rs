use anyhow::{Context, Result};
use glam::Mat4;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::frame::{FrameEncoder, FrameRenderer, GeometryBinding, UniformLocations};
use crate::geometry::{strip_len, QuadOutline};
use crate::program::UniformLocation;
use crate::source::ShaderSources;
use crate::transform::{Rgba, CLEAR_COLOR};
use crate::types::RendererConfig;

use super::context::GpuContext;
use super::pipeline::{build_program, GpuProgram};
use super::uniforms::{UniformImage, UniformSlots};

/// Everything needed to draw the outline presets into one window.
pub(crate) struct GpuState {
    context: GpuContext,
    pass: OutlinePass,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        size: PhysicalSize<u32>,
        config: &RendererConfig,
        sources: &ShaderSources,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size, config.gpu_power, config.vsync)?;
        let program = build_program(&context.device, context.format(), sources)
            .context("failed to build shader program")?;
        let pass = OutlinePass::new(&context.device, program, config, config.presets.len());

        info!(
            width = context.size().width,
            height = context.size().height,
            format = ?context.format(),
            presets = pass.frame.presets().len(),
            "renderer ready"
        );

        Ok(Self { context, pass })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size()
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        debug!(width = new_size.width, height = new_size.height, "resizing surface");
        self.context.resize(new_size);
    }

    /// Records, submits, and presents one frame.
    pub(crate) fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let commands = self
            .pass
            .encode(&self.context.device, &self.context.queue, &view);
        self.context.queue.submit(std::iter::once(commands));
        frame.present();
        Ok(())
    }
}

/// Program, shared geometry, and uniform slots, independent of any surface.
pub(crate) struct OutlinePass {
    program: GpuProgram,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    strip_capacity: u32,
    uniforms: Option<UniformSlots>,
    frame: FrameRenderer,
}

impl OutlinePass {
    /// `initial_slots` only sizes the first uniform buffer; it grows as needed.
    pub(crate) fn new(
        device: &wgpu::Device,
        program: GpuProgram,
        config: &RendererConfig,
        initial_slots: usize,
    ) -> Self {
        let outline = QuadOutline::default();
        let strip = outline.loop_indices();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad vertices"),
            contents: bytemuck::cast_slice(&outline.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad outline indices"),
            contents: bytemuck::cast_slice(&strip),
            usage: wgpu::BufferUsages::INDEX,
        });

        let uniforms = match (program.uniforms(), program.uniform_bind_layout.as_ref()) {
            (Some(layout), Some(bind_layout)) => Some(UniformSlots::new(
                device,
                bind_layout,
                layout.binding,
                layout.size,
                initial_slots,
            )),
            _ => None,
        };

        let locations = UniformLocations::resolve(program.uniforms());
        let frame = FrameRenderer::new(config.presets.clone(), locations, outline.index_count())
            .with_clear_color(config.clear_color);
        for preset in frame.presets() {
            debug!(
                kind = preset.kind.label(),
                color = ?preset.color.to_array(),
                "queued transform preset"
            );
        }

        Self {
            program,
            vertex_buffer,
            index_buffer,
            strip_capacity: strip.len() as u32,
            uniforms,
            frame,
        }
    }

    /// Runs the frame renderer and encodes the result into one render pass
    /// targeting `view`. Uniform slots are written through `queue` right away.
    pub(crate) fn encode(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
    ) -> wgpu::CommandBuffer {
        let mut recorded = GpuFrame::new(self.program.uniforms().map(|layout| layout.size));
        self.frame.render(&mut recorded);

        if let (Some(slots), Some(bind_layout), Some(layout)) = (
            self.uniforms.as_mut(),
            self.program.uniform_bind_layout.as_ref(),
            self.program.uniforms(),
        ) {
            slots.ensure_capacity(device, bind_layout, layout.binding, recorded.images.len());
            slots.write(queue, &recorded.images);
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("outline pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(recorded.clear.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.program.pipeline);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

            for draw in &recorded.draws {
                if let (Some(slots), Some(slot)) = (self.uniforms.as_ref(), draw.slot) {
                    render_pass.set_bind_group(0, slots.bind_group(), &[slots.offset(slot)]);
                }
                render_pass.draw_indexed(0..draw.indices.min(self.strip_capacity), 0, 0..1);
            }
        }

        encoder.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DrawCall {
    slot: Option<usize>,
    indices: u32,
}

/// CPU-side recording of one frame, replayed into a single render pass.
///
/// Each draw snapshots the uniform image as it stands, so draws keep the
/// values uploaded before them even though the whole frame is encoded at once.
struct GpuFrame {
    clear: Rgba,
    image: Option<UniformImage>,
    images: Vec<UniformImage>,
    draws: Vec<DrawCall>,
}

impl GpuFrame {
    fn new(block_size: Option<u32>) -> Self {
        Self {
            clear: CLEAR_COLOR,
            image: block_size.map(UniformImage::new),
            images: Vec::new(),
            draws: Vec::new(),
        }
    }
}

impl FrameEncoder for GpuFrame {
    fn clear(&mut self, color: Rgba) {
        self.clear = color;
    }

    fn bind_geometry(&mut self) -> GeometryBinding {
        GeometryBinding::new()
    }

    fn upload_matrix(&mut self, location: UniformLocation, value: &Mat4) {
        if let Some(image) = self.image.as_mut() {
            image.write_matrix(location, value);
        }
    }

    fn upload_vec4(&mut self, location: UniformLocation, value: [f32; 4]) {
        if let Some(image) = self.image.as_mut() {
            image.write_vec4(location, value);
        }
    }

    fn draw_outline(&mut self, _binding: &GeometryBinding, index_count: u32) {
        let slot = self.image.as_ref().map(|image| {
            self.images.push(image.clone());
            self.images.len() - 1
        });
        self.draws.push(DrawCall {
            slot,
            indices: strip_len(index_count),
        });
    }

    fn unbind_geometry(&mut self, _binding: GeometryBinding) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless_device;
    use crate::program::UniformKind;
    use crate::transform::PRESETS;

    const TARGET_SIZE: u32 = 256;

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

    fn color_at(image: &UniformImage) -> [f32; 4] {
        let bytes = &image.as_bytes()[64..80];
        let mut color = [0.0; 4];
        for (component, chunk) in color.iter_mut().zip(bytes.chunks_exact(4)) {
            *component = f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        color
    }

    #[test]
    fn each_draw_gets_its_own_uniform_snapshot() {
        let renderer = FrameRenderer::with_default_presets(locations(), 6);
        let mut frame = GpuFrame::new(Some(80));
        renderer.render(&mut frame);

        assert_eq!(frame.draws.len(), PRESETS.len());
        assert_eq!(frame.images.len(), PRESETS.len());
        for (index, (draw, preset)) in frame.draws.iter().zip(PRESETS.iter()).enumerate() {
            assert_eq!(draw.slot, Some(index));
            assert_eq!(draw.indices, 7);
            assert_eq!(color_at(&frame.images[index]), preset.color.to_array());
        }
    }

    #[test]
    fn frame_without_uniform_block_draws_without_slots() {
        let renderer = FrameRenderer::with_default_presets(UniformLocations::default(), 6);
        let mut frame = GpuFrame::new(None);
        renderer.render(&mut frame);

        assert!(frame.images.is_empty());
        assert!(frame.draws.iter().all(|draw| draw.slot.is_none()));
        assert_eq!(frame.clear, CLEAR_COLOR);
    }

    fn to_rgb8(color: Rgba) -> [u8; 3] {
        let [r, g, b, _] = color.to_array();
        [r, g, b].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }

    fn read_back(device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Vec<u8> {
        let bytes_per_row = TARGET_SIZE * 4;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size: u64::from(bytes_per_row * TARGET_SIZE),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(TARGET_SIZE),
                },
            },
            wgpu::Extent3d {
                width: TARGET_SIZE,
                height: TARGET_SIZE,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        slice.map_async(wgpu::MapMode::Read, |result| {
            result.expect("readback buffer maps");
        });
        device
            .poll(wgpu::PollType::Wait)
            .expect("device finishes readback");
        let pixels = slice.get_mapped_range().to_vec();
        buffer.unmap();
        pixels
    }

    #[test]
    fn draws_every_preset_into_an_offscreen_target() {
        let Some((device, queue)) = headless_device() else {
            eprintln!("no GPU adapter available; skipping");
            return;
        };
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let sources = ShaderSources::parse(include_str!("../../../../shaders/basic.shader"));
        let program = build_program(&device, format, &sources).expect("bundled program builds");
        let config = RendererConfig::default();
        // One slot up front so the first frame has to grow the buffer.
        let mut pass = OutlinePass::new(&device, program, &config, 1);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width: TARGET_SIZE,
                height: TARGET_SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let commands = pass.encode(&device, &queue, &view);
        queue.submit(std::iter::once(commands));

        let capacity = pass.uniforms.as_ref().map(UniformSlots::capacity);
        assert!(capacity.is_some_and(|slots| slots >= config.presets.len()));

        let pixels = read_back(&device, &queue, &texture);
        let present = |expected: [u8; 3]| {
            pixels.chunks_exact(4).any(|pixel| {
                pixel[..3]
                    .iter()
                    .zip(expected)
                    .all(|(&got, want)| got.abs_diff(want) <= 2)
            })
        };

        assert!(present(to_rgb8(config.clear_color)), "clear color missing");
        for preset in &config.presets {
            assert!(
                present(to_rgb8(preset.color)),
                "{} outline missing",
                preset.kind.label()
            );
        }
    }
}
