use std::borrow::Cow;
use std::num::NonZeroU64;

use tracing::{debug, error};

use crate::compile::CompiledStage;
use crate::geometry::Vertex2D;
use crate::program::{link_program, BuildError, LinkedProgram, UniformLayout};
use crate::source::ShaderSources;

/// The linked, executable shader program used by every draw.
pub struct GpuProgram {
    pub(crate) pipeline: wgpu::RenderPipeline,
    /// `None` when the program has no uniform block.
    pub(crate) uniform_bind_layout: Option<wgpu::BindGroupLayout>,
    uniforms: Option<UniformLayout>,
}

impl GpuProgram {
    pub fn uniforms(&self) -> Option<&UniformLayout> {
        self.uniforms.as_ref()
    }
}

impl Drop for GpuProgram {
    fn drop(&mut self) {
        debug!("released shader program");
    }
}

/// Compiles, links and validates `sources` into a render pipeline targeting
/// `format`.
pub fn build_program(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    sources: &ShaderSources,
) -> Result<GpuProgram, BuildError> {
    let linked = link_program(sources)?;
    create_program(device, format, linked)
}

fn shader_module(device: &wgpu::Device, stage: CompiledStage) -> (wgpu::ShaderModule, String) {
    let label = format!("{} stage", stage.stage());
    let entry_point = stage.entry_point().to_string();
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label.as_str()),
        source: wgpu::ShaderSource::Naga(Cow::Owned(stage.into_module())),
    });
    (module, entry_point)
}

fn create_program(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    linked: LinkedProgram,
) -> Result<GpuProgram, BuildError> {
    let LinkedProgram {
        vertex,
        fragment,
        uniforms,
    } = linked;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let (vertex_module, vertex_entry) = shader_module(device, vertex);
    let (fragment_module, fragment_entry) = shader_module(device, fragment);

    let uniform_bind_layout = uniforms.as_ref().map(|layout| {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw uniforms layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: layout.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(u64::from(layout.size)),
                },
                count: None,
            }],
        })
    });
    let bind_group_layouts: Vec<&wgpu::BindGroupLayout> =
        uniform_bind_layout.iter().collect();

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("outline pipeline layout"),
        bind_group_layouts: &bind_group_layouts,
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("outline pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some(vertex_entry.as_str()),
            buffers: &[Vertex2D::layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        // Line loops are drawn as strips whose index list repeats the first
        // index at the end.
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::LineStrip,
            strip_index_format: Some(wgpu::IndexFormat::Uint32),
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some(fragment_entry.as_str()),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });

    // Shader modules are only needed until the pipeline exists.
    drop(vertex_module);
    drop(fragment_module);

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        error!("shader program failed validation: {err}");
        return Err(BuildError::Validation(err.to_string()));
    }

    debug!(?format, "built shader program");
    Ok(GpuProgram {
        pipeline,
        uniform_bind_layout,
        uniforms,
    })
}
