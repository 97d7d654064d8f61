//! Shared quad geometry.
//!
//! The index list is laid out as two triangles but the program draws it as a
//! closed line loop, so only the quad's edges appear on screen.

use std::mem;

/// Vertex attribute slot of the `vec2` position input.
pub const POSITION_LOCATION: u32 = 0;

/// A 2D vertex with position only.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex2D {
    pub position: [f32; 2],
}

impl Vertex2D {
    pub const ATTRS: [wgpu::VertexAttribute; 1] =
        wgpu::vertex_attr_array![POSITION_LOCATION => Float32x2];

    pub const fn new(x: f32, y: f32) -> Self {
        Self { position: [x, y] }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex2D>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Corners of the base square, counter-clockwise from bottom left.
pub const QUAD_VERTICES: [Vertex2D; 4] = [
    Vertex2D::new(-0.1, -0.1),
    Vertex2D::new(0.1, -0.1),
    Vertex2D::new(0.1, 0.1),
    Vertex2D::new(-0.1, 0.1),
];

/// Two triangles' worth of connectivity over [`QUAD_VERTICES`].
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// CPU-side copy of the vertex and index data uploaded once at start-up.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadOutline {
    pub vertices: Vec<Vertex2D>,
    pub indices: Vec<u32>,
}

impl Default for QuadOutline {
    fn default() -> Self {
        Self {
            vertices: QUAD_VERTICES.to_vec(),
            indices: QUAD_INDICES.to_vec(),
        }
    }
}

impl QuadOutline {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Index list for a line-strip pipeline that draws the indices as a
    /// closed loop: the first index is repeated at the end.
    pub fn loop_indices(&self) -> Vec<u32> {
        let mut indices = self.indices.clone();
        if let Some(&first) = self.indices.first() {
            indices.push(first);
        }
        indices
    }
}

/// Number of strip indices needed to draw `loop_count` indices as a loop.
pub fn strip_len(loop_count: u32) -> u32 {
    if loop_count == 0 {
        0
    } else {
        loop_count + 1
    }
}
