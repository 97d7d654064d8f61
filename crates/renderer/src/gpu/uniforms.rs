use std::num::NonZeroU64;

use glam::Mat4;
use tracing::{debug, warn};

use crate::program::{UniformKind, UniformLocation};

/// CPU copy of the uniform block.
///
/// Uploads patch it in place and the values persist until overwritten, so a
/// draw sees whatever was uploaded last, just like uniforms on a bound GL
/// program.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UniformImage {
    bytes: Vec<u8>,
}

impl UniformImage {
    pub fn new(size: u32) -> Self {
        Self {
            bytes: vec![0; size as usize],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn write_matrix(&mut self, location: UniformLocation, value: &Mat4) {
        debug_assert_eq!(location.kind, UniformKind::Mat4);
        let columns = value.to_cols_array();
        self.write(location.offset, bytemuck::cast_slice(&columns));
    }

    pub fn write_vec4(&mut self, location: UniformLocation, value: [f32; 4]) {
        debug_assert_eq!(location.kind, UniformKind::Vec4);
        self.write(location.offset, bytemuck::cast_slice(&value));
    }

    fn write(&mut self, offset: u32, data: &[u8]) {
        let start = offset as usize;
        let Some(slot) = self.bytes.get_mut(start..start + data.len()) else {
            warn!(
                offset,
                len = data.len(),
                block = self.bytes.len(),
                "uniform upload outside the block; skipped"
            );
            return;
        };
        slot.copy_from_slice(data);
    }
}

/// Rounds `size` up to the next multiple of `alignment`.
pub(crate) fn align_to(size: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return size;
    }
    size.div_ceil(alignment) * alignment
}

/// Uniform buffer with one aligned slot per draw, addressed by dynamic offset.
pub(crate) struct UniformSlots {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    block_size: u64,
    stride: u64,
    capacity: usize,
}

impl UniformSlots {
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        binding: u32,
        block_size: u32,
        capacity: usize,
    ) -> Self {
        let block_size = u64::from(block_size.max(16));
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let stride = align_to(block_size, alignment);
        let capacity = capacity.max(1);
        let (buffer, bind_group) =
            Self::allocate(device, layout, binding, block_size, stride, capacity);
        Self {
            buffer,
            bind_group,
            block_size,
            stride,
            capacity,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        binding: u32,
        block_size: u64,
        stride: u64,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("draw uniforms"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw uniforms bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(block_size),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Grows the buffer so that `slots` draws fit.
    pub fn ensure_capacity(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        binding: u32,
        slots: usize,
    ) {
        if slots <= self.capacity {
            return;
        }
        let capacity = slots.next_power_of_two();
        debug!(from = self.capacity, to = capacity, "growing uniform slots");
        let (buffer, bind_group) =
            Self::allocate(device, layout, binding, self.block_size, self.stride, capacity);
        self.buffer = buffer;
        self.bind_group = bind_group;
        self.capacity = capacity;
    }

    /// Writes every slot image, back to back at `stride`.
    pub fn write(&self, queue: &wgpu::Queue, images: &[UniformImage]) {
        if images.is_empty() {
            return;
        }
        let mut staging = vec![0u8; self.stride as usize * images.len()];
        for (index, image) in images.iter().enumerate() {
            let start = index * self.stride as usize;
            let bytes = image.as_bytes();
            let len = bytes.len().min(self.block_size as usize);
            staging[start..start + len].copy_from_slice(&bytes[..len]);
        }
        queue.write_buffer(&self.buffer, 0, &staging);
    }

    pub fn offset(&self, slot: usize) -> wgpu::DynamicOffset {
        (slot as u64 * self.stride) as wgpu::DynamicOffset
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
