use std::mem;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::renderer::batch::InstanceRaw;
use crate::renderer::internal::RenderContext;

/// Dynamic uniform offsets must be multiples of this on every backend.
pub(crate) const DRAW_UNIFORM_STRIDE: u64 = 256;

/// Model and tint for one non-instanced draw.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct DrawUniform {
    pub(crate) model: [[f32; 4]; 4],
    pub(crate) color: [f32; 4],
}

impl DrawUniform {
    pub(crate) fn new(model: Mat4, color: Vec4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

/// Instance storage buffer and the per-draw uniform slots, bound together as group 1.
pub(crate) struct ObjectBuffers {
    instance_buffer: wgpu::Buffer,
    instance_capacity: u32,
    draw_buffer: wgpu::Buffer,
    draw_capacity: u32,
    draw_scratch: Vec<u8>,
    pub(crate) bind_group: wgpu::BindGroup,
    pub(crate) bind_layout: wgpu::BindGroupLayout,
}

impl ObjectBuffers {
    pub(crate) fn new(device: &wgpu::Device, instance_capacity: u32, draw_capacity: u32) -> Self {
        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ObjectsBindLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(mem::size_of::<InstanceRaw>() as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(mem::size_of::<DrawUniform>() as u64),
                    },
                    count: None,
                },
            ],
        });

        let instance_capacity = instance_capacity.max(1);
        let draw_capacity = draw_capacity.max(1);
        let instance_buffer = Self::create_instance_buffer(device, instance_capacity);
        let draw_buffer = Self::create_draw_buffer(device, draw_capacity);
        let bind_group =
            Self::create_bind_group(device, &bind_layout, &instance_buffer, &draw_buffer);

        Self {
            instance_buffer,
            instance_capacity,
            draw_buffer,
            draw_capacity,
            draw_scratch: Vec::new(),
            bind_group,
            bind_layout,
        }
    }

    /// Byte offset of a draw slot, passed as the dynamic offset of binding 1.
    pub(crate) fn draw_offset(&self, slot: u32) -> u32 {
        (slot as u64 * DRAW_UNIFORM_STRIDE) as u32
    }

    /// Uploads this frame's instances and draw slots, growing the buffers when needed.
    pub(crate) fn update(
        &mut self,
        context: &RenderContext,
        instances: &[InstanceRaw],
        draws: &[DrawUniform],
    ) {
        let mut rebind = false;

        let required_instances = instances.len() as u32;
        if required_instances > self.instance_capacity {
            let new_capacity = required_instances.max(self.instance_capacity * 2);
            log::info!(
                "Growing instance buffer: {} -> {}",
                self.instance_capacity,
                new_capacity
            );
            self.instance_buffer = Self::create_instance_buffer(&context.device, new_capacity);
            self.instance_capacity = new_capacity;
            rebind = true;
        }

        let required_draws = draws.len() as u32;
        if required_draws > self.draw_capacity {
            let new_capacity = required_draws.max(self.draw_capacity * 2);
            log::info!(
                "Growing draw uniform buffer: {} -> {}",
                self.draw_capacity,
                new_capacity
            );
            self.draw_buffer = Self::create_draw_buffer(&context.device, new_capacity);
            self.draw_capacity = new_capacity;
            rebind = true;
        }

        if rebind {
            self.bind_group = Self::create_bind_group(
                &context.device,
                &self.bind_layout,
                &self.instance_buffer,
                &self.draw_buffer,
            );
        }

        if !instances.is_empty() {
            context
                .queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(instances));
        }

        if !draws.is_empty() {
            self.draw_scratch.clear();
            self.draw_scratch
                .resize(draws.len() * DRAW_UNIFORM_STRIDE as usize, 0);
            for (slot, draw) in draws.iter().enumerate() {
                let start = slot * DRAW_UNIFORM_STRIDE as usize;
                let bytes = bytemuck::bytes_of(draw);
                self.draw_scratch[start..start + bytes.len()].copy_from_slice(bytes);
            }
            context
                .queue
                .write_buffer(&self.draw_buffer, 0, &self.draw_scratch);
        }
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("InstanceBuffer"),
            size: capacity as u64 * mem::size_of::<InstanceRaw>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_draw_buffer(device: &wgpu::Device, capacity: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("DrawUniformBuffer"),
            size: capacity as u64 * DRAW_UNIFORM_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        instances: &wgpu::Buffer,
        draws: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ObjectsBindGroup"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: instances.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: draws,
                        offset: 0,
                        size: NonZeroU64::new(mem::size_of::<DrawUniform>() as u64),
                    }),
                },
            ],
        })
    }
}
