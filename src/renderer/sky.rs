use std::mem;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};

use crate::renderer::depth::DEPTH_FORMAT;
use crate::renderer::shading::{HDR_FORMAT, NORMAL_FORMAT};
use crate::renderer::PipelineBuilder;
use crate::scene::{Camera, DirectionalLight, SkyColors};

#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SkyUniform {
    pub inv_view_proj: [[f32; 4]; 4],
    /// Horizon color.
    pub inner: [f32; 4],
    /// Zenith color.
    pub outer: [f32; 4],
    /// xyz: toward the sun, w: glow strength.
    pub to_sun: [f32; 4],
}

impl SkyUniform {
    pub fn new(camera: &Camera, light: &DirectionalLight) -> Self {
        let colors = SkyColors::for_sun(light.direction);
        Self {
            inv_view_proj: camera.view_proj().inverse().to_cols_array_2d(),
            inner: colors.inner.extend(1.0).to_array(),
            outer: colors.outer.extend(1.0).to_array(),
            to_sun: light.to_sun().extend(light.sun_strength()).to_array(),
        }
    }
}

/// Fullscreen gradient drawn behind the scene before any geometry.
pub(crate) struct SkyPass {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipeline: wgpu::RenderPipeline,
}

impl SkyPass {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let size = mem::size_of::<SkyUniform>() as u64;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SkyBindLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(size),
                },
                count: None,
            }],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SkyUniformBuffer"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SkyBindGroup"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("SkyShader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shader/sky.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("SkyPipelineLayout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = PipelineBuilder::new(device, &pipeline_layout, &shader)
            .with_label("SkyPipeline")
            .with_no_culling()
            .with_color_target(HDR_FORMAT, None)
            .with_color_target_masked(NORMAL_FORMAT, None, wgpu::ColorWrites::empty())
            .with_depth_stencil(DEPTH_FORMAT, false, wgpu::CompareFunction::Always)
            .build();

        Self {
            uniform_buffer,
            bind_group,
            pipeline,
        }
    }

    pub(crate) fn update(&self, queue: &wgpu::Queue, uniform: &SkyUniform) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniform));
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
