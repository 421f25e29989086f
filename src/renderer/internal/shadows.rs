use std::mem;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};

use crate::asset::Assets;
use crate::renderer::batch::{ShadowBatch, ShadowGeometry};
use crate::renderer::cascades::Cascade;
use crate::renderer::internal::{ObjectBuffers, RenderContext};
use crate::renderer::shapes::ShapeMeshCache;
use crate::renderer::{PipelineBuilder, Vertex};
use crate::scene::PartShape;
use crate::settings::MAX_CASCADES;

pub(crate) const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ShadowViewUniform {
    view_proj: [[f32; 4]; 4],
}

/// Depth array with one layer per cascade.
struct ShadowArray {
    _texture: wgpu::Texture,
    array_view: wgpu::TextureView,
    layer_views: Vec<wgpu::TextureView>,
}

impl ShadowArray {
    fn new(device: &wgpu::Device, label: &str, layers: u32, size: u32) -> Self {
        let layers = layers.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SHADOW_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let array_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{label}ArrayView")),
            format: Some(SHADOW_FORMAT),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            base_array_layer: 0,
            array_layer_count: Some(layers),
            ..Default::default()
        });

        let layer_views = (0..layers)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&format!("{label}Layer{layer}")),
                    format: Some(SHADOW_FORMAT),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        Self {
            _texture: texture,
            array_view,
            layer_views,
        }
    }
}

/// Cascaded shadow maps and the depth-only pipeline that fills them.
pub(crate) struct ShadowResources {
    cascades: ShadowArray,
    sampler: wgpu::Sampler,
    resolution: u32,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    staging_buffer: wgpu::Buffer,
    pipeline: wgpu::RenderPipeline,
}

impl ShadowResources {
    pub(crate) fn new(
        device: &wgpu::Device,
        objects: &ObjectBuffers,
        resolution: u32,
    ) -> Self {
        let resolution = resolution.clamp(1, device.limits().max_texture_dimension_2d);
        let cascades = ShadowArray::new(device, "CascadeShadowMap", MAX_CASCADES, resolution);
        log::info!(
            "Created {} shadow cascades at {}x{}",
            MAX_CASCADES,
            resolution,
            resolution
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ShadowSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let uniform_size = mem::size_of::<ShadowViewUniform>() as u64;
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ShadowUniformLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(uniform_size),
                },
                count: None,
            }],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ShadowUniformBuffer"),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ShadowStagingBuffer"),
            size: uniform_size * MAX_CASCADES as u64,
            usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ShadowUniformBindGroup"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ShadowShader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shader/shadow.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ShadowPipelineLayout"),
            bind_group_layouts: &[&uniform_layout, &objects.bind_layout],
            push_constant_ranges: &[],
        });

        // Both faces rasterize so thin and open geometry still occludes.
        let pipeline = PipelineBuilder::new(device, &pipeline_layout, &shader)
            .with_label("ShadowPipeline")
            .with_vertex_buffer(Vertex::position_layout())
            .depth_only()
            .with_no_culling()
            .with_depth_stencil_biased(SHADOW_FORMAT, wgpu::CompareFunction::LessEqual, 2, 2.0)
            .build();

        Self {
            cascades,
            sampler,
            resolution,
            uniform_buffer,
            uniform_bind_group,
            staging_buffer,
            pipeline,
        }
    }

    pub(crate) fn array_view(&self) -> &wgpu::TextureView {
        &self.cascades.array_view
    }

    pub(crate) fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub(crate) fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Renders every cascade layer. Returns the number of draw calls.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn render(
        &self,
        context: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        cascades: &[Cascade],
        batches: &[ShadowBatch],
        shapes: &ShapeMeshCache,
        assets: &Assets,
        objects: &ObjectBuffers,
    ) -> u32 {
        let uniform_size = mem::size_of::<ShadowViewUniform>() as u64;
        let count = cascades.len().min(self.cascades.layer_views.len());

        for (index, cascade) in cascades.iter().take(count).enumerate() {
            let uniform = ShadowViewUniform {
                view_proj: cascade.view_proj.to_cols_array_2d(),
            };
            context.queue.write_buffer(
                &self.staging_buffer,
                index as u64 * uniform_size,
                bytemuck::bytes_of(&uniform),
            );
        }

        let mut draw_calls = 0;
        for (index, layer_view) in self.cascades.layer_views.iter().take(count).enumerate() {
            encoder.copy_buffer_to_buffer(
                &self.staging_buffer,
                index as u64 * uniform_size,
                &self.uniform_buffer,
                0,
                uniform_size,
            );
            draw_calls += self.render_layer(encoder, layer_view, batches, shapes, assets, objects);
        }
        draw_calls
    }

    fn render_layer(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        batches: &[ShadowBatch],
        shapes: &ShapeMeshCache,
        assets: &Assets,
        objects: &ObjectBuffers,
    ) -> u32 {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ShadowPass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, &objects.bind_group, &[0]);

        let mut draw_calls = 0;
        for batch in batches {
            if batch.range.is_empty() {
                continue;
            }
            let mesh = match batch.geometry {
                ShadowGeometry::Shape(shape) => shapes.get(shape),
                ShadowGeometry::Custom(handle) => assets.meshes.get(handle).or_else(|| {
                    log::warn!("Shadow caster mesh {:?} missing; using block", handle);
                    shapes.get(PartShape::Block)
                }),
            };
            let Some(mesh) = mesh else {
                continue;
            };
            mesh.bind(&mut pass);
            pass.draw_indexed(0..mesh.index_count(), 0, batch.range.clone());
            draw_calls += 1;
        }
        draw_calls
    }
}
