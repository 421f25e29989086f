use std::collections::HashMap;
use std::mem;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::asset::{Assets, Handle, Texture};
use crate::renderer::cascades::Cascade;
use crate::renderer::depth::DEPTH_FORMAT;
use crate::renderer::internal::{ObjectBuffers, ShadowResources};
use crate::renderer::{PipelineBuilder, Vertex};
use crate::scene::{Camera, DirectionalLight};
use crate::settings::{RenderSettings, MAX_CASCADES};

/// Linear HDR scene color written by the lit and sky passes.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// World normals encoded as `n * 0.5 + 0.5`, read by SSAO.
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub const SKY_AMBIENT: Vec3 = Vec3::new(0.60, 0.70, 0.90);
pub const GROUND_AMBIENT: Vec3 = Vec3::new(0.18, 0.16, 0.14);
pub const HEMI_STRENGTH: f32 = 0.7;
pub const SPECULAR_STRENGTH: f32 = 1.3;
pub const SHININESS: f32 = 128.0;
pub const FRESNEL_STRENGTH: f32 = 0.1;
pub const AO_STRENGTH: f32 = 0.9;
/// Height treated as the ground plane by the contact darkening term.
pub const GROUND_HEIGHT: f32 = 0.5;
/// Normal offset applied before the light projection, in shadow texels.
pub const NORMAL_OFFSET_TEXELS: f32 = 1.5;

/// Per-frame constants shared by every lit draw.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[[f32; 4]; 4]; MAX_CASCADES as usize],
    pub camera_position: [f32; 4],
    /// xyz: sun to scene, w: sun strength.
    pub sun_direction: [f32; 4],
    /// xyz: flat ambient, w: hemispheric strength.
    pub ambient: [f32; 4],
    /// xyz: sky ambient, w: specular strength.
    pub sky_color: [f32; 4],
    /// xyz: ground ambient, w: shininess.
    pub ground_color: [f32; 4],
    /// xyz: far split of each cascade, w: cascade count.
    pub cascade_splits: [f32; 4],
    /// xyz: world normal offset per cascade, w: transition fraction.
    pub normal_bias: [f32; 4],
    /// pcf step, map resolution, bias min, bias max.
    pub shadow_params: [f32; 4],
    /// fresnel, ao strength, ground height, shadows enabled.
    pub material_params: [f32; 4],
    /// x: cascade tint overlay.
    pub debug: [f32; 4],
}

impl FrameUniforms {
    /// `shadow_map_resolution` is the size of the allocated shadow array, which
    /// may be smaller than the configured one on limited adapters.
    pub fn build(
        camera: &Camera,
        light: &DirectionalLight,
        cascades: &[Cascade],
        shadow_map_resolution: u32,
        settings: &RenderSettings,
    ) -> Self {
        let mut light_view_proj = [Mat4::IDENTITY.to_cols_array_2d(); MAX_CASCADES as usize];
        let mut splits = [camera.far; MAX_CASCADES as usize];
        let mut offsets = [0.0; MAX_CASCADES as usize];
        for (i, cascade) in cascades.iter().take(MAX_CASCADES as usize).enumerate() {
            light_view_proj[i] = cascade.view_proj.to_cols_array_2d();
            splits[i] = cascade.split_far;
            offsets[i] = cascade.texel_world_size * NORMAL_OFFSET_TEXELS;
        }

        let count = cascades.len().min(MAX_CASCADES as usize);
        let shadows = settings.shadows_enabled && count > 0;
        let (bias_min, bias_max) = settings.effective_bias();

        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
            light_view_proj,
            camera_position: camera.position.extend(1.0).to_array(),
            sun_direction: light.direction.extend(light.sun_strength()).to_array(),
            ambient: light.ambient.extend(HEMI_STRENGTH).to_array(),
            sky_color: SKY_AMBIENT.extend(SPECULAR_STRENGTH).to_array(),
            ground_color: GROUND_AMBIENT.extend(SHININESS).to_array(),
            cascade_splits: [splits[0], splits[1], splits[2], count as f32],
            normal_bias: [
                offsets[0],
                offsets[1],
                offsets[2],
                settings.cascade_transition,
            ],
            shadow_params: [
                settings.pcf_step,
                shadow_map_resolution.max(1) as f32,
                bias_min,
                bias_max,
            ],
            material_params: [
                FRESNEL_STRENGTH,
                AO_STRENGTH,
                GROUND_HEIGHT,
                if shadows { 1.0 } else { 0.0 },
            ],
            debug: [
                if settings.show_shadow_debug { 1.0 } else { 0.0 },
                0.0,
                0.0,
                0.0,
            ],
        }
    }
}

/// Depth comparison bias for a surface, larger at grazing angles.
pub fn pcf_bias(n_dot_l: f32, bias_min: f32, bias_max: f32) -> f32 {
    let t = n_dot_l.clamp(0.0, 1.0);
    bias_max + (bias_min - bias_max) * t
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Shadow factor for a view depth, cross-fading between neighbouring cascades.
///
/// `split_far` holds the far distance of each cascade; `sample(i)` returns the
/// filtered shadow factor of cascade `i`. Mirrors the lit shader.
pub fn shadow_cascade_blend(
    view_depth: f32,
    split_far: &[f32],
    transition: f32,
    sample: impl Fn(usize) -> f32,
) -> f32 {
    let Some(last) = split_far.len().checked_sub(1) else {
        return 1.0;
    };
    let fraction = transition.clamp(0.0, 0.5);
    for (i, &split) in split_far.iter().take(last).enumerate() {
        let band = (split * fraction).max(0.001);
        if view_depth <= split - band {
            return sample(i);
        }
        if view_depth < split + band {
            let t = smoothstep(split - band, split + band, view_depth);
            let near = sample(i);
            return near + (sample(i + 1) - near) * t;
        }
    }
    sample(last)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LitVariant {
    /// Per-instance model and color from the instance storage buffer.
    Instanced,
    /// Model and color from the dynamic draw uniform.
    Single,
}

impl LitVariant {
    fn vertex_entry(self) -> &'static str {
        match self {
            LitVariant::Instanced => "vs_instanced",
            LitVariant::Single => "vs_single",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub variant: LitVariant,
    pub alpha_blend: bool,
}

impl PipelineKey {
    pub const ALL: [PipelineKey; 4] = [
        PipelineKey {
            variant: LitVariant::Instanced,
            alpha_blend: false,
        },
        PipelineKey {
            variant: LitVariant::Single,
            alpha_blend: false,
        },
        PipelineKey {
            variant: LitVariant::Instanced,
            alpha_blend: true,
        },
        PipelineKey {
            variant: LitVariant::Single,
            alpha_blend: true,
        },
    ];
}

/// Lit pipelines, the frame uniform and per-texture material bind groups.
pub(crate) struct ShadingPipeline {
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    material_layout: wgpu::BindGroupLayout,
    default_material: wgpu::BindGroup,
    _white: Texture,
    materials: HashMap<Handle<Texture>, wgpu::BindGroup>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl ShadingPipeline {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        objects: &ObjectBuffers,
        shadows: &ShadowResources,
    ) -> Self {
        let frame_size = mem::size_of::<FrameUniforms>() as u64;
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("FrameBindLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(frame_size),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("FrameUniformBuffer"),
            size: frame_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("FrameBindGroup"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(shadows.array_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(shadows.sampler()),
                },
            ],
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("MaterialBindLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let white = Texture::white(device, queue);
        let default_material = Self::material_bind_group(device, &material_layout, &white);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("LitShader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shader/lit.wgsl").into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("LitPipelineLayout"),
            bind_group_layouts: &[&frame_layout, &objects.bind_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let pipelines = PipelineKey::ALL
            .into_iter()
            .map(|key| (key, Self::build_pipeline(device, &layout, &shader, key)))
            .collect();

        Self {
            frame_buffer,
            frame_bind_group,
            material_layout,
            default_material,
            _white: white,
            materials: HashMap::new(),
            pipelines,
        }
    }

    fn build_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        key: PipelineKey,
    ) -> wgpu::RenderPipeline {
        let label = match (key.variant, key.alpha_blend) {
            (LitVariant::Instanced, false) => "LitInstancedPipeline",
            (LitVariant::Single, false) => "LitSinglePipeline",
            (LitVariant::Instanced, true) => "LitInstancedBlendPipeline",
            (LitVariant::Single, true) => "LitSingleBlendPipeline",
        };
        let builder = PipelineBuilder::new(device, layout, shader)
            .with_label(label)
            .with_vertex_entry(key.variant.vertex_entry())
            .with_fragment_entry("fs_main")
            .with_vertex_buffer(Vertex::layout());

        // Blended surfaces leave the normal target to the opaque geometry behind them.
        if key.alpha_blend {
            builder
                .with_color_target(HDR_FORMAT, Some(wgpu::BlendState::ALPHA_BLENDING))
                .with_color_target_masked(NORMAL_FORMAT, None, wgpu::ColorWrites::empty())
                .with_depth_stencil(DEPTH_FORMAT, false, wgpu::CompareFunction::Less)
                .build()
        } else {
            builder
                .with_color_target(HDR_FORMAT, None)
                .with_color_target(NORMAL_FORMAT, None)
                .with_depth_stencil(DEPTH_FORMAT, true, wgpu::CompareFunction::Less)
                .build()
        }
    }

    fn material_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        texture: &Texture,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("MaterialBindGroup"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
        })
    }

    pub(crate) fn set_frame_uniforms(&self, queue: &wgpu::Queue, uniforms: &FrameUniforms) {
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Creates material bind groups for textures seen for the first time.
    pub(crate) fn prepare_textures(
        &mut self,
        device: &wgpu::Device,
        assets: &Assets,
        handles: impl IntoIterator<Item = Handle<Texture>>,
    ) {
        for handle in handles {
            if self.materials.contains_key(&handle) {
                continue;
            }
            match assets.textures.get(handle) {
                Some(texture) => {
                    let group = Self::material_bind_group(device, &self.material_layout, texture);
                    self.materials.insert(handle, group);
                }
                None => log::warn!("Texture {:?} not found; drawing untextured", handle),
            }
        }
    }

    /// Sets the pipeline and all three bind groups for one draw.
    pub(crate) fn bind(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        key: PipelineKey,
        objects: &ObjectBuffers,
        draw_offset: u32,
        texture: Option<Handle<Texture>>,
    ) {
        let Some(pipeline) = self.pipelines.get(&key) else {
            return;
        };
        let material = texture
            .and_then(|handle| self.materials.get(&handle))
            .unwrap_or(&self.default_material);

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        pass.set_bind_group(1, &objects.bind_group, &[draw_offset]);
        pass.set_bind_group(2, material, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_uniforms_layout() {
        assert_eq!(mem::size_of::<FrameUniforms>(), 416);
        assert_eq!(mem::size_of::<FrameUniforms>() % 16, 0);
    }

    #[test]
    fn bias_interpolates_by_n_dot_l() {
        assert_eq!(pcf_bias(0.0, 1.0, 4.0), 4.0);
        assert_eq!(pcf_bias(1.0, 1.0, 4.0), 1.0);
        assert_eq!(pcf_bias(0.5, 1.0, 4.0), 2.5);
        assert_eq!(pcf_bias(-3.0, 1.0, 4.0), 4.0);
    }

    #[test]
    fn blend_is_continuous_across_splits() {
        let splits = [20.0, 60.0, 150.0];
        let sample = |i: usize| [0.0, 0.5, 1.0][i];
        let mut previous = shadow_cascade_blend(0.0, &splits, 0.15, sample);
        let mut depth = 0.0;
        while depth < 200.0 {
            depth += 0.01;
            let value = shadow_cascade_blend(depth, &splits, 0.15, sample);
            assert!(
                (value - previous).abs() < 0.01,
                "jump at {depth}: {previous} -> {value}"
            );
            previous = value;
        }
        assert_eq!(previous, 1.0);
    }

    #[test]
    fn blend_uses_single_cascade_outside_bands() {
        let splits = [20.0, 60.0, 150.0];
        let sample = |i: usize| i as f32;
        assert_eq!(shadow_cascade_blend(10.0, &splits, 0.15, sample), 0.0);
        assert_eq!(shadow_cascade_blend(40.0, &splits, 0.15, sample), 1.0);
        assert_eq!(shadow_cascade_blend(100.0, &splits, 0.15, sample), 2.0);
        let mid = shadow_cascade_blend(20.0, &splits, 0.15, sample);
        assert!((mid - 0.5).abs() < 1e-6);
    }

    #[test]
    fn blend_without_cascades_is_lit() {
        assert_eq!(shadow_cascade_blend(5.0, &[], 0.15, |_| 0.0), 1.0);
        assert_eq!(shadow_cascade_blend(500.0, &[10.0], 0.15, |_| 0.25), 0.25);
    }

    #[test]
    fn disabled_shadows_clear_the_flag() {
        let camera = Camera::looking_at(Vec3::new(0.0, 5.0, 10.0), Vec3::ZERO);
        let light = crate::scene::LightingState::default().resolve();
        let settings = RenderSettings {
            shadows_enabled: false,
            ..RenderSettings::default()
        };
        let uniforms = FrameUniforms::build(
            &camera,
            &light,
            &[],
            settings.shadow_map_resolution,
            &settings,
        );
        assert_eq!(uniforms.material_params[3], 0.0);
        assert_eq!(uniforms.cascade_splits[3], 0.0);
        assert!((uniforms.sun_direction[3] - light.sun_strength()).abs() < 1e-6);
    }
}
