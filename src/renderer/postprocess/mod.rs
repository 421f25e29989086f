pub mod math;

use std::mem;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};
use rand::rngs::SmallRng;
use rand::SeedableRng;

pub use math::{
    linearize_depth, ssao_kernel, ssao_noise, sun_screen_position, NOISE_TEXTURE_SIZE,
    SSAO_KERNEL_SIZE,
};

use crate::renderer::shading::{HDR_FORMAT, NORMAL_FORMAT};
use crate::renderer::PipelineBuilder;
use crate::scene::Camera;
use crate::settings::RenderSettings;

const SSAO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;
const BLOOM_FORMAT: wgpu::TextureFormat = HDR_FORMAT;
const KERNEL_SEED: u64 = 0x55a0_c0de;

const POST_COMMON: &str = include_str!("../../shader/post_common.wgsl");

/// Shader source of every post stage, with the shared prelude prepended.
pub fn stage_sources() -> [(&'static str, String); 4] {
    [
        (
            "SsaoShader",
            format!("{}\n{}", POST_COMMON, include_str!("../../shader/ssao.wgsl")),
        ),
        (
            "BlurShader",
            format!("{}\n{}", POST_COMMON, include_str!("../../shader/blur.wgsl")),
        ),
        (
            "BloomExtractShader",
            format!("{}\n{}", POST_COMMON, include_str!("../../shader/bloom.wgsl")),
        ),
        (
            "CompositeShader",
            format!("{}\n{}", POST_COMMON, include_str!("../../shader/composite.wgsl")),
        ),
    ]
}

// align(16) keeps the uniform buffer size matching WGSL uniform layout rules.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PostUniform {
    pub proj: [[f32; 4]; 4],
    pub inv_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub kernel: [[f32; 4]; SSAO_KERNEL_SIZE],
    /// radius, bias, strength
    pub ssao: [f32; 4],
    pub noise_scale: [f32; 4],
    /// bloom threshold, fog on, volumetric on, volumetric strength
    pub effects: [f32; 4],
    /// rgb color, w density
    pub fog: [f32; 4],
    /// near, far, exposure
    pub camera: [f32; 4],
    pub sun: [f32; 4],
}

impl PostUniform {
    pub fn new(
        camera: &Camera,
        settings: &RenderSettings,
        kernel: &[Vec4; SSAO_KERNEL_SIZE],
        size: (u32, u32),
        sun_uv: Option<Vec2>,
    ) -> Self {
        let proj = camera.proj();
        let volumetric = settings.volumetric_enabled && sun_uv.is_some();
        let sun = sun_uv.unwrap_or(Vec2::splat(0.5));
        let [r, g, b] = settings.fog_color;

        Self {
            proj: proj.to_cols_array_2d(),
            inv_proj: proj.inverse().to_cols_array_2d(),
            view: camera.view().to_cols_array_2d(),
            kernel: kernel.map(|sample| sample.to_array()),
            ssao: [
                settings.ssao_radius,
                settings.ssao_bias,
                settings.ssao_strength,
                0.0,
            ],
            noise_scale: [
                size.0 as f32 / NOISE_TEXTURE_SIZE as f32,
                size.1 as f32 / NOISE_TEXTURE_SIZE as f32,
                0.0,
                0.0,
            ],
            effects: [
                settings.bloom_threshold,
                if settings.fog_enabled { 1.0 } else { 0.0 },
                if volumetric { 1.0 } else { 0.0 },
                settings.volumetric_strength,
            ],
            fog: [r, g, b, settings.fog_density],
            camera: [camera.near, camera.far, settings.exposure, 0.0],
            sun: [sun.x, sun.y, 0.0, 0.0],
        }
    }
}

struct TextureBundle {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl TextureBundle {
    fn color(
        device: &wgpu::Device,
        size: wgpu::Extent3d,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Every size-dependent target, recreated together on resize.
struct Targets {
    scene: TextureBundle,
    normal: TextureBundle,
    ssao: TextureBundle,
    ssao_blurred: TextureBundle,
    bloom: TextureBundle,
    bloom_blurred: TextureBundle,
}

impl Targets {
    fn new(device: &wgpu::Device, size: wgpu::Extent3d) -> Self {
        let half = wgpu::Extent3d {
            width: (size.width / 2).max(1),
            height: (size.height / 2).max(1),
            depth_or_array_layers: 1,
        };
        Self {
            scene: TextureBundle::color(device, size, HDR_FORMAT, "SceneColor"),
            normal: TextureBundle::color(device, size, NORMAL_FORMAT, "SceneNormal"),
            ssao: TextureBundle::color(device, size, SSAO_FORMAT, "SsaoTexture"),
            ssao_blurred: TextureBundle::color(device, size, SSAO_FORMAT, "SsaoBlurred"),
            bloom: TextureBundle::color(device, half, BLOOM_FORMAT, "BloomExtract"),
            bloom_blurred: TextureBundle::color(device, half, BLOOM_FORMAT, "BloomBlurred"),
        }
    }
}

struct StageBindGroups {
    ssao: wgpu::BindGroup,
    ssao_blur: wgpu::BindGroup,
    bloom_extract: wgpu::BindGroup,
    bloom_blur: wgpu::BindGroup,
    composite: wgpu::BindGroup,
}

/// SSAO, bloom and the final composite with fog, light shafts and tone mapping.
pub(crate) struct PostProcess {
    targets: Targets,
    size: wgpu::Extent3d,
    _sampler_linear: wgpu::Sampler,
    _sampler_noise: wgpu::Sampler,
    _noise_texture: wgpu::Texture,
    noise_view: wgpu::TextureView,
    kernel: [Vec4; SSAO_KERNEL_SIZE],
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    ssao_layout: wgpu::BindGroupLayout,
    source_layout: wgpu::BindGroupLayout,
    composite_layout: wgpu::BindGroupLayout,
    ssao_pipeline: wgpu::RenderPipeline,
    ssao_blur_pipeline: wgpu::RenderPipeline,
    bloom_extract_pipeline: wgpu::RenderPipeline,
    bloom_blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    bind_groups: Option<StageBindGroups>,
}

impl PostProcess {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        output_format: wgpu::TextureFormat,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let targets = Targets::new(device, size);

        let sampler_linear = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("PostLinearSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let sampler_noise = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("SsaoNoiseSampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut rng = SmallRng::seed_from_u64(KERNEL_SEED);
        let kernel = ssao_kernel(&mut rng);
        let noise_texture = Self::create_noise_texture(device, queue, &ssao_noise(&mut rng));
        let noise_view = noise_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let uniform_size = mem::size_of::<PostUniform>() as u64;
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PostUniformLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(uniform_size),
                    },
                    count: None,
                },
                sampler_entry(1),
                sampler_entry(2),
            ],
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("PostUniformBuffer"),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("PostUniformBindGroup"),
            layout: &uniform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler_linear),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler_noise),
                },
            ],
        });

        let ssao_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SsaoLayout"),
            entries: &[depth_entry(0), texture_entry(1), texture_entry(2)],
        });
        let source_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PostSourceLayout"),
            entries: &[texture_entry(0)],
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("CompositeLayout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                depth_entry(3),
            ],
        });

        let [ssao_src, blur_src, bloom_src, composite_src] = stage_sources();
        let ssao_shader = create_module(device, &ssao_src);
        let blur_shader = create_module(device, &blur_src);
        let bloom_shader = create_module(device, &bloom_src);
        let composite_shader = create_module(device, &composite_src);

        let ssao_pipeline_layout =
            pipeline_layout(device, "SsaoPipelineLayout", &uniform_layout, &ssao_layout);
        let source_pipeline_layout =
            pipeline_layout(device, "PostSourcePipelineLayout", &uniform_layout, &source_layout);
        let composite_pipeline_layout =
            pipeline_layout(device, "CompositePipelineLayout", &uniform_layout, &composite_layout);

        let ssao_pipeline = fullscreen_pipeline(
            device,
            &ssao_pipeline_layout,
            &ssao_shader,
            "fs_ssao",
            SSAO_FORMAT,
            "SsaoPipeline",
        );
        let ssao_blur_pipeline = fullscreen_pipeline(
            device,
            &source_pipeline_layout,
            &blur_shader,
            "fs_blur",
            SSAO_FORMAT,
            "SsaoBlurPipeline",
        );
        let bloom_extract_pipeline = fullscreen_pipeline(
            device,
            &source_pipeline_layout,
            &bloom_shader,
            "fs_bloom_extract",
            BLOOM_FORMAT,
            "BloomExtractPipeline",
        );
        let bloom_blur_pipeline = fullscreen_pipeline(
            device,
            &source_pipeline_layout,
            &blur_shader,
            "fs_blur",
            BLOOM_FORMAT,
            "BloomBlurPipeline",
        );
        let composite_pipeline = fullscreen_pipeline(
            device,
            &composite_pipeline_layout,
            &composite_shader,
            "fs_composite",
            output_format,
            "CompositePipeline",
        );

        log::info!(
            "Post-process targets created at {}x{}",
            size.width,
            size.height
        );

        Self {
            targets,
            size,
            _sampler_linear: sampler_linear,
            _sampler_noise: sampler_noise,
            _noise_texture: noise_texture,
            noise_view,
            kernel,
            uniform_buffer,
            uniform_bind_group,
            ssao_layout,
            source_layout,
            composite_layout,
            ssao_pipeline,
            ssao_blur_pipeline,
            bloom_extract_pipeline,
            bloom_blur_pipeline,
            composite_pipeline,
            bind_groups: None,
        }
    }

    pub(crate) fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        if size == self.size {
            return;
        }
        self.size = size;
        self.targets = Targets::new(device, size);
        self.bind_groups = None;
        log::info!("Post-process targets resized to {}x{}", size.width, size.height);
    }

    /// Drops cached bind groups; call whenever the scene depth view is recreated.
    pub(crate) fn invalidate(&mut self) {
        self.bind_groups = None;
    }

    pub(crate) fn scene_view(&self) -> &wgpu::TextureView {
        &self.targets.scene.view
    }

    pub(crate) fn normal_view(&self) -> &wgpu::TextureView {
        &self.targets.normal.view
    }

    pub(crate) fn update(
        &self,
        queue: &wgpu::Queue,
        camera: &Camera,
        settings: &RenderSettings,
        sun_uv: Option<Vec2>,
    ) {
        let uniform = PostUniform::new(
            camera,
            settings,
            &self.kernel,
            (self.size.width, self.size.height),
            sun_uv,
        );
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    /// Records SSAO, bloom and the composite into `target`.
    pub(crate) fn execute(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        depth_view: &wgpu::TextureView,
        target: &wgpu::TextureView,
        settings: &RenderSettings,
    ) {
        self.ensure_bind_groups(device, depth_view);
        let Some(groups) = self.bind_groups.as_ref() else {
            return;
        };

        // Disabled stages still clear their output so the composite sees identity values.
        if settings.ssao_enabled {
            self.fullscreen_pass(
                encoder,
                "SsaoPass",
                &self.targets.ssao.view,
                wgpu::Color::WHITE,
                Some((&self.ssao_pipeline, &groups.ssao)),
            );
            self.fullscreen_pass(
                encoder,
                "SsaoBlurPass",
                &self.targets.ssao_blurred.view,
                wgpu::Color::WHITE,
                Some((&self.ssao_blur_pipeline, &groups.ssao_blur)),
            );
        } else {
            self.fullscreen_pass(
                encoder,
                "SsaoClear",
                &self.targets.ssao_blurred.view,
                wgpu::Color::WHITE,
                None,
            );
        }

        if settings.bloom_enabled {
            self.fullscreen_pass(
                encoder,
                "BloomExtractPass",
                &self.targets.bloom.view,
                wgpu::Color::BLACK,
                Some((&self.bloom_extract_pipeline, &groups.bloom_extract)),
            );
            self.fullscreen_pass(
                encoder,
                "BloomBlurPass",
                &self.targets.bloom_blurred.view,
                wgpu::Color::BLACK,
                Some((&self.bloom_blur_pipeline, &groups.bloom_blur)),
            );
        } else {
            self.fullscreen_pass(
                encoder,
                "BloomClear",
                &self.targets.bloom_blurred.view,
                wgpu::Color::BLACK,
                None,
            );
        }

        self.fullscreen_pass(
            encoder,
            "CompositePass",
            target,
            wgpu::Color::BLACK,
            Some((&self.composite_pipeline, &groups.composite)),
        );
    }
}

impl PostProcess {
    fn fullscreen_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        view: &wgpu::TextureView,
        clear: wgpu::Color,
        draw: Option<(&wgpu::RenderPipeline, &wgpu::BindGroup)>,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if let Some((pipeline, bind_group)) = draw {
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }

    fn ensure_bind_groups(&mut self, device: &wgpu::Device, depth_view: &wgpu::TextureView) {
        if self.bind_groups.is_some() {
            return;
        }

        let source = |label, view: &wgpu::TextureView| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.source_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                }],
            })
        };

        let ssao = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SsaoBindGroup"),
            layout: &self.ssao_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.targets.normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&self.noise_view),
                },
            ],
        });

        let composite = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("CompositeBindGroup"),
            layout: &self.composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.targets.scene.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.targets.ssao_blurred.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&self.targets.bloom_blurred.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(depth_view),
                },
            ],
        });

        let groups = StageBindGroups {
            ssao,
            ssao_blur: source("SsaoBlurBindGroup", &self.targets.ssao.view),
            bloom_extract: source("BloomExtractBindGroup", &self.targets.scene.view),
            bloom_blur: source("BloomBlurBindGroup", &self.targets.bloom.view),
            composite,
        };
        self.bind_groups = Some(groups);
    }

    fn create_noise_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texels: &[[u8; 4]],
    ) -> wgpu::Texture {
        let size = wgpu::Extent3d {
            width: NOISE_TEXTURE_SIZE,
            height: NOISE_TEXTURE_SIZE,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("SsaoNoiseTexture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * NOISE_TEXTURE_SIZE),
                rows_per_image: Some(NOISE_TEXTURE_SIZE),
            },
            size,
        );

        texture
    }
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    entry: &str,
    format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::RenderPipeline {
    PipelineBuilder::new(device, layout, shader)
        .with_label(label)
        .with_fragment_entry(entry)
        .with_no_culling()
        .with_color_target(format, None)
        .build()
}

fn create_module(device: &wgpu::Device, (label, source): &(&str, String)) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(*label),
        source: wgpu::ShaderSource::Wgsl(source.as_str().into()),
    })
}

fn pipeline_layout(
    device: &wgpu::Device,
    label: &str,
    uniforms: &wgpu::BindGroupLayout,
    stage: &wgpu::BindGroupLayout,
) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[uniforms, stage],
        push_constant_ranges: &[],
    })
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn depth_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Depth,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}
