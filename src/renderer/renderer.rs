use std::iter;
use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::asset::{Assets, Mesh, Texture};
use crate::error::RendererError;
use crate::renderer::batch::{
    build_batches, build_shadow_batches, resolve_custom_meshes, PackedInstances, ShadowGeometry,
};
use crate::renderer::cascades::{build_cascades, CascadeParams};
use crate::renderer::culling::{cull_parts, CullParams, FrameStats};
use crate::renderer::internal::{DrawUniform, ObjectBuffers, RenderContext, ShadowResources};
use crate::renderer::postprocess::{sun_screen_position, PostProcess};
use crate::renderer::shading::{FrameUniforms, LitVariant, PipelineKey, ShadingPipeline};
use crate::renderer::shapes::ShapeMeshCache;
use crate::renderer::sky::{SkyPass, SkyUniform};
use crate::renderer::transparency::TransparencyCompositor;
use crate::renderer::Vertex;
use crate::scene::{
    Camera, LightingState, PartShape, RenderableKind, RenderablePart, SceneSnapshot,
};
use crate::settings::{DebugCommand, RenderSettings};

const INITIAL_INSTANCE_CAPACITY: u32 = 1024 * 10;
const INITIAL_DRAW_CAPACITY: u32 = 256;

/// A rendered frame waiting to be shown.
pub struct RenderFrame {
    pub frame: wgpu::SurfaceTexture,
    pub stats: FrameStats,
}

impl RenderFrame {
    pub fn present(self) {
        self.frame.present();
    }
}

pub struct Renderer {
    context: RenderContext,
    objects: ObjectBuffers,
    shadows: ShadowResources,
    shading: ShadingPipeline,
    sky: SkyPass,
    postprocess: PostProcess,
    shapes: ShapeMeshCache,
    settings: RenderSettings,
    last_stats: FrameStats,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, settings: RenderSettings) -> Result<Self, RendererError> {
        let settings = settings.validate();
        let context = RenderContext::new(window, &settings).await?;

        let device = &context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let objects = ObjectBuffers::new(device, INITIAL_INSTANCE_CAPACITY, INITIAL_DRAW_CAPACITY);
        let shadows = ShadowResources::new(device, &objects, settings.shadow_map_resolution);
        let shading = ShadingPipeline::new(device, &context.queue, &objects, &shadows);
        let sky = SkyPass::new(device);
        let postprocess = PostProcess::new(
            device,
            &context.queue,
            context.config.width,
            context.config.height,
            context.config.format,
        );

        if let Some(error) = device.pop_error_scope().await {
            log::error!("Renderer initialization failed: {}", error);
            return Err(RendererError::Shader {
                label: "render pipelines",
                message: error.to_string(),
            });
        }

        let mut shapes = ShapeMeshCache::new();
        shapes.ensure(device, [PartShape::Block]);

        log::info!(
            "Renderer ready: {} cascades at {}px, {:?}",
            settings.cascade_count,
            shadows.resolution(),
            context.config.present_mode
        );

        Ok(Self {
            context,
            objects,
            shadows,
            shading,
            sky,
            postprocess,
            shapes,
            settings,
            last_stats: FrameStats::default(),
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if self.context.resize(new_size) {
            self.postprocess
                .resize(&self.context.device, new_size.width, new_size.height);
            self.postprocess.invalidate();
        }
    }

    /// Reconfigures the surface after a lost or outdated frame.
    pub fn reconfigure_surface(&self) {
        self.context.reconfigure();
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn apply_debug(&mut self, command: DebugCommand) {
        self.settings.apply(command);
    }

    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn create_mesh(&self, label: &str, vertices: &[Vertex], indices: &[u32]) -> Mesh {
        Mesh::from_vertices(&self.context.device, label, vertices, indices)
    }

    pub fn create_texture_rgba8(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        label: Option<&str>,
    ) -> Texture {
        Texture::from_rgba8(
            &self.context.device,
            &self.context.queue,
            pixels,
            width,
            height,
            label,
        )
    }

    /// Draws one snapshot: shadows, sky, opaque batches, custom meshes, transparency, post.
    pub fn render_frame(
        &mut self,
        camera: &Camera,
        snapshot: &SceneSnapshot,
        lighting: &LightingState,
        assets: &Assets,
    ) -> Result<RenderFrame, RendererError> {
        let camera = camera.with_aspect(self.context.aspect_ratio());
        let light = lighting.resolve();
        let resolved = resolve_custom_meshes(&snapshot.parts, &assets.meshes);
        let parts: &[RenderablePart] = &resolved;
        let shadows_enabled = self.settings.shadows_enabled;

        let visible = cull_parts(parts, &camera, &CullParams::from_settings(&self.settings));

        let cascades = if shadows_enabled {
            build_cascades(
                &camera,
                light.direction,
                &CascadeParams {
                    shadow_max_distance: self.settings.shadow_max_distance,
                    cascade_count: self.settings.cascade_count,
                    shadow_map_resolution: self.shadows.resolution(),
                    split_lambda: self.settings.cascade_split_lambda,
                },
            )
        } else {
            Vec::new()
        };

        let batches = build_batches(parts, &visible.opaque);
        let shadow_groups = if shadows_enabled {
            build_shadow_batches(parts, &visible.shadow_casters)
        } else {
            Vec::new()
        };
        let packed = PackedInstances::pack(&batches, &shadow_groups);

        let device = &self.context.device;
        let queue = &self.context.queue;

        let transparent_shapes = visible
            .transparent
            .iter()
            .filter_map(|item| parts.get(item.index))
            .map(|part| part.fallback_shape());
        let shadow_shapes = packed.shadow.iter().filter_map(|batch| match batch.geometry {
            ShadowGeometry::Shape(shape) => Some(shape),
            ShadowGeometry::Custom(_) => None,
        });
        self.shapes.ensure(
            device,
            packed
                .opaque
                .iter()
                .map(|batch| batch.shape)
                .chain(shadow_shapes)
                .chain(transparent_shapes),
        );

        let textures = batches
            .custom
            .iter()
            .filter_map(|draw| draw.texture)
            .chain(visible.transparent.iter().filter_map(|item| {
                match parts.get(item.index).map(|part| part.kind) {
                    Some(RenderableKind::CustomMesh(custom)) => custom.texture,
                    _ => None,
                }
            }));
        self.shading.prepare_textures(device, assets, textures);

        // Custom meshes take the first draw slots, transparent parts follow.
        let mut draws: Vec<DrawUniform> = batches
            .custom
            .iter()
            .map(|draw| DrawUniform::new(draw.model, draw.color))
            .collect();
        draws.extend(visible.transparent.iter().filter_map(|item| {
            parts
                .get(item.index)
                .map(|part| DrawUniform::new(part.model_matrix(), part.tint(item.opacity)))
        }));
        self.objects.update(&self.context, &packed.instances, &draws);

        self.shading.set_frame_uniforms(
            queue,
            &FrameUniforms::build(
                &camera,
                &light,
                &cascades,
                self.shadows.resolution(),
                &self.settings,
            ),
        );
        self.sky.update(queue, &SkyUniform::new(&camera, &light));
        let sun_uv = sun_screen_position(camera.view_proj(), light.to_sun());
        self.postprocess
            .update(queue, &camera, &self.settings, sun_uv);

        let frame = self.context.surface.get_current_texture()?;
        let target = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("FrameEncoder"),
        });

        let shadow_draw_calls = if cascades.is_empty() {
            0
        } else {
            self.shadows.render(
                &self.context,
                &mut encoder,
                &cascades,
                &packed.shadow,
                &self.shapes,
                assets,
                &self.objects,
            )
        };

        let mut draw_calls = 0;
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ScenePass"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: self.postprocess.scene_view(),
                        resolve_target: None,
                        depth_slice: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: self.postprocess.normal_view(),
                        resolve_target: None,
                        depth_slice: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color {
                                r: 0.5,
                                g: 1.0,
                                b: 0.5,
                                a: 1.0,
                            }),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.context.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.sky.draw(&mut pass);

            let instanced = PipelineKey {
                variant: LitVariant::Instanced,
                alpha_blend: false,
            };
            for batch in &packed.opaque {
                let Some(mesh) = self.shapes.get(batch.shape) else {
                    log::warn!("No mesh for {:?}; skipping batch", batch.shape);
                    continue;
                };
                self.shading
                    .bind(&mut pass, instanced, &self.objects, 0, None);
                mesh.bind(&mut pass);
                pass.draw_indexed(0..mesh.index_count(), 0, batch.range.clone());
                draw_calls += 1;
            }

            let single = PipelineKey {
                variant: LitVariant::Single,
                alpha_blend: false,
            };
            for (slot, draw) in batches.custom.iter().enumerate() {
                let mesh = match draw.mesh {
                    Some(handle) => assets.meshes.get(handle).or_else(|| {
                        log::warn!("Mesh {:?} not in asset cache; drawing block", handle);
                        self.shapes.get(PartShape::Block)
                    }),
                    None => self.shapes.get(PartShape::Block),
                };
                let Some(mesh) = mesh else {
                    continue;
                };
                self.shading.bind(
                    &mut pass,
                    single,
                    &self.objects,
                    self.objects.draw_offset(slot as u32),
                    draw.texture,
                );
                mesh.bind(&mut pass);
                pass.draw_indexed(0..mesh.index_count(), 0, 0..1);
                draw_calls += 1;
            }

            draw_calls += TransparencyCompositor::record(
                &mut pass,
                &self.shading,
                &self.shapes,
                assets,
                &self.objects,
                parts,
                &visible.transparent,
                batches.custom.len() as u32,
            );
        }

        self.postprocess.execute(
            &mut encoder,
            device,
            &self.context.depth.view,
            &target,
            &self.settings,
        );

        queue.submit(iter::once(encoder.finish()));

        let stats = FrameStats {
            batches: packed.opaque.len() as u32,
            instances: batches.instance_count() as u32,
            custom_meshes: batches.custom.len() as u32,
            draw_calls,
            shadow_draw_calls,
            ..FrameStats::from_visible(parts.len(), &visible)
        };
        log::debug!("{:?}", stats);
        self.last_stats = stats;

        Ok(RenderFrame { frame, stats })
    }
}
