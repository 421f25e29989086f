use glam::{Mat3, Vec3};
use log::info;
use part_renderer::asset::{Handle, Texture};
use part_renderer::render_application::{RenderApplication, StartupContext, UpdateContext};
use part_renderer::renderer::shape_mesh;
use part_renderer::scene::{
    CFrame, Camera, CustomMesh, PartShape, RenderablePart, SceneSnapshot, SunSource,
};

const START_HOURS: f32 = 9.0;
const HOURS_PER_SECOND: f32 = 0.2;
const ORBIT_RADIUS: f32 = 34.0;
const ORBIT_HEIGHT: f32 = 14.0;
const ORBIT_SPEED: f32 = 0.05;

/// Every built-in shape, a few glass parts and two custom meshes on a baseplate.
pub struct PartShowcase {
    clock_hours: f32,
    spin: f32,
    crate_mesh: CustomMesh,
    pending_mesh: CustomMesh,
}

impl PartShowcase {
    pub fn new() -> Self {
        let empty = CustomMesh {
            mesh: None,
            texture: None,
            natural_size: Vec3::ONE,
            offset: Vec3::ZERO,
        };
        Self {
            clock_hours: START_HOURS,
            spin: 0.0,
            crate_mesh: empty,
            pending_mesh: empty,
        }
    }
}

impl Default for PartShowcase {
    fn default() -> Self {
        Self::new()
    }
}

impl PartShowcase {
    fn checker_texture(ctx: &mut StartupContext) -> Handle<Texture> {
        const SIZE: u32 = 8;
        let mut pixels = Vec::with_capacity((SIZE * SIZE * 4) as usize);
        for y in 0..SIZE {
            for x in 0..SIZE {
                let value = if (x + y) % 2 == 0 { 230 } else { 60 };
                pixels.extend_from_slice(&[value, value, value, 255]);
            }
        }
        let texture = ctx
            .renderer
            .create_texture_rgba8(&pixels, SIZE, SIZE, Some("Checker"));
        ctx.assets.textures.insert(texture)
    }
}

impl RenderApplication for PartShowcase {
    fn name(&self) -> &str {
        "Part Renderer Showcase"
    }

    fn setup(&mut self, ctx: &mut StartupContext) {
        let data = shape_mesh(PartShape::Ball);
        let mesh = ctx
            .renderer
            .create_mesh("ShowcaseBall", &data.vertices, &data.indices);
        let mesh = ctx.assets.meshes.insert(mesh);
        let texture = Self::checker_texture(ctx);

        self.crate_mesh = CustomMesh {
            mesh: Some(mesh),
            texture: Some(texture),
            natural_size: Vec3::ONE,
            offset: Vec3::ZERO,
        };

        *ctx.camera = Camera::looking_at(
            Vec3::new(0.0, ORBIT_HEIGHT, ORBIT_RADIUS),
            Vec3::new(0.0, 2.0, 0.0),
        );
        ctx.lighting.sun = SunSource::ClockTime(self.clock_hours);

        info!(
            "Showcase ready: {} meshes, {} textures",
            ctx.assets.meshes.len(),
            ctx.assets.textures.len()
        );
    }

    fn update(&mut self, ctx: &mut UpdateContext) {
        self.clock_hours = (self.clock_hours + ctx.dt * HOURS_PER_SECOND).rem_euclid(24.0);
        ctx.lighting.sun = SunSource::ClockTime(self.clock_hours);
        self.spin = ctx.elapsed;

        let angle = ctx.elapsed * ORBIT_SPEED;
        let eye = Vec3::new(
            angle.sin() * ORBIT_RADIUS,
            ORBIT_HEIGHT,
            angle.cos() * ORBIT_RADIUS,
        );
        *ctx.camera = Camera {
            aspect: ctx.camera.aspect,
            ..Camera::looking_at(eye, Vec3::new(0.0, 2.0, 0.0))
        };
    }

    fn snapshot(&self) -> SceneSnapshot {
        let mut parts = Vec::new();

        parts.push(RenderablePart::primitive(
            PartShape::Block,
            CFrame::from_position(Vec3::new(0.0, -0.5, 0.0)),
            Vec3::new(160.0, 1.0, 160.0),
            Vec3::new(0.36, 0.42, 0.30),
        ));

        let palette = [
            Vec3::new(0.77, 0.16, 0.11),
            Vec3::new(0.05, 0.41, 0.67),
            Vec3::new(0.95, 0.80, 0.19),
            Vec3::new(0.29, 0.59, 0.29),
            Vec3::new(0.85, 0.85, 0.85),
        ];
        for (row, color) in palette.iter().enumerate() {
            for (column, shape) in PartShape::ALL.iter().enumerate() {
                let position = Vec3::new(
                    (column as f32 - 2.0) * 5.0,
                    1.0,
                    (row as f32 - 2.0) * 5.0,
                );
                parts.push(RenderablePart::primitive(
                    *shape,
                    CFrame::from_position(position),
                    Vec3::splat(2.0),
                    *color,
                ));
            }
        }

        let spin = Mat3::from_rotation_y(self.spin * 0.5);
        parts.push(RenderablePart::primitive(
            PartShape::Block,
            CFrame::from_position(Vec3::new(0.0, 8.0, 0.0)).with_rotation(spin),
            Vec3::new(6.0, 1.0, 1.0),
            Vec3::new(0.6, 0.3, 0.8),
        ));

        parts.push(
            RenderablePart::primitive(
                PartShape::Block,
                CFrame::from_position(Vec3::new(14.0, 3.0, 0.0)),
                Vec3::new(1.0, 6.0, 12.0),
                Vec3::new(0.6, 0.8, 1.0),
            )
            .with_transparency(0.6),
        );
        parts.push(
            RenderablePart::primitive(
                PartShape::Ball,
                CFrame::from_position(Vec3::new(-14.0, 3.0, 0.0)),
                Vec3::splat(5.0),
                Vec3::new(1.0, 0.5, 0.2),
            )
            .with_transparency(0.3),
        );
        parts.push(
            RenderablePart::primitive(
                PartShape::Block,
                CFrame::from_position(Vec3::new(0.0, 3.0, 14.0)),
                Vec3::splat(3.0),
                Vec3::ONE,
            )
            .with_transparency(1.0),
        );

        parts.push(RenderablePart::custom(
            self.crate_mesh,
            CFrame::from_position(Vec3::new(0.0, 4.0, -14.0)).with_rotation(spin),
            Vec3::splat(6.0),
            Vec3::ONE,
        ));
        parts.push(RenderablePart::custom(
            self.pending_mesh,
            CFrame::from_position(Vec3::new(8.0, 1.5, -14.0)),
            Vec3::splat(3.0),
            Vec3::new(0.9, 0.9, 0.3),
        ));

        SceneSnapshot::new(parts)
    }
}
