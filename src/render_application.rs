use crate::asset::Assets;
use crate::renderer::Renderer;
use crate::scene::{Camera, LightingState, SceneSnapshot};

/// Passed to [`RenderApplication::setup`] once the GPU is ready.
pub struct StartupContext<'a> {
    pub renderer: &'a Renderer,
    pub assets: &'a mut Assets,
    pub camera: &'a mut Camera,
    pub lighting: &'a mut LightingState,
}

/// Passed to [`RenderApplication::update`] before every frame.
pub struct UpdateContext<'a> {
    /// Seconds since the previous frame.
    pub dt: f32,
    /// Seconds since startup.
    pub elapsed: f32,
    pub camera: &'a mut Camera,
    pub lighting: &'a mut LightingState,
}

/// Host-side behaviour: builds the parts, moves the camera, drives the sun.
pub trait RenderApplication: 'static {
    fn name(&self) -> &str {
        "Part Renderer"
    }

    /// Called once to upload meshes and textures and place the camera.
    fn setup(&mut self, ctx: &mut StartupContext);

    /// Called every frame to advance animation and lighting.
    fn update(&mut self, ctx: &mut UpdateContext) {
        let _ = ctx;
    }

    /// The parts to draw this frame.
    fn snapshot(&self) -> SceneSnapshot;
}
