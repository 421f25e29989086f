pub mod camera;
pub mod lighting;
pub mod part;

pub use camera::Camera;
pub use lighting::{
    sun_direction_from_clock, DirectionalLight, LightingState, SkyColors, SunSource,
    DEFAULT_SUN_DIRECTION,
};
pub use part::{CFrame, CustomMesh, PartShape, RenderableKind, RenderablePart, SceneSnapshot};

use glam::Vec3;

/// Normalises `vec`, returning `fallback` when it is too short to have a direction.
pub fn safe_normalize(vec: Vec3, fallback: Vec3) -> Vec3 {
    if vec.is_finite() && vec.length_squared() > 1e-12 {
        vec.normalize()
    } else {
        fallback
    }
}
