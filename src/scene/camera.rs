use glam::{Mat4, Vec3};

use crate::scene::safe_normalize;

/// Perspective camera as seen by the renderer for one frame.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            forward: safe_normalize(target - position, Vec3::NEG_Z),
            ..Self::default()
        }
    }

    /// Unit view direction; degenerate input falls back to -Z.
    pub fn direction(&self) -> Vec3 {
        safe_normalize(self.forward, Vec3::NEG_Z)
    }

    /// Up vector re-orthogonalised against the view direction.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = self.direction();
        let fallback_up = if forward.dot(Vec3::Y).abs() > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let right = safe_normalize(forward.cross(self.up), fallback_up.cross(forward));
        let right = safe_normalize(right, forward.any_orthonormal_vector());
        let up = right.cross(forward);
        (forward, right, up)
    }

    pub fn view(&self) -> Mat4 {
        let (forward, _, up) = self.basis();
        Mat4::look_to_rh(self.position, forward, up)
    }

    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, self.aspect.max(1e-4), self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 5.0, 20.0),
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            fov_y_radians: 70f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}
