//! Per-frame visibility: splits the snapshot into opaque, translucent and
//! shadow-casting sets.

use glam::Vec3;

use crate::renderer::transparency::{sort_back_to_front, TransparentItem};
use crate::scene::{Camera, RenderablePart};
use crate::settings::RenderSettings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullParams {
    pub max_draw_distance: f32,
    pub shadow_max_distance: f32,
    pub cone_culling: bool,
    pub fov_padding_radians: f32,
}

impl CullParams {
    pub fn from_settings(settings: &RenderSettings) -> Self {
        Self {
            max_draw_distance: settings.max_draw_distance,
            shadow_max_distance: settings.shadow_max_distance,
            cone_culling: settings.cone_culling,
            fov_padding_radians: settings.fov_padding_degrees.to_radians(),
        }
    }
}

/// Indices into the snapshot, grouped by how each part is drawn this frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibleSet {
    pub opaque: Vec<usize>,
    /// Already sorted back to front.
    pub transparent: Vec<TransparentItem>,
    pub shadow_casters: Vec<usize>,
    pub culled: usize,
}

/// Counters for one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub parts: u32,
    pub culled: u32,
    pub opaque: u32,
    pub transparent: u32,
    pub shadow_casters: u32,
    pub batches: u32,
    pub instances: u32,
    pub custom_meshes: u32,
    pub draw_calls: u32,
    pub shadow_draw_calls: u32,
}

impl FrameStats {
    pub fn from_visible(parts: usize, visible: &VisibleSet) -> Self {
        Self {
            parts: parts as u32,
            culled: visible.culled as u32,
            opaque: visible.opaque.len() as u32,
            transparent: visible.transparent.len() as u32,
            shadow_casters: visible.shadow_casters.len() as u32,
            ..Self::default()
        }
    }
}

/// Classifies every part of the snapshot.
///
/// Fully transparent parts are dropped entirely. Parts past the draw distance
/// cast no shadows either; within it, casters are chosen by distance only so
/// that off-screen geometry still shadows the view.
pub fn cull_parts(parts: &[RenderablePart], camera: &Camera, params: &CullParams) -> VisibleSet {
    let mut visible = VisibleSet::default();
    let max_sq = params.max_draw_distance * params.max_draw_distance;
    let shadow_sq = params.shadow_max_distance * params.shadow_max_distance;
    let cone = params
        .cone_culling
        .then(|| ViewCone::new(camera, params.fov_padding_radians));

    for (index, part) in parts.iter().enumerate() {
        if part.is_invisible() {
            visible.culled += 1;
            continue;
        }

        let to_part = part.position() - camera.position;
        let distance_sq = to_part.length_squared();

        if distance_sq > max_sq {
            visible.culled += 1;
            continue;
        }
        if distance_sq <= shadow_sq {
            visible.shadow_casters.push(index);
        }
        if let Some(cone) = &cone {
            if !cone.contains(to_part, part.bounding_radius()) {
                visible.culled += 1;
                continue;
            }
        }

        if part.is_opaque() {
            visible.opaque.push(index);
        } else {
            visible.transparent.push(TransparentItem {
                index,
                distance_sq,
                opacity: part.opacity(),
            });
        }
    }

    sort_back_to_front(&mut visible.transparent);
    visible
}

/// Padded cone around the view direction covering the frustum diagonal.
#[derive(Debug, Clone, Copy)]
pub struct ViewCone {
    forward: Vec3,
    half_angle: f32,
}

impl ViewCone {
    pub fn new(camera: &Camera, padding: f32) -> Self {
        let tan_half_y = (camera.fov_y_radians * 0.5).tan();
        let aspect = camera.aspect.max(1e-4);
        let diagonal = (tan_half_y * (1.0 + aspect * aspect).sqrt()).atan();
        Self {
            forward: camera.direction(),
            half_angle: diagonal + padding.max(0.0),
        }
    }

    /// Sphere test: inside when any part of the sphere falls within the cone.
    pub fn contains(&self, to_center: Vec3, radius: f32) -> bool {
        let distance = to_center.length();
        if distance <= radius || distance <= f32::EPSILON {
            return true;
        }
        let cos = (to_center.dot(self.forward) / distance).clamp(-1.0, 1.0);
        let angle = cos.acos();
        let angular_radius = (radius / distance).min(1.0).asin();
        angle <= self.half_angle + angular_radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{CFrame, PartShape};

    fn block_at(position: Vec3) -> RenderablePart {
        RenderablePart::primitive(
            PartShape::Block,
            CFrame::from_position(position),
            Vec3::ONE,
            Vec3::ONE,
        )
    }

    fn params() -> CullParams {
        CullParams {
            max_draw_distance: 100.0,
            shadow_max_distance: 50.0,
            cone_culling: false,
            fov_padding_radians: 20f32.to_radians(),
        }
    }

    fn origin_camera() -> Camera {
        Camera::looking_at(Vec3::ZERO, Vec3::NEG_Z)
    }

    #[test]
    fn invisible_parts_are_dropped_everywhere() {
        let parts = [block_at(Vec3::new(0.0, 0.0, -5.0)).with_transparency(1.0)];
        let visible = cull_parts(&parts, &origin_camera(), &params());
        assert!(visible.opaque.is_empty());
        assert!(visible.transparent.is_empty());
        assert!(visible.shadow_casters.is_empty());
        assert_eq!(visible.culled, 1);
    }

    #[test]
    fn distance_limits_drawing_and_shadows_separately() {
        let parts = [
            block_at(Vec3::new(0.0, 0.0, -10.0)),
            block_at(Vec3::new(0.0, 0.0, -75.0)),
            block_at(Vec3::new(0.0, 0.0, -150.0)),
        ];
        let visible = cull_parts(&parts, &origin_camera(), &params());
        assert_eq!(visible.opaque, vec![0, 1]);
        assert_eq!(visible.shadow_casters, vec![0]);
        assert_eq!(visible.culled, 1);
    }

    #[test]
    fn parts_past_draw_distance_cast_no_shadows() {
        let parts = [
            block_at(Vec3::new(0.0, 0.0, -20.0)),
            block_at(Vec3::new(0.0, 0.0, -40.0)),
        ];
        let visible = cull_parts(
            &parts,
            &origin_camera(),
            &CullParams {
                max_draw_distance: 30.0,
                ..params()
            },
        );
        assert_eq!(visible.opaque, vec![0]);
        assert_eq!(visible.shadow_casters, vec![0]);
        assert_eq!(visible.culled, 1);
    }

    #[test]
    fn parts_behind_camera_survive_without_cone_test() {
        let parts = [block_at(Vec3::new(0.0, 0.0, 10.0))];
        let visible = cull_parts(&parts, &origin_camera(), &params());
        assert_eq!(visible.opaque, vec![0]);
    }

    #[test]
    fn cone_test_rejects_parts_behind_camera() {
        let parts = [
            block_at(Vec3::new(0.0, 0.0, 10.0)),
            block_at(Vec3::new(0.0, 0.0, -10.0)),
        ];
        let visible = cull_parts(
            &parts,
            &origin_camera(),
            &CullParams {
                cone_culling: true,
                ..params()
            },
        );
        assert_eq!(visible.opaque, vec![1]);
        // shadow casters ignore the cone
        assert_eq!(visible.shadow_casters, vec![0, 1]);
    }

    #[test]
    fn cone_keeps_large_parts_overlapping_the_edge() {
        let cone = ViewCone::new(&origin_camera(), 0.0);
        let beside = Vec3::new(10.0, 0.0, 0.0);
        assert!(!cone.contains(beside, 0.5));
        assert!(cone.contains(beside, 9.0));
        assert!(cone.contains(Vec3::ZERO, 0.0));
    }

    #[test]
    fn translucent_parts_are_sorted_far_to_near() {
        let parts = [
            block_at(Vec3::new(0.0, 0.0, -5.0)).with_transparency(0.5),
            block_at(Vec3::new(0.0, 0.0, -10.0)).with_transparency(0.5),
            block_at(Vec3::new(0.0, 0.0, -1.0)),
        ];
        let visible = cull_parts(&parts, &origin_camera(), &params());
        let order: Vec<usize> = visible.transparent.iter().map(|t| t.index).collect();
        assert_eq!(order, vec![1, 0]);
        assert_eq!(visible.opaque, vec![2]);
        assert!((visible.transparent[0].opacity - 0.5).abs() < 1e-6);
    }
}
