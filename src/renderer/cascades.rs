//! Cascaded shadow map fitting.
//!
//! The view frustum between the camera near plane and the shadow distance is cut
//! into slices with the practical split scheme (a blend of logarithmic and
//! uniform spacing). Each slice gets an orthographic light projection fitted
//! around its eight corners, with the light-space center snapped to whole
//! shadow-map texels so shadows do not shimmer as the camera moves.

use glam::{Mat4, Vec2, Vec3};

use crate::scene::{safe_normalize, Camera, DEFAULT_SUN_DIRECTION};

/// Distance the light eye is pulled back from the slice center.
pub const LIGHT_EYE_DISTANCE: f32 = 200.0;
/// Extra depth added in front of and behind the fitted slice.
pub const DEPTH_PADDING: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeParams {
    pub shadow_max_distance: f32,
    pub cascade_count: u32,
    pub shadow_map_resolution: u32,
    pub split_lambda: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cascade {
    pub view_proj: Mat4,
    /// World-space size of one shadow-map texel.
    pub texel_world_size: f32,
    pub split_near: f32,
    pub split_far: f32,
}

/// Interior split distances for `count` cascades over `[near, far]`.
pub fn compute_cascade_splits(near: f32, far: f32, lambda: f32, count: u32) -> Vec<f32> {
    let count = count.max(1);
    let near = near.max(1e-4);
    let far = far.max(near);
    let lambda = lambda.clamp(0.0, 1.0);

    (1..count)
        .map(|i| {
            let s = i as f32 / count as f32;
            let log = near * (far / near).powf(s);
            let uniform = near + (far - near) * s;
            lambda * log + (1.0 - lambda) * uniform
        })
        .collect()
}

/// Contiguous `(near, far)` ranges, one per cascade, ending exactly at `far`.
pub fn cascade_ranges(near: f32, far: f32, lambda: f32, count: u32) -> Vec<(f32, f32)> {
    let splits = compute_cascade_splits(near, far, lambda, count);
    let mut ranges = Vec::with_capacity(splits.len() + 1);
    let mut start = near;
    for split in splits.into_iter().chain(std::iter::once(far)) {
        ranges.push((start, split));
        start = split;
    }
    ranges
}

/// World-space corners of the camera frustum between two view depths.
///
/// Order: near top-right, near top-left, near bottom-right, near bottom-left,
/// then the same four on the far plane.
pub fn frustum_slice_corners(camera: &Camera, slice_near: f32, slice_far: f32) -> [Vec3; 8] {
    let (forward, right, up) = camera.basis();
    let tan_half = (camera.fov_y_radians * 0.5).tan();
    let aspect = camera.aspect.max(1e-4);

    let mut corners = [Vec3::ZERO; 8];
    for (plane, distance) in [slice_near, slice_far].into_iter().enumerate() {
        let center = camera.position + forward * distance;
        let half_h = tan_half * distance;
        let half_w = half_h * aspect;
        let base = plane * 4;
        corners[base] = center + up * half_h + right * half_w;
        corners[base + 1] = center + up * half_h - right * half_w;
        corners[base + 2] = center - up * half_h + right * half_w;
        corners[base + 3] = center - up * half_h - right * half_w;
    }
    corners
}

/// Snaps a light-space center down to the texel grid.
///
/// Values already on the grid (within float noise) are kept, which makes the
/// operation idempotent.
pub fn snap_to_texel(center: Vec2, texel: Vec2) -> Vec2 {
    Vec2::new(snap_axis(center.x, texel.x), snap_axis(center.y, texel.y))
}

fn snap_axis(value: f32, texel: f32) -> f32 {
    if !(texel > 0.0) || !texel.is_finite() || !value.is_finite() {
        return value;
    }
    let q = value / texel;
    let nearest = q.round();
    let k = if (q - nearest).abs() <= 1e-4 * nearest.abs().max(1.0) {
        nearest
    } else {
        q.floor()
    };
    k * texel
}

/// Up vector for a light view that is never parallel to the light direction.
pub fn light_up_vector(light_dir: Vec3) -> Vec3 {
    if Vec3::Y.dot(light_dir).abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// Fits one orthographic light camera around a frustum slice.
pub fn build_cascade(
    camera: &Camera,
    light_dir: Vec3,
    slice_near: f32,
    slice_far: f32,
    resolution: u32,
) -> Cascade {
    let light_dir = safe_normalize(light_dir, DEFAULT_SUN_DIRECTION);
    let up = light_up_vector(light_dir);
    let resolution = resolution.max(1) as f32;
    // shadow maps are square
    let target_aspect = 1.0;

    let corners = frustum_slice_corners(camera, slice_near, slice_far);

    // Rotation-only light basis: a fixed origin keeps the texel grid stable.
    let basis = Mat4::look_to_rh(Vec3::ZERO, light_dir, up);
    let (min, max) = light_space_bounds(&basis, &corners);

    let half_w = 0.5 * (max.x - min.x);
    let half_h = 0.5 * (max.y - min.y);
    let fit_half_y = half_h.max(half_w / target_aspect).max(1e-3);
    // One texel of border on each side absorbs the snap below, which can pull
    // the center back by up to a texel.
    let ortho_half_y = fit_half_y * resolution / (resolution - 2.0).max(1.0);
    let ortho_half_x = ortho_half_y * target_aspect;

    let texel = Vec2::new(2.0 * ortho_half_x, 2.0 * ortho_half_y) / resolution;
    let texel_world_size = texel.x.max(texel.y);

    let center_ls = (min + max) * 0.5;
    let snapped = snap_to_texel(center_ls.truncate(), texel);
    let snapped_center = basis
        .inverse()
        .transform_point3(snapped.extend(center_ls.z));

    let eye = snapped_center - light_dir * LIGHT_EYE_DISTANCE;
    let view = Mat4::look_at_rh(eye, snapped_center, up);
    let (view_min, view_max) = light_space_bounds(&view, &corners);

    // right-handed view space looks down -Z
    let z_near = -view_max.z - DEPTH_PADDING;
    let z_far = -view_min.z + DEPTH_PADDING;
    let proj = Mat4::orthographic_rh(
        -ortho_half_x,
        ortho_half_x,
        -ortho_half_y,
        ortho_half_y,
        z_near,
        z_far,
    );

    Cascade {
        view_proj: proj * view,
        texel_world_size,
        split_near: slice_near,
        split_far: slice_far,
    }
}

fn light_space_bounds(view: &Mat4, corners: &[Vec3; 8]) -> (Vec3, Vec3) {
    corners.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), corner| {
            let p = view.transform_point3(*corner);
            (min.min(p), max.max(p))
        },
    )
}

/// Builds every cascade for this frame, ordered near to far.
pub fn build_cascades(camera: &Camera, light_dir: Vec3, params: &CascadeParams) -> Vec<Cascade> {
    let near = camera.near.max(1e-4);
    let far = params.shadow_max_distance.max(near + 1e-3);
    cascade_ranges(near, far, params.split_lambda, params.cascade_count)
        .into_iter()
        .map(|(slice_near, slice_far)| {
            build_cascade(
                camera,
                light_dir,
                slice_near,
                slice_far,
                params.shadow_map_resolution,
            )
        })
        .collect()
}

/// Projects a world position into a cascade's shadow-map space.
///
/// Returns `(u, v, depth)` with `u, v` in texture coordinates (origin top-left)
/// and depth in `[0, 1]` for points inside the light volume.
pub fn project_to_shadow_map(cascade: &Cascade, world: Vec3) -> Vec3 {
    let clip = cascade.view_proj * world.extend(1.0);
    let ndc = clip.truncate() / clip.w;
    Vec3::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5, ndc.z)
}
