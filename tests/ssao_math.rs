//! Screen-space depth and position math shared by SSAO, fog and the sun shafts.
//!
//! Conventions:
//! - Right-handed view space (camera looks down -Z).
//! - Depth range is [0, 1]; near maps to 0.
//! - Fullscreen uvs have their origin at the top-left.

use glam::{Mat4, Vec2, Vec3, Vec4};
use part_renderer::renderer::postprocess::{linearize_depth, ssao_kernel, PostUniform};
use part_renderer::scene::Camera;
use part_renderer::settings::RenderSettings;
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn project_view_to_uv_depth(proj: Mat4, view_pos: Vec3) -> (Vec2, f32) {
    let clip: Vec4 = proj * view_pos.extend(1.0);
    let ndc = clip.truncate() / clip.w;
    let uv = Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    (uv, ndc.z)
}

// CPU copy of `view_position` in the post-process prelude.
fn reconstruct_view_position(uv: Vec2, depth: f32, inv_proj: Mat4) -> Vec3 {
    let ndc = Vec4::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth, 1.0);
    let view = inv_proj * ndc;
    view.truncate() / view.w
}

fn uniform_for(camera: &Camera) -> PostUniform {
    let mut rng = SmallRng::seed_from_u64(3);
    let kernel = ssao_kernel(&mut rng);
    PostUniform::new(camera, &RenderSettings::default(), &kernel, (1280, 720), None)
}

#[test]
fn reconstruction_inverts_projection() {
    let camera = Camera::default();
    let uniform = uniform_for(&camera);
    let proj = Mat4::from_cols_array_2d(&uniform.proj);
    let inv_proj = Mat4::from_cols_array_2d(&uniform.inv_proj);

    for view_pos in [
        Vec3::new(0.0, 0.0, -1.0),
        Vec3::new(2.5, -1.0, -12.0),
        Vec3::new(-30.0, 8.0, -150.0),
    ] {
        let (uv, depth) = project_view_to_uv_depth(proj, view_pos);
        let back = reconstruct_view_position(uv, depth, inv_proj);
        let tolerance = 1e-3 * view_pos.length();
        assert!(
            (back - view_pos).abs().max_element() <= tolerance,
            "{view_pos:?} came back as {back:?}"
        );
    }
}

#[test]
fn linear_depth_matches_view_distance() {
    let camera = Camera::default();
    let proj = camera.proj();
    for distance in [0.5_f32, 5.0, 40.0, 200.0] {
        let (_, depth) = project_view_to_uv_depth(proj, Vec3::new(0.0, 0.0, -distance));
        let linear = linearize_depth(depth, camera.near, camera.far);
        assert!(
            (linear - distance).abs() <= distance * 1e-3,
            "{distance} linearized to {linear}"
        );
    }
}

#[test]
fn screen_top_is_positive_view_y() {
    let camera = Camera::default();
    let inv_proj = camera.proj().inverse();
    let top = reconstruct_view_position(Vec2::new(0.5, 0.0), 0.5, inv_proj);
    let bottom = reconstruct_view_position(Vec2::new(0.5, 1.0), 0.5, inv_proj);
    assert!(top.y > 0.0 && bottom.y < 0.0);
}

#[test]
fn uniform_carries_view_matrix_for_normals() {
    let camera = Camera::looking_at(Vec3::new(4.0, 3.0, 10.0), Vec3::ZERO);
    let uniform = uniform_for(&camera);
    let view = Mat4::from_cols_array_2d(&uniform.view);
    assert!(view.abs_diff_eq(camera.view(), 1e-6));

    // world up seen from a camera pitched down still points mostly up in view space
    let up = view.transform_vector3(Vec3::Y);
    assert!(up.y > 0.8);
    assert_eq!(uniform.camera[0], camera.near);
    assert_eq!(uniform.camera[1], camera.far);
}
