//! Cascade fitting as the frame builder uses it: settings in, light matrices and
//! shader uniforms out.

use glam::{Vec3, Vec4};
use part_renderer::renderer::cascades::{
    build_cascades, frustum_slice_corners, project_to_shadow_map, CascadeParams,
};
use part_renderer::renderer::shading::shadow_cascade_blend;
use part_renderer::renderer::FrameUniforms;
use part_renderer::scene::{sun_direction_from_clock, Camera, LightingState, SunSource};
use part_renderer::settings::RenderSettings;

fn params_from(settings: &RenderSettings) -> CascadeParams {
    CascadeParams {
        shadow_max_distance: settings.shadow_max_distance,
        cascade_count: settings.cascade_count,
        shadow_map_resolution: settings.shadow_map_resolution,
        split_lambda: settings.cascade_split_lambda,
    }
}

fn afternoon_sun() -> Vec3 {
    sun_direction_from_clock(14.0)
}

#[test]
fn default_settings_produce_three_contiguous_cascades() {
    let settings = RenderSettings::default();
    let camera = Camera::default();
    let cascades = build_cascades(&camera, afternoon_sun(), &params_from(&settings));

    assert_eq!(cascades.len(), 3);
    assert!((cascades[0].split_near - camera.near).abs() < 1e-6);
    for pair in cascades.windows(2) {
        assert_eq!(pair[0].split_far, pair[1].split_near);
        assert!(pair[0].split_far < pair[1].split_far);
        // farther cascades cover more ground per texel
        assert!(pair[0].texel_world_size < pair[1].texel_world_size);
    }
    assert!((cascades[2].split_far - settings.shadow_max_distance).abs() < 1e-3);

    assert!((cascades[0].split_far - 40.9).abs() < 0.5, "{}", cascades[0].split_far);
    assert!((cascades[1].split_far - 92.5).abs() < 0.5, "{}", cascades[1].split_far);
}

#[test]
fn every_slice_fits_inside_its_shadow_map() {
    let settings = RenderSettings::default();
    let camera = Camera::looking_at(Vec3::new(12.0, 30.0, 40.0), Vec3::new(-5.0, 0.0, 0.0));
    let cascades = build_cascades(&camera, afternoon_sun(), &params_from(&settings));
    let slack = 1e-4;

    for cascade in &cascades {
        for corner in frustum_slice_corners(&camera, cascade.split_near, cascade.split_far) {
            let p = project_to_shadow_map(cascade, corner);
            assert!(p.x >= -slack && p.x <= 1.0 + slack, "u {} out of map", p.x);
            assert!(p.y >= -slack && p.y <= 1.0 + slack, "v {} out of map", p.y);
            assert!(p.z > 0.0 && p.z < 1.0, "depth {} outside light volume", p.z);
        }
    }
}

#[test]
fn camera_translation_moves_shadows_by_whole_texels() {
    let settings = RenderSettings::default();
    let resolution = settings.shadow_map_resolution as f32;
    let sun = afternoon_sun();
    let before = Camera::looking_at(Vec3::new(0.0, 10.0, 30.0), Vec3::ZERO);
    let offset = Vec3::new(3.37, 0.0, 1.91);
    let after = Camera {
        position: before.position + offset,
        ..before
    };

    let a = build_cascades(&before, sun, &params_from(&settings));
    let b = build_cascades(&after, sun, &params_from(&settings));
    let probe = Vec3::new(2.0, 0.5, -4.0);

    for (ca, cb) in a.iter().zip(&b) {
        assert!((ca.texel_world_size - cb.texel_world_size).abs() < 1e-4);
        let shift = (project_to_shadow_map(cb, probe) - project_to_shadow_map(ca, probe))
            .truncate()
            * resolution;
        let fractional = (shift - shift.round()).abs();
        assert!(
            fractional.max_element() < 0.05,
            "shift {shift:?} is not a whole number of texels"
        );
    }
}

#[test]
fn frame_uniforms_carry_cascade_splits() {
    let settings = RenderSettings::default();
    let camera = Camera::default();
    let lighting = LightingState {
        sun: SunSource::ClockTime(14.0),
        ..LightingState::default()
    };
    let light = lighting.resolve();
    let cascades = build_cascades(&camera, light.direction, &params_from(&settings));
    let uniforms = FrameUniforms::build(
        &camera,
        &light,
        &cascades,
        settings.shadow_map_resolution,
        &settings,
    );

    assert_eq!(uniforms.cascade_splits[3], 3.0);
    for (i, cascade) in cascades.iter().enumerate() {
        assert_eq!(uniforms.cascade_splits[i], cascade.split_far);
        assert_eq!(
            uniforms.light_view_proj[i],
            cascade.view_proj.to_cols_array_2d()
        );
        assert!(uniforms.normal_bias[i] > 0.0);
    }
    assert_eq!(uniforms.material_params[3], 1.0);
    assert_eq!(
        uniforms.shadow_params[1],
        settings.shadow_map_resolution as f32
    );
    assert_eq!(
        Vec4::from_array(uniforms.sun_direction).truncate(),
        light.direction
    );

    let disabled = RenderSettings {
        shadows_enabled: false,
        ..RenderSettings::default()
    };
    let uniforms = FrameUniforms::build(
        &camera,
        &light,
        &[],
        disabled.shadow_map_resolution,
        &disabled,
    );
    assert_eq!(uniforms.cascade_splits[3], 0.0);
    assert_eq!(uniforms.material_params[3], 0.0);
}

#[test]
fn blend_picks_cascade_by_depth() {
    let settings = RenderSettings::default();
    let camera = Camera::default();
    let cascades = build_cascades(&camera, afternoon_sun(), &params_from(&settings));
    let splits: Vec<f32> = cascades.iter().map(|c| c.split_far).collect();
    let sample = |i: usize| i as f32;

    assert_eq!(shadow_cascade_blend(1.0, &splits, 0.15, sample), 0.0);
    assert_eq!(shadow_cascade_blend(60.0, &splits, 0.15, sample), 1.0);
    assert_eq!(shadow_cascade_blend(250.0, &splits, 0.15, sample), 2.0);

    let at_split = shadow_cascade_blend(splits[0], &splits, 0.15, sample);
    assert!((at_split - 0.5).abs() < 1e-4, "{at_split}");
}

#[test]
fn pcf_step_follows_the_allocated_shadow_map() {
    // adapters may clamp the configured resolution to their texture limit
    let settings = RenderSettings {
        shadow_map_resolution: 8192,
        ..RenderSettings::default()
    };
    let camera = Camera::default();
    let light = LightingState::default().resolve();
    let allocated = 4096;
    let cascades = build_cascades(
        &camera,
        light.direction,
        &CascadeParams {
            shadow_map_resolution: allocated,
            ..params_from(&settings)
        },
    );
    let uniforms = FrameUniforms::build(&camera, &light, &cascades, allocated, &settings);
    assert_eq!(uniforms.shadow_params[1], allocated as f32);
}
