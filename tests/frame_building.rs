use std::borrow::Cow;
use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec3, Vec4};
use part_renderer::asset::{AssetCache, Handle, Mesh};
use part_renderer::renderer::batch::{BatchKey, InstanceRaw, PackedColor, ShadowGeometry};
use part_renderer::renderer::{
    build_batches, build_shadow_batches, cull_parts, resolve_custom_meshes, CullParams,
    FrameStats, PackedInstances,
};
use part_renderer::scene::{CFrame, Camera, CustomMesh, PartShape, RenderableKind, RenderablePart};
use part_renderer::settings::RenderSettings;

fn red() -> Vec3 {
    Vec3::new(1.0, 0.0, 0.0)
}

fn block_at(position: Vec3, color: Vec3) -> RenderablePart {
    RenderablePart::primitive(
        PartShape::Block,
        CFrame::from_position(position),
        Vec3::splat(2.0),
        color,
    )
}

fn camera_at_origin() -> Camera {
    Camera::looking_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0))
}

fn default_params() -> CullParams {
    CullParams::from_settings(&RenderSettings::default())
}

#[test]
fn single_red_block_becomes_one_instance() {
    let parts = vec![block_at(Vec3::new(0.0, 0.0, -10.0), red())];
    let visible = cull_parts(&parts, &camera_at_origin(), &default_params());
    let frame = build_batches(&parts, &visible.opaque);
    let packed = PackedInstances::pack(&frame, &[]);

    assert_eq!(packed.opaque.len(), 1);
    assert_eq!(packed.opaque[0].shape, PartShape::Block);
    assert_eq!(packed.opaque[0].range, 0..1);

    let expected = InstanceRaw::new(
        Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0)) * Mat4::from_scale(Vec3::splat(2.0)),
        Vec4::new(1.0, 0.0, 0.0, 1.0),
    );
    assert_eq!(packed.instances[0], expected);
}

#[test]
fn matching_parts_share_a_batch() {
    let parts: Vec<_> = (0..50)
        .map(|i| block_at(Vec3::new(i as f32, 0.0, -20.0), red()))
        .chain((0..10).map(|i| block_at(Vec3::new(i as f32, 3.0, -20.0), Vec3::ONE)))
        .collect();
    let visible = cull_parts(&parts, &camera_at_origin(), &default_params());
    let frame = build_batches(&parts, &visible.opaque);

    assert_eq!(frame.batch_count(), 2);
    assert_eq!(frame.instance_count(), 60);

    let packed = PackedInstances::pack(&frame, &[]);
    let sizes: Vec<u32> = packed.opaque.iter().map(|b| b.range.len() as u32).collect();
    assert_eq!(sizes.iter().sum::<u32>(), 60);
    assert!(sizes.contains(&50) && sizes.contains(&10));
}

fn sorted(mut positions: Vec<[f32; 3]>) -> Vec<[f32; 3]> {
    positions.sort_by(|a, b| {
        a[0].total_cmp(&b[0])
            .then(a[1].total_cmp(&b[1]))
            .then(a[2].total_cmp(&b[2]))
    });
    positions
}

#[test]
fn batches_partition_the_opaque_parts() {
    let colors = [red(), Vec3::new(0.2, 0.6, 0.1), Vec3::ONE];
    let parts: Vec<_> = (0..200)
        .map(|i| {
            let shape = PartShape::ALL[i % PartShape::ALL.len()];
            let color = colors[(i / 7) % colors.len()];
            let position = Vec3::new(
                (i % 20) as f32 * 1.5 - 15.0,
                (i / 20) as f32,
                -30.0 - (i % 3) as f32,
            );
            let rotation = Mat3::from_rotation_y(i as f32 * 0.1);
            RenderablePart::primitive(
                shape,
                CFrame::from_position(position).with_rotation(rotation),
                Vec3::new(1.0, 2.0, 0.5),
                color,
            )
        })
        .collect();
    let visible = cull_parts(&parts, &camera_at_origin(), &default_params());
    assert_eq!(visible.opaque.len(), parts.len());
    let frame = build_batches(&parts, &visible.opaque);

    let mut expected: HashMap<BatchKey, Vec<[f32; 3]>> = HashMap::new();
    for part in &parts {
        let key = BatchKey {
            color: PackedColor::from_linear(part.color, 1.0),
            shape: part.fallback_shape(),
        };
        expected
            .entry(key)
            .or_default()
            .push(part.position().to_array());
    }
    assert_eq!(frame.batch_count(), expected.len());

    let mut all = Vec::new();
    for (key, matrices) in &frame.batches {
        let positions: Vec<[f32; 3]> = matrices
            .iter()
            .map(|m| m.w_axis.truncate().to_array())
            .collect();
        let want = expected.remove(key).expect("batch key comes from a part");
        assert_eq!(sorted(positions.clone()), sorted(want), "{key:?}");
        all.extend(positions);
    }
    assert!(expected.is_empty());

    let inputs: Vec<[f32; 3]> = parts.iter().map(|p| p.position().to_array()).collect();
    assert_eq!(sorted(all), sorted(inputs));
}

#[test]
fn stale_mesh_handles_fall_back_to_a_sized_block() {
    let meshes: AssetCache<Mesh> = AssetCache::new();
    let stale = CustomMesh {
        mesh: Some(Handle::new(7)),
        texture: None,
        natural_size: Vec3::splat(10.0),
        offset: Vec3::new(0.0, 3.0, 0.0),
    };
    let cframe = CFrame::from_position(Vec3::new(1.0, 0.0, -12.0));
    let size = Vec3::splat(2.0);
    let parts = vec![
        RenderablePart::custom(stale, cframe, size, red()),
        RenderablePart::custom(stale, cframe, size, red()).with_transparency(0.5),
    ];

    let resolved = resolve_custom_meshes(&parts, &meshes);
    assert!(matches!(resolved, Cow::Owned(_)));
    for part in resolved.iter() {
        match part.kind {
            RenderableKind::CustomMesh(custom) => assert_eq!(custom.mesh, None),
            RenderableKind::Primitive { .. } => panic!("kind changed"),
        }
        assert_eq!(part.model_matrix(), cframe.instance_matrix(size));
    }

    let visible = cull_parts(&resolved, &camera_at_origin(), &default_params());
    let frame = build_batches(&resolved, &visible.opaque);
    assert_eq!(frame.custom.len(), 1);
    assert_eq!(frame.custom[0].mesh, None);
    assert_eq!(frame.custom[0].model, cframe.instance_matrix(size));

    let shadow = build_shadow_batches(&resolved, &visible.shadow_casters);
    assert_eq!(shadow.len(), 1);
    assert_eq!(shadow[0].0, ShadowGeometry::Shape(PartShape::Block));
    assert!(shadow[0]
        .1
        .iter()
        .all(|m| *m == cframe.instance_matrix(size)));
}

#[test]
fn resolving_without_stale_handles_borrows() {
    let meshes: AssetCache<Mesh> = AssetCache::new();
    let pending = CustomMesh {
        mesh: None,
        texture: None,
        natural_size: Vec3::ONE,
        offset: Vec3::ZERO,
    };
    let parts = vec![
        block_at(Vec3::new(0.0, 0.0, -4.0), red()),
        RenderablePart::custom(pending, CFrame::IDENTITY, Vec3::ONE, red()),
    ];
    let resolved = resolve_custom_meshes(&parts, &meshes);
    assert!(matches!(resolved, Cow::Borrowed(_)));
    assert_eq!(&*resolved, parts.as_slice());
}

#[test]
fn transparent_parts_draw_back_to_front() {
    let near = block_at(Vec3::new(0.0, 0.0, -5.0), red()).with_transparency(0.5);
    let far = block_at(Vec3::new(0.0, 0.0, -10.0), red()).with_transparency(0.5);
    let parts = vec![near, far];

    let visible = cull_parts(&parts, &camera_at_origin(), &default_params());

    let distances: Vec<f32> = visible
        .transparent
        .iter()
        .map(|item| parts[item.index].position().distance(Vec3::ZERO))
        .collect();
    assert_eq!(distances, vec![10.0, 5.0]);
    assert!(visible.opaque.is_empty());
    assert!(visible.transparent.iter().all(|item| item.opacity == 0.5));
}

#[test]
fn invisible_and_distant_parts_are_culled() {
    let settings = RenderSettings {
        max_draw_distance: 100.0,
        shadow_max_distance: 50.0,
        ..RenderSettings::default()
    };
    let parts = vec![
        block_at(Vec3::new(0.0, 0.0, -10.0), red()).with_transparency(1.0),
        block_at(Vec3::new(0.0, 0.0, -70.0), red()),
        block_at(Vec3::new(0.0, 0.0, -500.0), red()),
    ];

    let visible = cull_parts(
        &parts,
        &camera_at_origin(),
        &CullParams::from_settings(&settings),
    );
    assert_eq!(visible.opaque, vec![1]);
    assert!(visible.shadow_casters.is_empty());
    assert_eq!(visible.culled, 2);

    let stats = FrameStats::from_visible(parts.len(), &visible);
    assert_eq!(stats.parts, 3);
    assert_eq!(stats.culled, 2);
    assert_eq!(stats.opaque, 1);
}

#[test]
fn parts_behind_the_camera_still_cast_shadows() {
    let parts = vec![block_at(Vec3::new(0.0, 0.0, 20.0), red())];
    let settings = RenderSettings {
        cone_culling: true,
        ..RenderSettings::default()
    };
    let visible = cull_parts(
        &parts,
        &camera_at_origin(),
        &CullParams::from_settings(&settings),
    );
    assert!(visible.opaque.is_empty());
    assert_eq!(visible.shadow_casters, vec![0]);
}

#[test]
fn custom_meshes_draw_individually_and_fall_back_to_blocks() {
    let loaded = CustomMesh {
        mesh: Some(Handle::new(3)),
        texture: Some(Handle::new(0)),
        natural_size: Vec3::splat(2.0),
        offset: Vec3::ZERO,
    };
    let pending = CustomMesh { mesh: None, ..loaded };
    let parts = vec![
        RenderablePart::custom(loaded, CFrame::from_position(Vec3::new(0.0, 0.0, -8.0)), Vec3::splat(4.0), red()),
        RenderablePart::custom(pending, CFrame::from_position(Vec3::new(2.0, 0.0, -8.0)), Vec3::splat(4.0), red()),
        block_at(Vec3::new(-2.0, 0.0, -8.0), red()),
    ];

    let visible = cull_parts(&parts, &camera_at_origin(), &default_params());
    let frame = build_batches(&parts, &visible.opaque);
    assert_eq!(frame.batch_count(), 1);
    assert_eq!(frame.custom.len(), 2);
    assert_eq!(frame.custom[0].mesh, Some(Handle::new(3)));
    assert_eq!(frame.custom[1].mesh, None);
    assert_eq!(frame.custom[0].texture, Some(Handle::new(0)));

    let shadow = build_shadow_batches(&parts, &visible.shadow_casters);
    let geometries: Vec<_> = shadow.iter().map(|(geometry, _)| *geometry).collect();
    assert_eq!(
        geometries,
        vec![
            ShadowGeometry::Shape(PartShape::Block),
            ShadowGeometry::Custom(Handle::new(3)),
        ]
    );
    assert_eq!(shadow[0].1.len(), 2);

    let packed = PackedInstances::pack(&frame, &shadow);
    assert_eq!(packed.instances.len(), 1 + 3);
    assert_eq!(packed.shadow[0].range, 1..3);
    assert_eq!(packed.shadow[1].range, 3..4);
}
