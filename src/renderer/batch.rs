use std::borrow::Cow;
use std::collections::HashMap;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::asset::{AssetCache, Handle, Mesh, Texture};
use crate::scene::{CustomMesh, PartShape, RenderableKind, RenderablePart};

/// RGBA8 color packed as `r<<24 | g<<16 | b<<8 | a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackedColor(pub u32);

impl PackedColor {
    pub fn from_linear(color: Vec3, alpha: f32) -> Self {
        let channel = |c: f32| -> u32 {
            let c = if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) };
            (c * 255.0).round() as u32
        };
        Self(
            channel(color.x) << 24
                | channel(color.y) << 16
                | channel(color.z) << 8
                | channel(alpha),
        )
    }

    pub fn to_vec4(self) -> Vec4 {
        let byte = |shift: u32| ((self.0 >> shift) & 0xff) as f32 / 255.0;
        Vec4::new(byte(24), byte(16), byte(8), byte(0))
    }
}

/// Batching key - only splits by what actually requires a different draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey {
    pub color: PackedColor,
    pub shape: PartShape,
}

/// Opaque custom-mesh part drawn on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomDraw {
    pub index: usize,
    /// `None` draws the block fallback.
    pub mesh: Option<Handle<Mesh>>,
    pub texture: Option<Handle<Texture>>,
    pub model: Mat4,
    pub color: Vec4,
}

#[derive(Debug, Clone, Default)]
pub struct FrameBatches {
    pub batches: HashMap<BatchKey, Vec<Mat4>>,
    pub custom: Vec<CustomDraw>,
}

impl FrameBatches {
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn instance_count(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    /// Batches in a stable order so instance ranges do not reshuffle between frames.
    pub fn ordered(&self) -> Vec<(BatchKey, &[Mat4])> {
        let mut ordered: Vec<_> = self
            .batches
            .iter()
            .map(|(key, matrices)| (*key, matrices.as_slice()))
            .collect();
        ordered.sort_by_key(|(key, _)| *key);
        ordered
    }
}

/// Clears custom mesh handles that `meshes` cannot resolve.
///
/// Those parts then go through every later stage as a block sized like a
/// primitive, so the main pass, the transparency pass and the shadow pass all
/// agree on the fallback transform.
pub fn resolve_custom_meshes<'a>(
    parts: &'a [RenderablePart],
    meshes: &AssetCache<Mesh>,
) -> Cow<'a, [RenderablePart]> {
    let is_stale = |part: &RenderablePart| match part.kind {
        RenderableKind::CustomMesh(CustomMesh {
            mesh: Some(handle), ..
        }) => meshes.get(handle).is_none(),
        _ => false,
    };
    if !parts.iter().any(is_stale) {
        return Cow::Borrowed(parts);
    }

    let resolved = parts
        .iter()
        .enumerate()
        .map(|(index, part)| {
            let mut part = *part;
            if is_stale(&part) {
                if let RenderableKind::CustomMesh(custom) = &mut part.kind {
                    log::warn!(
                        "Part {} references mesh {:?} missing from the asset cache; drawing block fallback",
                        index,
                        custom.mesh
                    );
                    custom.mesh = None;
                }
            }
            part
        })
        .collect();
    Cow::Owned(resolved)
}

/// Groups opaque primitives by (color, shape); custom meshes are collected separately.
pub fn build_batches(parts: &[RenderablePart], opaque: &[usize]) -> FrameBatches {
    let mut frame = FrameBatches::default();

    for &index in opaque {
        let Some(part) = parts.get(index) else {
            continue;
        };
        match part.kind {
            RenderableKind::Primitive { shape } => {
                let key = BatchKey {
                    color: PackedColor::from_linear(part.color, 1.0),
                    shape,
                };
                frame
                    .batches
                    .entry(key)
                    .or_default()
                    .push(part.cframe.instance_matrix(part.size));
            }
            RenderableKind::CustomMesh(custom) => {
                if custom.mesh.is_none() {
                    log::warn!("Part {} has no loaded mesh; drawing block fallback", index);
                }
                frame.custom.push(CustomDraw {
                    index,
                    mesh: custom.mesh,
                    texture: custom.texture,
                    model: part.model_matrix(),
                    color: part.tint(1.0),
                });
            }
        }
    }

    frame
}

/// Geometry a shadow caster is rasterized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowGeometry {
    Shape(PartShape),
    Custom(Handle<Mesh>),
}

impl ShadowGeometry {
    fn sort_key(&self) -> (u8, usize) {
        match self {
            ShadowGeometry::Shape(shape) => (0, shape.id() as usize),
            ShadowGeometry::Custom(handle) => (1, handle.index()),
        }
    }
}

/// Groups shadow casters by geometry; a custom part without a mesh casts as a block.
pub fn build_shadow_batches(
    parts: &[RenderablePart],
    casters: &[usize],
) -> Vec<(ShadowGeometry, Vec<Mat4>)> {
    let mut groups: HashMap<ShadowGeometry, Vec<Mat4>> = HashMap::new();

    for &index in casters {
        let Some(part) = parts.get(index) else {
            continue;
        };
        let geometry = match part.kind {
            RenderableKind::Primitive { shape } => ShadowGeometry::Shape(shape),
            RenderableKind::CustomMesh(custom) => match custom.mesh {
                Some(handle) => ShadowGeometry::Custom(handle),
                None => ShadowGeometry::Shape(part.fallback_shape()),
            },
        };
        groups.entry(geometry).or_default().push(part.model_matrix());
    }

    let mut ordered: Vec<_> = groups.into_iter().collect();
    ordered.sort_by_key(|(geometry, _)| geometry.sort_key());
    ordered
}

/// Per-instance data read from the instance storage buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl InstanceRaw {
    pub fn new(model: Mat4, color: Vec4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstancedBatch {
    pub shape: PartShape,
    pub range: Range<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShadowBatch {
    pub geometry: ShadowGeometry,
    pub range: Range<u32>,
}

/// Instance data for the whole frame plus the ranges each draw consumes.
#[derive(Debug, Clone, Default)]
pub struct PackedInstances {
    pub instances: Vec<InstanceRaw>,
    pub opaque: Vec<InstancedBatch>,
    pub shadow: Vec<ShadowBatch>,
}

impl PackedInstances {
    pub fn pack(frame: &FrameBatches, shadow: &[(ShadowGeometry, Vec<Mat4>)]) -> Self {
        let mut packed = PackedInstances::default();

        for (key, matrices) in frame.ordered() {
            let start = packed.instances.len() as u32;
            let color = key.color.to_vec4();
            packed
                .instances
                .extend(matrices.iter().map(|m| InstanceRaw::new(*m, color)));
            packed.opaque.push(InstancedBatch {
                shape: key.shape,
                range: start..packed.instances.len() as u32,
            });
        }

        for (geometry, matrices) in shadow {
            let start = packed.instances.len() as u32;
            packed
                .instances
                .extend(matrices.iter().map(|m| InstanceRaw::new(*m, Vec4::ONE)));
            packed.shadow.push(ShadowBatch {
                geometry: *geometry,
                range: start..packed.instances.len() as u32,
            });
        }

        packed
    }
}
