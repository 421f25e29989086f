use crate::asset::Assets;
use crate::renderer::internal::ObjectBuffers;
use crate::renderer::shading::{LitVariant, PipelineKey, ShadingPipeline};
use crate::renderer::shapes::ShapeMeshCache;
use crate::scene::{RenderableKind, RenderablePart};

/// A translucent part queued for the blended pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransparentItem {
    /// Index into the snapshot's part list.
    pub index: usize,
    /// Squared distance from the camera to the part center.
    pub distance_sq: f32,
    pub opacity: f32,
}

/// Orders items farthest first; ties keep their input order.
///
/// NaN distances sort as farther than any number so the order stays total.
pub fn sort_back_to_front(items: &mut [TransparentItem]) {
    items.sort_by(|a, b| sort_key(b).total_cmp(&sort_key(a)));
}

fn sort_key(item: &TransparentItem) -> f32 {
    if item.distance_sq.is_nan() {
        f32::INFINITY
    } else {
        item.distance_sq
    }
}

/// Records the blended draws, one per item, in the order given.
pub(crate) struct TransparencyCompositor;

impl TransparencyCompositor {
    /// Returns the number of draw calls issued.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn record(
        pass: &mut wgpu::RenderPass<'_>,
        shading: &ShadingPipeline,
        shapes: &ShapeMeshCache,
        assets: &Assets,
        objects: &ObjectBuffers,
        parts: &[RenderablePart],
        items: &[TransparentItem],
        first_slot: u32,
    ) -> u32 {
        let mut draw_calls = 0;
        for (slot, item) in items.iter().enumerate() {
            let Some(part) = parts.get(item.index) else {
                continue;
            };
            let mesh = match part.kind {
                RenderableKind::CustomMesh(custom) => custom
                    .mesh
                    .and_then(|handle| assets.meshes.get(handle))
                    .or_else(|| {
                        log::warn!(
                            "Part {} has no loaded mesh; drawing block fallback",
                            item.index
                        );
                        shapes.get(part.fallback_shape())
                    }),
                RenderableKind::Primitive { shape } => shapes.get(shape),
            };
            let Some(mesh) = mesh else {
                continue;
            };
            let texture = match part.kind {
                RenderableKind::CustomMesh(custom) => custom.texture,
                RenderableKind::Primitive { .. } => None,
            };

            shading.bind(
                pass,
                PipelineKey {
                    variant: LitVariant::Single,
                    alpha_blend: true,
                },
                objects,
                objects.draw_offset(first_slot + slot as u32),
                texture,
            );
            mesh.bind(pass);
            pass.draw_indexed(0..mesh.index_count(), 0, 0..1);
            draw_calls += 1;
        }
        draw_calls
    }
}
