use std::collections::HashMap;

use crate::asset::Mesh;
use crate::renderer::primitives::shape_mesh;
use crate::scene::PartShape;

/// GPU meshes for the built-in shapes, created on first use and kept for the
/// renderer's lifetime.
#[derive(Default)]
pub struct ShapeMeshCache {
    meshes: HashMap<PartShape, Mesh>,
}

impl ShapeMeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads any of `shapes` not yet resident.
    pub fn ensure(&mut self, device: &wgpu::Device, shapes: impl IntoIterator<Item = PartShape>) {
        for shape in shapes {
            self.meshes.entry(shape).or_insert_with(|| {
                let data = shape_mesh(shape);
                log::info!(
                    "Uploading {:?} mesh ({} triangles)",
                    shape,
                    data.triangle_count()
                );
                Mesh::from_vertices(device, &format!("{shape:?}"), &data.vertices, &data.indices)
            });
        }
    }

    pub fn get(&self, shape: PartShape) -> Option<&Mesh> {
        self.meshes.get(&shape)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
