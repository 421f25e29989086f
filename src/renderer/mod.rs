pub mod batch;
pub mod cascades;
pub mod culling;
pub mod depth;
pub(crate) mod internal;
pub mod pipeline_builder;
pub mod postprocess;
pub mod primitives;
#[allow(clippy::module_inception)]
pub mod renderer;
pub mod shading;
pub mod shapes;
pub mod sky;
pub mod transparency;
pub mod vertex;

pub use batch::{
    build_batches, build_shadow_batches, resolve_custom_meshes, FrameBatches, PackedInstances,
};
pub use cascades::{build_cascades, Cascade, CascadeParams};
pub use culling::{cull_parts, CullParams, FrameStats, VisibleSet};
pub use depth::Depth;
pub use pipeline_builder::PipelineBuilder;
pub use primitives::shape_mesh;
pub use renderer::{RenderFrame, Renderer};
pub use shading::FrameUniforms;
pub use shapes::ShapeMeshCache;
pub use transparency::{sort_back_to_front, TransparentItem};
pub use vertex::Vertex;
