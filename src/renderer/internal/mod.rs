pub mod buffers;
pub mod context;
pub mod shadows;

pub(crate) use buffers::{DrawUniform, ObjectBuffers};
pub(crate) use context::RenderContext;
pub(crate) use shadows::ShadowResources;
