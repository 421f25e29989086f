pub mod cache;
pub mod handle;
pub mod mesh;
pub mod texture;

pub use cache::AssetCache;
pub use handle::Handle;
pub use mesh::Mesh;
pub use texture::Texture;

/// Custom meshes and textures owned by the host and referenced by parts.
pub struct Assets {
    pub meshes: AssetCache<Mesh>,
    pub textures: AssetCache<Texture>,
}

impl Assets {
    pub fn new() -> Self {
        Self {
            meshes: AssetCache::new(),
            textures: AssetCache::new(),
        }
    }
}

impl Default for Assets {
    fn default() -> Self {
        Self::new()
    }
}
