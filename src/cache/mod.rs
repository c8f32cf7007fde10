//! Texture storage shared by every tile and layer.

mod absent_list;
mod resource_cache;

pub use crate::cache::{
    absent_list::AbsentResourceList,
    resource_cache::{CacheStats, ResourceCache},
};

use crate::render::Texture;
use bevy::prelude::*;

/// The default capacity of the [`GpuResourceCache`] in bytes.
pub const DEFAULT_CACHE_CAPACITY: usize = 150 * 1024 * 1024;

/// The texture cache shared by all imagery layers.
/// Textures are owned by the cache and referenced by tiles through their cache keys.
#[derive(Resource, Deref, DerefMut)]
pub struct GpuResourceCache(pub ResourceCache<Texture>);

impl GpuResourceCache {
    pub fn new(capacity: usize, low_water: usize) -> Self {
        Self(ResourceCache::with_low_water(capacity, low_water))
    }

    /// Stores the texture under the key, sized by its pixel data.
    pub fn put_texture(&mut self, key: impl Into<String>, texture: Texture) -> bool {
        let size = texture.size_in_bytes();
        self.put_resource(key, texture, size)
    }
}

impl Default for GpuResourceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_CAPACITY * 4 / 5)
    }
}
