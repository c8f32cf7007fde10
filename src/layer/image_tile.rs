use crate::{
    math::Sector,
    render::{tile_transform, DrawContext, SurfaceTile},
    tiling::Tile,
};
use bevy::math::DMat4;

/// The texture of an ancestor tile, which may stand in for a missing texture.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackTexture {
    pub cache_key: String,
    pub sector: Sector,
}

/// A [`Tile`] selected for drawing in the current frame.
///
/// If the tile's own texture is not in memory, the nearest ancestors with textures are
/// recorded, nearest first, and the first of them that can be bound is drawn instead.
#[derive(Debug, Clone)]
pub struct ImageTile {
    pub tile: Tile,
    pub cache_key: String,
    pub fallbacks: Vec<FallbackTexture>,
}

impl ImageTile {
    pub fn new(tile: Tile, cache_key: String) -> Self {
        Self {
            tile,
            cache_key,
            fallbacks: Vec::new(),
        }
    }

    /// The cache key of the texture of the tile in the layer.
    pub fn cache_key(layer_name: &str, tile: &Tile) -> String {
        format!("ImageTile:{},{layer_name}", tile.key)
    }
}

fn bind_cached(dc: &mut DrawContext, cache_key: &str) -> bool {
    let bound = match dc.gpu_resource_cache.resource_for_key(cache_key) {
        Some(texture) => dc.graphics.bind_texture(texture),
        None => false,
    };

    if bound {
        dc.frame_statistics.texture_bind_count += 1;
    }

    bound
}

impl SurfaceTile for ImageTile {
    fn sector(&self) -> &Sector {
        &self.tile.sector
    }

    fn bind(&self, dc: &mut DrawContext) -> Option<DMat4> {
        if bind_cached(dc, &self.cache_key) {
            return Some(DMat4::IDENTITY);
        }

        self.fallbacks
            .iter()
            .find(|fallback| bind_cached(dc, &fallback.cache_key))
            .map(|fallback| tile_transform(&fallback.sector, &self.tile.sector))
    }
}
