//! Compositing of image tiles onto the terrain.
//!
//! The terrain is tessellated independently of the imagery. For every terrain tile, each
//! overlapping image tile is drawn with two texture matrices: the mask matrix maps the terrain
//! tile into the image tile's unit square, and the sampler matrix additionally maps into the
//! texture that was actually bound, which may belong to an ancestor tile.

mod draw_context;
mod surface_tile_renderer;
mod texture;

#[cfg(test)]
pub(crate) mod recording;

pub use crate::render::{
    draw_context::{DrawContext, FrameStatistics, GraphicsContext, Terrain, TerrainTile},
    surface_tile_renderer::{tile_transform, SurfaceTile, SurfaceTileRenderer},
    texture::Texture,
};
