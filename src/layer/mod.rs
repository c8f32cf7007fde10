mod image_tile;
mod tiled_image_layer;

pub use crate::layer::{
    image_tile::{FallbackTexture, ImageTile},
    tiled_image_layer::TiledImageLayer,
};
