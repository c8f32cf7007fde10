//! The tile pyramid: resolution levels, tile identity and quadtree subdivision.

mod level_set;
mod tile;

pub use crate::tiling::{
    level_set::{Level, LevelSet},
    tile::{GeometryStamp, SubdivisionCache, Tile, TileFactory, TileKey},
};
