//! This crate drapes multi-resolution raster imagery onto a virtual globe.
//!
//! # Background
//! Imagery of the whole earth is far too large to be loaded at once. Tile servers therefore
//! publish it as a pyramid of levels, where every level doubles the resolution of the previous
//! one and is cut into equally sized tiles. Rendering such imagery boils down to three questions:
//!
//! ## Which tiles are needed?
//! Each layer walks its quadtree of tiles every frame and subdivides a tile whenever its texels
//! are too coarse for the distance to the viewer. The selected tiles are independent of the
//! terrain tessellation they are drawn onto.
//! See the [`tiling`] and [`layer`] modules for more information.
//!
//! ## How are the tiles addressed?
//! Servers disagree on where the rows start and which projection the images are in.
//! The [`addressing`] module maps tile addresses of geodetic grids, WMTS tile matrix sets and
//! Web Mercator pyramids to geographic sectors and resamples Mercator images on arrival.
//!
//! ## Where do the textures live?
//! Fetched images are decoded in the background and stored in a shared cache with a fixed
//! memory budget. Tiles whose textures are missing are drawn with the texture of their nearest
//! loaded ancestor. See the [`cache`] and [`retrieval`] modules.

pub mod addressing;
pub mod cache;
pub mod config;
pub mod error;
pub mod layer;
pub mod math;
pub mod plugin;
pub mod render;
pub mod retrieval;
pub mod tiling;

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use crate::{
        addressing::{Crs, TileAddressingScheme, WmtsCapabilities},
        cache::{GpuResourceCache, ResourceCache},
        config::{AddressingConfig, ImageryLayerConfig, RetrievalConfig, SurfaceImageryConfig},
        error::{ComputationError, ConfigurationError, ResourceError},
        layer::{ImageTile, TiledImageLayer},
        math::{ElevationModel, Globe, GlobeShape, Location, Sector},
        plugin::{ImageryLayerHandle, ImagerySource, SurfaceImageryPlugin},
        render::{
            DrawContext, FrameStatistics, GraphicsContext, SurfaceTile, SurfaceTileRenderer,
            Terrain, TerrainTile, Texture,
        },
        retrieval::{DirectoryImageSource, ImageSource},
        tiling::{Level, LevelSet, Tile, TileKey},
    };
}
