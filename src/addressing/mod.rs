//! Maps tile addresses to geographic sectors and prepares fetched images for drawing.
//!
//! Every tile pyramid is addressed by exactly one [`TileAddressingScheme`], chosen when the
//! layer is constructed:
//!
//! - [`GeodeticScheme`]: a uniform latitude/longitude grid with its origin in the south west.
//! - [`WmtsScheme`]: tile matrices supplied by a WMTS capabilities document.
//! - [`WebMercatorScheme`]: the square pixel grid of TMS/XYZ servers in EPSG:3857.
//!
//! Imagery in Mercator pixel space is resampled on arrival so that its rows are spaced evenly
//! in latitude, which is how the terrain tessellation samples it.

mod crs;
mod geodetic;
mod web_mercator;
mod wmts;

pub use crate::addressing::{
    crs::Crs,
    geodetic::GeodeticScheme,
    web_mercator::{unproject_rows, WebMercatorScheme},
    wmts::{WmtsCapabilities, WmtsScheme, WmtsTileMatrix},
};

use crate::{
    math::{Globe, Sector},
    render::Texture,
    tiling::{Level, LevelSet, Tile, TileFactory, TileKey},
};
use image::RgbaImage;

/// Reusable staging memory for resampling fetched images.
///
/// Owned by whoever processes retrieved imagery and passed in explicitly, so consecutive
/// tiles reuse the same allocation.
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    pixels: Vec<u8>,
}

impl ScratchBuffer {
    /// Copies the data into the buffer and returns the staged copy.
    pub fn stage(&mut self, data: &[u8]) -> &[u8] {
        self.pixels.clear();
        self.pixels.extend_from_slice(data);
        &self.pixels
    }

    pub fn capacity(&self) -> usize {
        self.pixels.capacity()
    }
}

#[derive(Debug, Clone)]
pub enum TileAddressingScheme {
    Geodetic(GeodeticScheme),
    Wmts(WmtsScheme),
    WebMercator(WebMercatorScheme),
}

impl TileAddressingScheme {
    pub fn level_set(&self) -> &LevelSet {
        match self {
            TileAddressingScheme::Geodetic(scheme) => &scheme.level_set,
            TileAddressingScheme::Wmts(scheme) => &scheme.level_set,
            TileAddressingScheme::WebMercator(scheme) => &scheme.level_set,
        }
    }

    /// The number of rows and columns of the tile matrix at the level.
    pub fn matrix_dimensions(&self, level: &Level) -> (u32, u32) {
        match self {
            TileAddressingScheme::Geodetic(scheme) => scheme.matrix_dimensions(level),
            TileAddressingScheme::Wmts(scheme) => scheme.matrix_dimensions(level),
            TileAddressingScheme::WebMercator(scheme) => scheme.matrix_dimensions(level),
        }
    }

    /// How many child rows and columns one tile of the level spans at the child level.
    ///
    /// WMTS matrices are rounded up over the extent, so their sizes need not double even
    /// though their tile spans always halve.
    pub fn subdivision_factors(&self, level: &Level, child_level: &Level) -> (u32, u32) {
        match self {
            TileAddressingScheme::Wmts(_) => (2, 2),
            TileAddressingScheme::Geodetic(_) | TileAddressingScheme::WebMercator(_) => {
                let (rows, columns) = self.matrix_dimensions(level);
                let (child_rows, child_columns) = self.matrix_dimensions(child_level);

                (
                    (child_rows / rows.max(1)).max(1),
                    (child_columns / columns.max(1)).max(1),
                )
            }
        }
    }

    pub fn tile_sector(&self, level: &Level, row: u32, column: u32) -> Sector {
        match self {
            TileAddressingScheme::Geodetic(scheme) => scheme.tile_sector(level, row, column),
            TileAddressingScheme::Wmts(scheme) => scheme.tile_sector(level, row, column),
            TileAddressingScheme::WebMercator(scheme) => scheme.tile_sector(level, row, column),
        }
    }

    pub fn url_for_tile(&self, level: &Level, key: TileKey) -> String {
        match self {
            TileAddressingScheme::Geodetic(scheme) => scheme.url_for_tile(key),
            TileAddressingScheme::Wmts(scheme) => scheme.url_for_tile(level, key),
            TileAddressingScheme::WebMercator(scheme) => scheme.url_for_tile(level, key),
        }
    }

    pub fn is_mercator(&self) -> bool {
        match self {
            TileAddressingScheme::Geodetic(_) => false,
            TileAddressingScheme::Wmts(scheme) => scheme.crs == Crs::WebMercator,
            TileAddressingScheme::WebMercator(_) => true,
        }
    }

    /// Turns a decoded image into a texture covering the sector in geographic coordinates.
    pub fn texture_for_fetched_image(
        &self,
        mut image: RgbaImage,
        sector: &Sector,
        scratch: &mut ScratchBuffer,
    ) -> Texture {
        if self.is_mercator() {
            unproject_rows(&mut image, sector, scratch);
        }

        Texture::new(image)
    }
}

/// Creates tiles addressed by a scheme, with geometry on the given globe.
pub struct SchemeTileFactory<'a> {
    pub scheme: &'a TileAddressingScheme,
    pub globe: &'a Globe,
    pub vertical_exaggeration: f64,
}

impl TileFactory for SchemeTileFactory<'_> {
    fn matrix_dimensions(&self, level: &Level) -> (u32, u32) {
        self.scheme.matrix_dimensions(level)
    }

    fn subdivision_factors(&self, level: &Level, child_level: &Level) -> (u32, u32) {
        self.scheme.subdivision_factors(level, child_level)
    }

    fn create_tile(&self, level: &Level, row: u32, column: u32) -> Tile {
        let sector = self.scheme.tile_sector(level, row, column);
        Tile::new(
            sector,
            *level,
            row,
            column,
            self.globe,
            self.vertical_exaggeration,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Location;
    use image::Rgba;

    #[test]
    fn geodetic_images_are_used_as_is() {
        let level_set =
            LevelSet::new(Sector::FULL_SPHERE, Location::new(90.0, 90.0), 2, 4, 4).unwrap();
        let scheme = TileAddressingScheme::Geodetic(GeodeticScheme::new(level_set, "{level}"));
        let image = RgbaImage::from_fn(4, 4, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let mut scratch = ScratchBuffer::default();

        let texture = scheme.texture_for_fetched_image(
            image.clone(),
            &Sector::new(0.0, 90.0, 0.0, 90.0),
            &mut scratch,
        );

        assert_eq!(texture.image(), &image);
        assert_eq!(scratch.capacity(), 0);
    }

    #[test]
    fn factory_builds_tiles_at_scheme_sectors() {
        let level_set =
            LevelSet::new(Sector::FULL_SPHERE, Location::new(90.0, 90.0), 3, 4, 4).unwrap();
        let scheme = TileAddressingScheme::Geodetic(GeodeticScheme::new(level_set, "{level}"));
        let globe = Globe::sphere(1.0).unwrap();
        let factory = SchemeTileFactory {
            scheme: &scheme,
            globe: &globe,
            vertical_exaggeration: 1.0,
        };

        let level = *scheme.level_set().level(1).unwrap();
        let tile = factory.create_tile(&level, 2, 3);

        assert_eq!(tile.key, TileKey::new(1, 2, 3));
        assert_eq!(tile.sector, scheme.tile_sector(&level, 2, 3));
        assert_eq!(factory.matrix_dimensions(&level), (4, 8));
    }
}
