use crate::{
    addressing::ScratchBuffer,
    math::{
        inverse_mix,
        web_mercator::{
            gudermannian_inverse, latitude_from_normalized_y, longitude_from_normalized_x,
        },
        Sector,
    },
    tiling::{Level, LevelSet, TileKey},
};
use image::RgbaImage;

/// A square Web Mercator pixel grid as served by TMS and XYZ tile servers.
/// Row 0 is the northernmost band and column 0 the westernmost.
#[derive(Debug, Clone)]
pub struct WebMercatorScheme {
    pub level_set: LevelSet,
    pub base_url: String,
    pub suffix: String,
}

impl WebMercatorScheme {
    pub fn new(
        level_set: LevelSet,
        base_url: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            level_set,
            base_url: base_url.into(),
            suffix: suffix.into(),
        }
    }

    pub fn tiles_per_row(&self, level: &Level) -> u32 {
        (self.level_set.sector.delta_longitude() / level.tile_delta.longitude)
            .round()
            .max(1.0) as u32
    }

    pub fn matrix_dimensions(&self, level: &Level) -> (u32, u32) {
        let tiles_per_row = self.tiles_per_row(level);
        (tiles_per_row, tiles_per_row)
    }

    pub fn map_size(&self, level: &Level) -> f64 {
        level.tile_width as f64 * self.tiles_per_row(level) as f64
    }

    pub fn tile_sector(&self, level: &Level, row: u32, column: u32) -> Sector {
        let tile_size = level.tile_width as f64;
        let map_size = self.map_size(level);

        let min_x = column as f64 * tile_size / map_size - 0.5;
        let max_x = (column + 1) as f64 * tile_size / map_size - 0.5;
        let min_y = (map_size - (row + 1) as f64 * tile_size) / map_size - 0.5;
        let max_y = (map_size - row as f64 * tile_size) / map_size - 0.5;

        Sector::new(
            latitude_from_normalized_y(min_y),
            latitude_from_normalized_y(max_y),
            longitude_from_normalized_x(min_x),
            longitude_from_normalized_x(max_x),
        )
    }

    /// The zoom level of the tile server, which counts the doublings of tiles per row.
    pub fn zoom(&self, level: &Level) -> u32 {
        self.tiles_per_row(level).ilog2()
    }

    pub fn url_for_tile(&self, level: &Level, key: TileKey) -> String {
        format!(
            "{}/{}/{}/{}.{}",
            self.base_url.trim_end_matches('/'),
            self.zoom(level),
            key.column,
            key.row,
            self.suffix
        )
    }
}

/// Resamples a Mercator tile image so that its rows are spaced evenly in latitude.
///
/// Each destination row copies the nearest source row. The source rows are staged in the
/// scratch buffer, so the image is rewritten in place.
pub fn unproject_rows(image: &mut RgbaImage, sector: &Sector, scratch: &mut ScratchBuffer) {
    let (width, height) = image.dimensions();

    if height < 2 {
        return;
    }

    let stride = width as usize * 4;
    let last_row = (height - 1) as f64;
    let source = scratch.stage(image.as_raw());

    let min_g = gudermannian_inverse(sector.min_latitude);
    let max_g = gudermannian_inverse(sector.max_latitude);

    let destination: &mut [u8] = &mut **image;

    for (y, row) in destination.chunks_exact_mut(stride).enumerate() {
        let sy = 1.0 - y as f64 / last_row;
        let latitude = sector.min_latitude + sy * sector.delta_latitude();
        let dy = 1.0 - inverse_mix(min_g, max_g, gudermannian_inverse(latitude));
        let dy = dy.clamp(0.0, 1.0);
        let source_row = (dy * last_row).floor() as usize;

        row.copy_from_slice(&source[source_row * stride..(source_row + 1) * stride]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{
        web_mercator::{normalized_x_from_longitude, normalized_y_from_latitude, MAX_LATITUDE},
        Location,
    };
    use image::Rgba;
    use rand::Rng;

    fn scheme() -> WebMercatorScheme {
        let level_set = LevelSet::new(
            Sector::new(-MAX_LATITUDE, MAX_LATITUDE, -180.0, 180.0),
            Location::new(2.0 * MAX_LATITUDE, 360.0),
            12,
            256,
            256,
        )
        .unwrap();
        WebMercatorScheme::new(level_set, "https://tiles.example.org/osm/", "png")
    }

    #[test]
    fn level_zero_covers_the_whole_map() {
        let scheme = scheme();
        let level = *scheme.level_set.first_level();
        let sector = scheme.tile_sector(&level, 0, 0);

        assert!((sector.max_latitude - MAX_LATITUDE).abs() < 1e-9);
        assert!((sector.min_latitude + MAX_LATITUDE).abs() < 1e-9);
        assert_eq!(sector.min_longitude, -180.0);
        assert_eq!(sector.max_longitude, 180.0);
    }

    #[test]
    fn rows_start_in_the_north() {
        let scheme = scheme();
        let level = *scheme.level_set.level(1).unwrap();

        let north = scheme.tile_sector(&level, 0, 0);
        let south = scheme.tile_sector(&level, 1, 0);

        assert!(north.min_latitude.abs() < 1e-9);
        assert!(north.max_latitude > 85.0);
        assert!(south.max_latitude.abs() < 1e-9);
    }

    #[test]
    fn round_trip_recovers_pixel_rectangle() {
        let scheme = scheme();
        let mut rng = rand::rng();

        for _ in 0..500 {
            let level = *scheme.level_set.level(rng.random_range(0..12)).unwrap();
            let tiles = scheme.tiles_per_row(&level);
            let row = rng.random_range(0..tiles);
            let column = rng.random_range(0..tiles);

            let sector = scheme.tile_sector(&level, row, column);
            let map_size = scheme.map_size(&level);
            let tile_size = level.tile_width as f64;

            let pixel_x = |longitude| (normalized_x_from_longitude(longitude) + 0.5) * map_size;
            let pixel_y = |latitude| (normalized_y_from_latitude(latitude) + 0.5) * map_size;

            let expected = [
                column as f64 * tile_size,
                (column + 1) as f64 * tile_size,
                map_size - (row + 1) as f64 * tile_size,
                map_size - row as f64 * tile_size,
            ];
            let actual = [
                pixel_x(sector.min_longitude),
                pixel_x(sector.max_longitude),
                pixel_y(sector.min_latitude),
                pixel_y(sector.max_latitude),
            ];

            for (expected, actual) in expected.iter().zip(actual) {
                assert!((expected - actual).abs() <= 1e-6 * map_size);
            }
        }
    }

    #[test]
    fn tms_url() {
        let scheme = scheme();
        let level = *scheme.level_set.level(3).unwrap();

        assert_eq!(
            scheme.url_for_tile(&level, TileKey::new(3, 5, 2)),
            "https://tiles.example.org/osm/3/2/5.png"
        );
    }

    #[test]
    fn unprojection_copies_nearest_rows() {
        let scheme = scheme();
        let level = *scheme.level_set.level(1).unwrap();
        let sector = scheme.tile_sector(&level, 0, 1);

        let mut image = RgbaImage::from_fn(4, 16, |_, y| Rgba([y as u8, 0, 0, 255]));
        let mut scratch = ScratchBuffer::default();
        unproject_rows(&mut image, &sector, &mut scratch);

        // each destination row copies the source row at floor(dy * (height - 1)), where dy is
        // the Mercator position of the row's latitude measured from the north edge
        let rows: Vec<u8> = (0..16).map(|y| image.get_pixel(2, y)[0]).collect();
        assert_eq!(rows, [0, 3, 5, 7, 8, 9, 10, 10, 11, 11, 12, 13, 13, 14, 14, 15]);

        let min_g = gudermannian_inverse(sector.min_latitude);
        let max_g = gudermannian_inverse(sector.max_latitude);
        for (y, &row) in rows.iter().enumerate() {
            let latitude = sector.max_latitude - y as f64 / 15.0 * sector.delta_latitude();
            let dy = (max_g - gudermannian_inverse(latitude)) / (max_g - min_g);
            assert_eq!(row as usize, (dy * 15.0).floor() as usize);
        }
    }
}
