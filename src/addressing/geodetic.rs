use crate::{
    math::Sector,
    tiling::{Level, LevelSet, TileKey},
};

/// A uniform latitude/longitude grid over the layer's sector.
/// Row 0 is the southernmost band and column 0 the westernmost.
#[derive(Debug, Clone)]
pub struct GeodeticScheme {
    pub level_set: LevelSet,
    /// Request URL with `{level}`, `{row}` and `{column}` placeholders.
    pub url_template: String,
}

impl GeodeticScheme {
    pub fn new(level_set: LevelSet, url_template: impl Into<String>) -> Self {
        Self {
            level_set,
            url_template: url_template.into(),
        }
    }

    pub fn matrix_dimensions(&self, level: &Level) -> (u32, u32) {
        (
            self.level_set.num_tiles_high(level),
            self.level_set.num_tiles_wide(level),
        )
    }

    pub fn tile_sector(&self, level: &Level, row: u32, column: u32) -> Sector {
        let sector = &self.level_set.sector;
        let (rows, columns) = self.matrix_dimensions(level);

        let delta_latitude = sector.delta_latitude() / rows as f64;
        let delta_longitude = sector.delta_longitude() / columns as f64;

        let min_latitude = sector.min_latitude + delta_latitude * row as f64;
        let min_longitude = sector.min_longitude + delta_longitude * column as f64;

        Sector::new(
            min_latitude,
            min_latitude + delta_latitude,
            min_longitude,
            min_longitude + delta_longitude,
        )
    }

    pub fn url_for_tile(&self, key: TileKey) -> String {
        self.url_template
            .replace("{level}", &key.level_number.to_string())
            .replace("{row}", &key.row.to_string())
            .replace("{column}", &key.column.to_string())
    }
}
