use crate::{
    error::ConfigurationError,
    math::{Location, Sector},
};

/// One rung of the resolution ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub level_number: u32,
    /// The angular size of a single tile in degrees.
    pub tile_delta: Location,
    /// The angular size of a single texel in radians.
    pub texel_size: f64,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl Level {
    fn new(level_number: u32, tile_delta: Location, tile_width: u32, tile_height: u32) -> Self {
        Self {
            level_number,
            tile_delta,
            texel_size: tile_delta.latitude.to_radians() / tile_height as f64,
            tile_width,
            tile_height,
        }
    }
}

/// The full ladder of resolutions spanning a sector.
///
/// Every level halves the tile delta of its predecessor, starting with `level_zero_delta`.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSet {
    pub sector: Sector,
    pub level_zero_delta: Location,
    pub tile_width: u32,
    pub tile_height: u32,
    levels: Vec<Level>,
}

impl LevelSet {
    pub fn new(
        sector: Sector,
        level_zero_delta: Location,
        num_levels: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, ConfigurationError> {
        sector.validate()?;

        if !(level_zero_delta.latitude > 0.0 && level_zero_delta.longitude > 0.0)
            || !level_zero_delta.latitude.is_finite()
            || !level_zero_delta.longitude.is_finite()
        {
            return Err(ConfigurationError::NonPositiveTileDelta {
                latitude: level_zero_delta.latitude,
                longitude: level_zero_delta.longitude,
            });
        }

        if num_levels == 0 {
            return Err(ConfigurationError::InvalidLevelCount { count: num_levels });
        }

        if tile_width == 0 || tile_height == 0 {
            return Err(ConfigurationError::InvalidTileSize {
                width: tile_width,
                height: tile_height,
            });
        }

        let levels = (0..num_levels)
            .map(|level_number| {
                let scale = 0.5f64.powi(level_number as i32);
                let tile_delta = Location::new(
                    level_zero_delta.latitude * scale,
                    level_zero_delta.longitude * scale,
                );

                Level::new(level_number, tile_delta, tile_width, tile_height)
            })
            .collect();

        Ok(Self {
            sector,
            level_zero_delta,
            tile_width,
            tile_height,
            levels,
        })
    }

    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn level(&self, level_number: u32) -> Option<&Level> {
        self.levels.get(level_number as usize)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn first_level(&self) -> &Level {
        &self.levels[0]
    }

    pub fn last_level(&self) -> &Level {
        &self.levels[self.levels.len() - 1]
    }

    pub fn is_last_level(&self, level_number: u32) -> bool {
        level_number + 1 == self.level_count()
    }

    /// Selects the coarsest level whose texels are no larger than the requested texel size.
    /// Requests finer than the last level resolve to the last level.
    pub fn level_for_texel_size(&self, texel_size: f64) -> &Level {
        let last_level = self.last_level();

        if last_level.texel_size >= texel_size {
            return last_level;
        }

        self.levels
            .iter()
            .find(|level| level.texel_size <= texel_size)
            .unwrap_or(last_level)
    }

    pub fn num_tiles_wide(&self, level: &Level) -> u32 {
        (self.sector.delta_longitude() / level.tile_delta.longitude)
            .round()
            .max(1.0) as u32
    }

    pub fn num_tiles_high(&self, level: &Level) -> u32 {
        (self.sector.delta_latitude() / level.tile_delta.latitude)
            .round()
            .max(1.0) as u32
    }
}
