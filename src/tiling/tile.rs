use crate::{
    math::{BoundingBox, Globe, Sector},
    tiling::Level,
};
use anyhow::{anyhow, Result};
use bevy::{math::DVec3, utils::HashMap};
use std::{fmt, str::FromStr, sync::Arc};

/// The identity of a tile inside its pyramid. Tiles with equal keys are interchangeable.
#[derive(Copy, Clone, Default, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct TileKey {
    pub level_number: u32,
    pub row: u32,
    pub column: u32,
}

impl TileKey {
    pub fn new(level_number: u32, row: u32, column: u32) -> Self {
        Self {
            level_number,
            row,
            column,
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}.{}.{}", self.level_number, self.row, self.column)
    }
}

impl FromStr for TileKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let mut next = || {
            parts
                .next()
                .ok_or_else(|| anyhow!("Tile key {s} has fewer than three parts."))
        };

        let key = Self {
            level_number: next()?.parse()?,
            row: next()?.parse()?,
            column: next()?.parse()?,
        };

        if parts.next().is_some() {
            return Err(anyhow!("Tile key {s} has more than three parts."));
        }

        Ok(key)
    }
}

/// Identifies the inputs the tile geometry was computed from.
/// Geometry computed against a different stamp is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeometryStamp {
    pub elevation_timestamp: u64,
    pub vertical_exaggeration: f64,
}

impl GeometryStamp {
    pub fn new(globe: &Globe, vertical_exaggeration: f64) -> Self {
        Self {
            elevation_timestamp: globe.elevation_model.timestamp(),
            vertical_exaggeration,
        }
    }
}

/// Creates the tiles of a pyramid, given the pyramid's addressing.
pub trait TileFactory {
    /// The number of rows and columns of the tile matrix at the level.
    fn matrix_dimensions(&self, level: &Level) -> (u32, u32);

    /// How many child rows and columns one tile of the level spans at the child level.
    fn subdivision_factors(&self, level: &Level, child_level: &Level) -> (u32, u32) {
        let (rows, columns) = self.matrix_dimensions(level);
        let (child_rows, child_columns) = self.matrix_dimensions(child_level);

        (
            (child_rows / rows.max(1)).max(1),
            (child_columns / columns.max(1)).max(1),
        )
    }

    fn create_tile(&self, level: &Level, row: u32, column: u32) -> Tile;
}

/// The memoized children of subdivided tiles, keyed by the parent's key.
pub type SubdivisionCache = HashMap<TileKey, Arc<[Tile; 4]>>;

/// One quadtree node of image data.
///
/// The tile owns its geometry, which is computed once on creation.
/// It never owns its texture, which lives in the resource cache under the tile's key.
#[derive(Debug, Clone)]
pub struct Tile {
    pub sector: Sector,
    pub level: Level,
    pub row: u32,
    pub column: u32,
    pub key: TileKey,
    pub extent: BoundingBox,
    pub reference_point: DVec3,
    pub sample_points: [DVec3; 9],
    pub stamp: GeometryStamp,
}

impl Tile {
    pub fn new(
        sector: Sector,
        level: Level,
        row: u32,
        column: u32,
        globe: &Globe,
        vertical_exaggeration: f64,
    ) -> Self {
        let (min_elevation, max_elevation) =
            globe.elevation_model.min_and_max_elevations(&sector);
        let max_elevation = max_elevation * vertical_exaggeration;
        let mut min_elevation = min_elevation * vertical_exaggeration;

        if min_elevation == max_elevation {
            min_elevation = max_elevation - 10.0;
        }

        let mid_elevation = 0.5 * (min_elevation + max_elevation);
        let locations = sector.grid_locations();

        let sample_points = locations.map(|location| {
            globe.compute_point_from_position(location.latitude, location.longitude, mid_elevation)
        });

        let extent = locations
            .iter()
            .flat_map(|location| {
                [min_elevation, max_elevation].map(|elevation| {
                    globe.compute_point_from_position(
                        location.latitude,
                        location.longitude,
                        elevation,
                    )
                })
            })
            .fold(BoundingBox::from_point(sample_points[4]), BoundingBox::include);

        let centroid = sector.centroid();
        let reference_point = globe.compute_point_from_position(
            centroid.latitude,
            centroid.longitude,
            min_elevation,
        );

        Self {
            sector,
            level,
            row,
            column,
            key: TileKey::new(level.level_number, row, column),
            extent,
            reference_point,
            sample_points,
            stamp: GeometryStamp::new(globe, vertical_exaggeration),
        }
    }

    pub fn is_stale(&self, stamp: GeometryStamp) -> bool {
        self.stamp != stamp
    }

    /// The minimum distance from the eye point to the tile's sample points, a cheap
    /// approximation of the distance to the tile's surface.
    pub fn distance_to(&self, eye_point: DVec3) -> f64 {
        self.sample_points
            .iter()
            .map(|point| point.distance(eye_point))
            .fold(f64::INFINITY, f64::min)
    }

    /// Whether a texel of this tile, scaled to the globe, is larger than the allowed
    /// fraction `10^-detail_factor` of the viewing distance.
    pub fn must_subdivide(&self, globe: &Globe, eye_point: DVec3, detail_factor: f64) -> bool {
        let cell_size = globe.equatorial_radius() * self.level.texel_size;
        let distance = self.distance_to(eye_point);

        cell_size > distance * 10f64.powf(-detail_factor)
    }

    /// Creates the four children of this tile at the child level.
    /// The children are ordered by row first, then column.
    pub fn subdivide<F: TileFactory + ?Sized>(
        &self,
        child_level: &Level,
        factory: &F,
    ) -> [Tile; 4] {
        let (row_factor, column_factor) = factory.subdivision_factors(&self.level, child_level);

        let row = row_factor * self.row;
        let column = column_factor * self.column;

        [
            factory.create_tile(child_level, row, column),
            factory.create_tile(child_level, row, column + 1),
            factory.create_tile(child_level, row + 1, column),
            factory.create_tile(child_level, row + 1, column + 1),
        ]
    }

    /// Like [`Tile::subdivide`], but reuses the children stored for this tile's key.
    pub fn subdivide_to_cache<F: TileFactory + ?Sized>(
        &self,
        child_level: &Level,
        factory: &F,
        cache: &mut SubdivisionCache,
    ) -> Arc<[Tile; 4]> {
        cache
            .entry(self.key)
            .or_insert_with(|| Arc::new(self.subdivide(child_level, factory)))
            .clone()
    }
}
