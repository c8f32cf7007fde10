use crate::{
    cache::GpuResourceCache,
    math::{Globe, Sector},
    render::Texture,
    tiling::TileKey,
};
use anyhow::Result;
use bevy::{
    math::{DMat4, DVec3, UVec2},
    prelude::*,
};

/// One tile of the terrain tessellation. The imagery is draped onto these tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainTile {
    pub sector: Sector,
    pub key: TileKey,
}

/// The terrain tessellation of the current frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Terrain {
    pub sector: Sector,
    pub tiles: Vec<TerrainTile>,
}

impl Terrain {
    /// A tessellation of the sector into a uniform grid of tiles.
    pub fn uniform(sector: Sector, rows: u32, columns: u32) -> Self {
        let delta_latitude = sector.delta_latitude() / rows.max(1) as f64;
        let delta_longitude = sector.delta_longitude() / columns.max(1) as f64;

        let tiles = (0..rows)
            .flat_map(|row| (0..columns).map(move |column| (row, column)))
            .map(|(row, column)| {
                let min_latitude = sector.min_latitude + row as f64 * delta_latitude;
                let min_longitude = sector.min_longitude + column as f64 * delta_longitude;

                TerrainTile {
                    sector: Sector::new(
                        min_latitude,
                        min_latitude + delta_latitude,
                        min_longitude,
                        min_longitude + delta_longitude,
                    ),
                    key: TileKey::new(0, row, column),
                }
            })
            .collect();

        Self { sector, tiles }
    }
}

/// Per frame counters, reset at the start of every frame.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStatistics {
    pub rendered_tile_count: u32,
    pub texture_bind_count: u32,
    pub visited_tile_count: u32,
    pub retrieval_request_count: u32,
}

impl FrameStatistics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The drawing backend the surface imagery is composited with.
///
/// Texture coordinates of a terrain tile span `[0, 1]` in both directions over the tile's
/// sector, with `t` growing northwards.
pub trait GraphicsContext {
    fn begin_surface_rendering(&mut self);

    fn end_surface_rendering(&mut self);

    /// Binds the texture for the following draws. Returns `false` if it could not be bound.
    fn bind_texture(&mut self, texture: &Texture) -> bool;

    fn load_opacity(&mut self, opacity: f32);

    /// Maps terrain texture coordinates to image texture coordinates.
    fn load_tex_sampler_matrix(&mut self, matrix: &DMat4);

    /// Maps terrain texture coordinates to the unit square of the image tile, so fragments
    /// outside of it can be discarded.
    fn load_tex_mask_matrix(&mut self, matrix: &DMat4);

    fn begin_rendering_tile(&mut self, tile: &TerrainTile) -> Result<()>;

    fn render_tile(&mut self, tile: &TerrainTile) -> Result<()>;

    fn end_rendering_tile(&mut self, tile: &TerrainTile);
}

/// Everything a layer needs to assemble and draw one frame.
pub struct DrawContext<'a> {
    pub globe: &'a Globe,
    pub eye_point: DVec3,
    pub vertical_exaggeration: f64,
    /// The vertical field of view in radians.
    pub field_of_view: f64,
    pub viewport: UVec2,
    pub visible_sector: Sector,
    pub terrain: Option<&'a Terrain>,
    /// Seconds since startup.
    pub timestamp: f64,
    pub gpu_resource_cache: &'a mut GpuResourceCache,
    pub graphics: &'a mut dyn GraphicsContext,
    pub frame_statistics: &'a mut FrameStatistics,
}

impl DrawContext<'_> {
    /// The size of a pixel at the distance from the eye, in meters.
    pub fn pixel_size_at_distance(&self, distance: f64) -> f64 {
        let height = self.viewport.y.max(1) as f64;
        2.0 * distance * (0.5 * self.field_of_view).tan() / height
    }

    /// The eye's height above the globe's equatorial radius.
    pub fn eye_altitude(&self) -> f64 {
        self.eye_point.length() - self.globe.equatorial_radius()
    }
}
