use crate::{
    math::Sector,
    render::{DrawContext, TerrainTile},
};
use anyhow::Result;
use bevy::{
    log::warn,
    math::{DMat4, DVec4},
};

/// Flips the t axis, since image rows start in the north.
const UNIT_Y_FLIP: DMat4 = DMat4::from_cols(
    DVec4::new(1.0, 0.0, 0.0, 0.0),
    DVec4::new(0.0, -1.0, 0.0, 0.0),
    DVec4::new(0.0, 0.0, 1.0, 0.0),
    DVec4::new(0.0, 1.0, 0.0, 1.0),
);

/// An image tile that can be draped onto the terrain.
pub trait SurfaceTile {
    fn sector(&self) -> &Sector;

    fn opacity(&self) -> f32 {
        1.0
    }

    /// Binds the tile's texture, or a substitute for it.
    ///
    /// On success returns the transform from this tile's texture coordinates to the
    /// coordinates of the texture that was actually bound.
    fn bind(&self, dc: &mut DrawContext) -> Option<DMat4>;
}

/// Maps texture coordinates of the `destination` sector to those of the `source` sector.
pub fn tile_transform(source: &Sector, destination: &Sector) -> DMat4 {
    let source_delta_latitude = source.delta_latitude();
    let source_delta_longitude = source.delta_longitude();

    let (s_scale, s_translation) = if source_delta_longitude != 0.0 {
        (
            destination.delta_longitude() / source_delta_longitude,
            -(source.min_longitude - destination.min_longitude) / source_delta_longitude,
        )
    } else {
        (1.0, 0.0)
    };

    let (t_scale, t_translation) = if source_delta_latitude != 0.0 {
        (
            destination.delta_latitude() / source_delta_latitude,
            -(source.min_latitude - destination.min_latitude) / source_delta_latitude,
        )
    } else {
        (1.0, 0.0)
    };

    DMat4::from_cols(
        DVec4::new(s_scale, 0.0, 0.0, 0.0),
        DVec4::new(0.0, t_scale, 0.0, 0.0),
        DVec4::new(0.0, 0.0, 1.0, 0.0),
        DVec4::new(s_translation, t_translation, 0.0, 1.0),
    )
}

/// Composites image tiles onto the terrain tessellation.
#[derive(Debug, Default)]
pub struct SurfaceTileRenderer;

impl SurfaceTileRenderer {
    /// Draws every terrain tile once per overlapping image tile whose texture can be bound.
    ///
    /// A failing terrain tile is logged and skipped, the rest of the frame is still drawn.
    pub fn render_tiles<T: SurfaceTile>(
        dc: &mut DrawContext,
        surface_tiles: &[T],
        opacity: f32,
        tiles_have_opacity: bool,
    ) -> u32 {
        let Some(terrain) = dc.terrain else {
            return 0;
        };

        if surface_tiles.is_empty() {
            return 0;
        }

        let mut current_opacity = opacity;
        let mut tile_count = 0;

        dc.graphics.begin_surface_rendering();
        dc.graphics.load_opacity(opacity);

        for terrain_tile in &terrain.tiles {
            let result = Self::render_terrain_tile(
                dc,
                terrain_tile,
                surface_tiles,
                opacity,
                tiles_have_opacity,
                &mut current_opacity,
                &mut tile_count,
            );

            if let Err(error) = result {
                warn!("Failed to render terrain tile {}: {error:#}", terrain_tile.key);
            }

            dc.graphics.end_rendering_tile(terrain_tile);
        }

        dc.graphics.end_surface_rendering();
        dc.frame_statistics.rendered_tile_count += tile_count;

        tile_count
    }

    fn render_terrain_tile<T: SurfaceTile>(
        dc: &mut DrawContext,
        terrain_tile: &TerrainTile,
        surface_tiles: &[T],
        opacity: f32,
        tiles_have_opacity: bool,
        current_opacity: &mut f32,
        tile_count: &mut u32,
    ) -> Result<()> {
        dc.graphics.begin_rendering_tile(terrain_tile)?;

        for surface_tile in surface_tiles {
            if !surface_tile.sector().overlaps(&terrain_tile.sector) {
                continue;
            }

            let Some(internal_transform) = surface_tile.bind(dc) else {
                continue;
            };

            if tiles_have_opacity {
                let tile_opacity = opacity * surface_tile.opacity();

                if tile_opacity != *current_opacity {
                    dc.graphics.load_opacity(tile_opacity);
                    *current_opacity = tile_opacity;
                }
            }

            let mask = tile_transform(surface_tile.sector(), &terrain_tile.sector);
            let sampler = UNIT_Y_FLIP * internal_transform * mask;

            dc.graphics.load_tex_mask_matrix(&mask);
            dc.graphics.load_tex_sampler_matrix(&sampler);
            dc.graphics.render_tile(terrain_tile)?;

            *tile_count += 1;
        }

        Ok(())
    }
}
