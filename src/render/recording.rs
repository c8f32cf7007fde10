use crate::{
    render::{GraphicsContext, TerrainTile, Texture},
    tiling::TileKey,
};
use anyhow::{anyhow, Result};
use bevy::math::DMat4;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    BindTexture(u32),
    LoadOpacity(f32),
    LoadSampler(DMat4),
    LoadMask(DMat4),
    RenderTile(TileKey),
}

/// Records the calls made to it and fails rendering of the listed terrain tiles.
#[derive(Default)]
pub(crate) struct RecordingGraphics {
    pub(crate) calls: Vec<Call>,
    pub(crate) failing_tiles: Vec<TileKey>,
}

impl RecordingGraphics {
    pub(crate) fn draws(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::RenderTile(_)))
            .count()
    }

    pub(crate) fn samplers(&self) -> Vec<DMat4> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::LoadSampler(matrix) => Some(*matrix),
                _ => None,
            })
            .collect()
    }
}

impl GraphicsContext for RecordingGraphics {
    fn begin_surface_rendering(&mut self) {}

    fn end_surface_rendering(&mut self) {}

    fn bind_texture(&mut self, texture: &Texture) -> bool {
        self.calls.push(Call::BindTexture(texture.width()));
        true
    }

    fn load_opacity(&mut self, opacity: f32) {
        self.calls.push(Call::LoadOpacity(opacity));
    }

    fn load_tex_sampler_matrix(&mut self, matrix: &DMat4) {
        self.calls.push(Call::LoadSampler(*matrix));
    }

    fn load_tex_mask_matrix(&mut self, matrix: &DMat4) {
        self.calls.push(Call::LoadMask(*matrix));
    }

    fn begin_rendering_tile(&mut self, _tile: &TerrainTile) -> Result<()> {
        Ok(())
    }

    fn render_tile(&mut self, tile: &TerrainTile) -> Result<()> {
        if self.failing_tiles.contains(&tile.key) {
            return Err(anyhow!("lost device"));
        }

        self.calls.push(Call::RenderTile(tile.key));
        Ok(())
    }

    fn end_rendering_tile(&mut self, _tile: &TerrainTile) {}
}
