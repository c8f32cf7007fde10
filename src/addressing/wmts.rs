use crate::{
    addressing::Crs,
    error::ConfigurationError,
    math::{
        web_mercator::{
            latitude_from_normalized_y, longitude_from_normalized_x, normalized_from_meters,
            RADIUS,
        },
        Location, Sector,
    },
    tiling::{Level, LevelSet, TileKey},
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// The standardized rendering pixel size of WMTS, in meters.
const STANDARD_PIXEL_SIZE: f64 = 0.00028;

/// The tile request parameters of a WMTS layer, as parsed from its capabilities document.
///
/// `extent` is `[min_x, min_y, max_x, max_y]` and `top_left_corner` is `[x, y]`, both in
/// the units of `projection`. `resolutions` holds the units per pixel of every tile matrix.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WmtsCapabilities {
    pub url: String,
    pub matrix_set: String,
    pub tile_matrix: Vec<String>,
    pub extent: [f64; 4],
    pub resolutions: Vec<f64>,
    pub tile_size: u32,
    pub top_left_corner: [f64; 2],
    pub projection: String,
    pub layer_name: String,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_style() -> String {
    "default".to_string()
}

fn default_format() -> String {
    "image/png".to_string()
}

/// The geometry of one level of a WMTS tile matrix set.
#[derive(Debug, Clone, PartialEq)]
pub struct WmtsTileMatrix {
    pub identifier: String,
    pub matrix_width: u32,
    pub matrix_height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub top_left_corner: [f64; 2],
    pub scale_denominator: f64,
    /// The extent of one tile in projection units.
    tile_span: f64,
}

/// The number of tiles needed to cover the length, ignoring rounding noise.
fn tile_count(length: f64, tile_span: f64) -> u32 {
    (length / tile_span - 1e-9).ceil().max(1.0) as u32
}

#[derive(Debug, Clone)]
pub struct WmtsScheme {
    pub capabilities: WmtsCapabilities,
    pub crs: Crs,
    pub level_set: LevelSet,
    matrices: Vec<WmtsTileMatrix>,
}

impl WmtsScheme {
    pub fn new(capabilities: WmtsCapabilities) -> Result<Self, ConfigurationError> {
        let crs = Crs::parse(&capabilities.projection)?;
        let invalid = |reason: &str| ConfigurationError::InvalidTileMatrix {
            reason: format!("{reason} in layer {}", capabilities.layer_name),
        };

        if capabilities.tile_matrix.is_empty() {
            return Err(invalid("no tile matrices"));
        }
        if capabilities.tile_matrix.len() != capabilities.resolutions.len() {
            return Err(invalid("tile matrix and resolution counts differ"));
        }
        if capabilities.tile_size == 0 {
            return Err(invalid("tile size is zero"));
        }
        if capabilities.resolutions.iter().any(|&resolution| resolution <= 0.0) {
            return Err(invalid("non-positive resolution"));
        }
        if capabilities
            .resolutions
            .iter()
            .tuple_windows()
            .any(|(coarse, fine)| (coarse / fine - 2.0).abs() > 1e-6)
        {
            return Err(invalid("resolutions do not halve between tile matrices"));
        }

        let [min_x, min_y, max_x, max_y] = capabilities.extent;
        let [left, top] = capabilities.top_left_corner;
        if max_x <= min_x || max_y <= min_y {
            return Err(invalid("empty extent"));
        }

        let meters_per_unit = match crs {
            Crs::Geographic => TAU * RADIUS / 360.0,
            Crs::WebMercator => 1.0,
        };

        let matrices = capabilities
            .tile_matrix
            .iter()
            .zip(&capabilities.resolutions)
            .map(|(identifier, &resolution)| {
                let tile_span = resolution * capabilities.tile_size as f64;

                WmtsTileMatrix {
                    identifier: identifier.clone(),
                    matrix_width: tile_count(max_x - left, tile_span),
                    matrix_height: tile_count(top - min_y, tile_span),
                    tile_width: capabilities.tile_size,
                    tile_height: capabilities.tile_size,
                    top_left_corner: capabilities.top_left_corner,
                    scale_denominator: resolution * meters_per_unit / STANDARD_PIXEL_SIZE,
                    tile_span,
                }
            })
            .collect_vec();

        let sector = match crs {
            Crs::Geographic => Sector::new(min_y, max_y, min_x, max_x),
            Crs::WebMercator => Sector::new(
                latitude_from_normalized_y(normalized_from_meters(min_y)),
                latitude_from_normalized_y(normalized_from_meters(max_y)),
                longitude_from_normalized_x(normalized_from_meters(min_x)),
                longitude_from_normalized_x(normalized_from_meters(max_x)),
            ),
        };

        let first = &matrices[0];
        let level_zero_delta = match crs {
            Crs::Geographic => Location::new(first.tile_span, first.tile_span),
            Crs::WebMercator => Location::new(
                sector.delta_latitude() / first.matrix_height as f64,
                longitude_from_normalized_x(normalized_from_meters(first.tile_span)),
            ),
        };

        let level_set = LevelSet::new(
            sector,
            level_zero_delta,
            matrices.len() as u32,
            capabilities.tile_size,
            capabilities.tile_size,
        )?;

        Ok(Self {
            capabilities,
            crs,
            level_set,
            matrices,
        })
    }

    pub fn tile_matrix(&self, level: &Level) -> Option<&WmtsTileMatrix> {
        self.matrices.get(level.level_number as usize)
    }

    pub fn matrix_dimensions(&self, level: &Level) -> (u32, u32) {
        self.tile_matrix(level)
            .map_or((1, 1), |matrix| (matrix.matrix_height, matrix.matrix_width))
    }

    pub fn tile_sector(&self, level: &Level, row: u32, column: u32) -> Sector {
        let Some(matrix) = self.tile_matrix(level) else {
            return Sector::default();
        };

        let [left, top] = matrix.top_left_corner;
        let min_x = left + column as f64 * matrix.tile_span;
        let max_x = min_x + matrix.tile_span;
        let max_y = top - row as f64 * matrix.tile_span;
        let min_y = max_y - matrix.tile_span;

        match self.crs {
            Crs::Geographic => Sector::new(min_y, max_y, min_x, max_x),
            Crs::WebMercator => Sector::new(
                latitude_from_normalized_y(normalized_from_meters(min_y)),
                latitude_from_normalized_y(normalized_from_meters(max_y)),
                longitude_from_normalized_x(normalized_from_meters(min_x)),
                longitude_from_normalized_x(normalized_from_meters(max_x)),
            ),
        }
    }

    /// Builds a key-value-pair encoded GetTile request.
    pub fn url_for_tile(&self, level: &Level, key: TileKey) -> String {
        let capabilities = &self.capabilities;
        let identifier = self
            .tile_matrix(level)
            .map_or("", |matrix| matrix.identifier.as_str());
        let separator = if capabilities.url.contains('?') { '&' } else { '?' };

        format!(
            "{}{separator}SERVICE=WMTS&REQUEST=GetTile&VERSION=1.0.0&LAYER={}&STYLE={}&FORMAT={}\
             &TILEMATRIXSET={}&TILEMATRIX={identifier}&TILEROW={}&TILECOL={}",
            capabilities.url,
            capabilities.layer_name,
            capabilities.style,
            capabilities.format,
            capabilities.matrix_set,
            key.row,
            key.column,
        )
    }
}
