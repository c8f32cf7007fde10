use crate::{
    addressing::{
        GeodeticScheme, TileAddressingScheme, WebMercatorScheme, WmtsCapabilities, WmtsScheme,
    },
    cache::DEFAULT_CACHE_CAPACITY,
    error::ConfigurationError,
    math::{Location, Sector},
    tiling::LevelSet,
};
use anyhow::Result;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// How the tiles of a layer are addressed and requested.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum AddressingConfig {
    /// A geodetic grid requested through a URL template with `{level}`, `{row}` and
    /// `{column}` placeholders.
    Geodetic { url_template: String },
    /// A Web Mercator pyramid requested as `{base_url}/{zoom}/{column}/{row}.{suffix}`.
    WebMercator { base_url: String, suffix: String },
    /// A WMTS layer; its tile matrices define the levels.
    Wmts(WmtsCapabilities),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// The maximum number of fetches in flight per layer.
    pub max_concurrent: usize,
    /// Failures after which a resource is never requested again.
    pub max_tries: u32,
    /// Seconds to wait before requesting a failed resource again.
    pub min_check_interval_secs: f64,
    /// Drop fetched images whose tiles were no longer requested in the latest frame.
    pub discard_superseded: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            max_tries: 3,
            min_check_interval_secs: 50.0,
            discard_superseded: false,
        }
    }
}

fn default_detail_control() -> f64 {
    1.75
}

fn default_opacity() -> f32 {
    1.0
}

/// The description of a tiled imagery layer, loaded from `*.imagery.ron` files.
#[derive(Asset, TypePath, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageryLayerConfig {
    pub name: String,
    #[serde(default = "full_sphere")]
    pub sector: Sector,
    /// Ignored by WMTS layers, whose tile matrices define the levels.
    pub level_zero_delta: Location,
    pub num_levels: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    #[serde(default = "default_detail_control")]
    pub detail_control: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    pub scheme: AddressingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

fn full_sphere() -> Sector {
    Sector::FULL_SPHERE
}

impl ImageryLayerConfig {
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let encoded = fs::read_to_string(path)?;
        Ok(ron::from_str(&encoded)?)
    }

    /// Builds the addressing scheme, together with the level set it owns.
    pub fn addressing_scheme(&self) -> Result<TileAddressingScheme, ConfigurationError> {
        let level_set = || {
            LevelSet::new(
                self.sector,
                self.level_zero_delta,
                self.num_levels,
                self.tile_width,
                self.tile_height,
            )
        };

        Ok(match &self.scheme {
            AddressingConfig::Geodetic { url_template } => {
                TileAddressingScheme::Geodetic(GeodeticScheme::new(level_set()?, url_template))
            }
            AddressingConfig::WebMercator { base_url, suffix } => {
                TileAddressingScheme::WebMercator(WebMercatorScheme::new(
                    level_set()?,
                    base_url,
                    suffix,
                ))
            }
            AddressingConfig::Wmts(capabilities) => {
                TileAddressingScheme::Wmts(WmtsScheme::new(capabilities.clone())?)
            }
        })
    }
}

/// Global settings of the surface imagery.
#[derive(Resource, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SurfaceImageryConfig {
    /// The capacity of the shared texture cache in bytes.
    pub cache_capacity: usize,
    /// The used capacity the texture cache shrinks to once it overflows.
    pub cache_low_water: usize,
    /// How many ancestors are searched for a substitute texture.
    pub max_fallback_depth: u32,
}

impl Default for SurfaceImageryConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_low_water: DEFAULT_CACHE_CAPACITY * 4 / 5,
            max_fallback_depth: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUE_MARBLE: &str = r#"(
        name: "blue_marble",
        level_zero_delta: (latitude: 45.0, longitude: 45.0),
        num_levels: 5,
        tile_width: 512,
        tile_height: 512,
        scheme: Geodetic(url_template: "blue_marble/{level}/{row}/{row}_{column}.jpg"),
    )"#;

    #[test]
    fn defaults_are_filled_in() {
        let config: ImageryLayerConfig = ron::from_str(BLUE_MARBLE).unwrap();

        assert_eq!(config.sector, Sector::FULL_SPHERE);
        assert_eq!(config.detail_control, 1.75);
        assert_eq!(config.opacity, 1.0);
        assert_eq!(config.retrieval, RetrievalConfig::default());

        let scheme = config.addressing_scheme().unwrap();
        assert_eq!(scheme.level_set().level_count(), 5);
        assert!(!scheme.is_mercator());
    }

    #[test]
    fn mercator_layer() {
        let config: ImageryLayerConfig = ron::from_str(
            r#"(
                name: "osm",
                sector: (min_latitude: -85.05112878, max_latitude: 85.05112878,
                         min_longitude: -180.0, max_longitude: 180.0),
                level_zero_delta: (latitude: 170.10225756, longitude: 360.0),
                num_levels: 19,
                tile_width: 256,
                tile_height: 256,
                opacity: 0.5,
                scheme: WebMercator(base_url: "https://tile.example.org", suffix: "png"),
                retrieval: (max_concurrent: 4),
            )"#,
        )
        .unwrap();

        assert_eq!(config.retrieval.max_concurrent, 4);
        assert_eq!(config.retrieval.max_tries, 3);
        assert!(config.addressing_scheme().unwrap().is_mercator());
    }

    #[test]
    fn invalid_level_set_is_a_configuration_error() {
        let mut config: ImageryLayerConfig = ron::from_str(BLUE_MARBLE).unwrap();
        config.num_levels = 0;

        assert_eq!(
            config.addressing_scheme().err(),
            Some(ConfigurationError::InvalidLevelCount { count: 0 })
        );
    }

    #[test]
    fn bundled_layers_parse() {
        for path in [
            "assets/layers/blue_marble.imagery.ron",
            "assets/layers/open_street_map.imagery.ron",
            "assets/layers/wmts.imagery.ron",
        ] {
            let config = ImageryLayerConfig::load_file(path).unwrap();
            assert!(config.addressing_scheme().is_ok(), "{path}");
        }
    }
}
