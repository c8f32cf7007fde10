use derive_more::derive::{Display, Error};

/// Invalid layer or tiling configuration.
///
/// These are raised while constructing a [`LevelSet`](crate::tiling::LevelSet) or a
/// [`TileAddressingScheme`](crate::addressing::TileAddressingScheme) and are never recovered.
#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[display("invalid sector: {reason}")]
    InvalidSector { reason: String },
    #[display("level zero tile delta must be positive, got ({latitude}, {longitude})")]
    NonPositiveTileDelta { latitude: f64, longitude: f64 },
    #[display("a level set requires at least one level, got {count}")]
    InvalidLevelCount { count: u32 },
    #[display("tile dimensions must be at least 1x1, got {width}x{height}")]
    InvalidTileSize { width: u32, height: u32 },
    #[display("unsupported coordinate reference system: {crs}")]
    UnsupportedCrs { crs: String },
    #[display("invalid tile matrix: {reason}")]
    InvalidTileMatrix { reason: String },
}

/// A resource could not be retrieved. The affected tile stays textureless.
#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum ResourceError {
    #[display("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[display("failed to decode {url}: {message}")]
    Decode { url: String, message: String },
}

/// Degenerate input passed to a geometric computation.
#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum ComputationError {
    #[display("radius must be positive, got {radius}")]
    NegativeRadius { radius: f64 },
}
