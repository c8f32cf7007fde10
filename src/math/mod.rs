mod bounding_box;
mod globe;
mod sector;
pub mod web_mercator;

pub use crate::math::{
    bounding_box::BoundingBox,
    globe::{ElevationModel, FlatElevationModel, Globe, GlobeShape},
    sector::{Location, Sector},
};

/// Relative position of `value` between `start` and `end`, the inverse of a linear mix.
pub fn inverse_mix(start: f64, end: f64, value: f64) -> f64 {
    (value - start) / (end - start)
}
