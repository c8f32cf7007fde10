//! Spherical Web Mercator (EPSG:3857) in normalized coordinates.
//!
//! Normalized coordinates span `[-0.5, 0.5]` on both axes, with `x` growing eastwards and
//! `y` growing northwards. Latitudes and longitudes are in degrees.

use std::f64::consts::{FRAC_PI_4, PI, TAU};

/// The radius of the sphere EPSG:3857 projects from, in meters.
pub const RADIUS: f64 = 6378137.0;

/// The latitude at which the square Web Mercator map is cut off.
pub const MAX_LATITUDE: f64 = 85.05112877980659;

/// The inverse Gudermannian function `ln(tan(pi/4 + lat/2))`, which maps a latitude to the
/// unscaled Mercator ordinate.
pub fn gudermannian_inverse(latitude: f64) -> f64 {
    (FRAC_PI_4 + 0.5 * latitude.to_radians()).tan().ln()
}

pub fn latitude_from_normalized_y(y: f64) -> f64 {
    90.0 - 360.0 * (-y * TAU).exp().atan() / PI
}

pub fn longitude_from_normalized_x(x: f64) -> f64 {
    360.0 * x
}

pub fn normalized_y_from_latitude(latitude: f64) -> f64 {
    gudermannian_inverse(latitude) / TAU
}

pub fn normalized_x_from_longitude(longitude: f64) -> f64 {
    longitude / 360.0
}

/// Converts projected meters to normalized coordinates.
pub fn normalized_from_meters(meters: f64) -> f64 {
    meters / (TAU * RADIUS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_edges() {
        assert!(latitude_from_normalized_y(0.0).abs() < 1e-12);
        assert!((latitude_from_normalized_y(0.5) - MAX_LATITUDE).abs() < 1e-9);
        assert!((latitude_from_normalized_y(-0.5) + MAX_LATITUDE).abs() < 1e-9);
        assert_eq!(longitude_from_normalized_x(-0.5), -180.0);
        assert!((normalized_from_meters(20037508.342789244) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn forward_inverts_inverse() {
        for step in -10..=10 {
            let y = step as f64 * 0.05;
            let latitude = latitude_from_normalized_y(y);
            assert!((normalized_y_from_latitude(latitude) - y).abs() < 1e-12);
        }
    }
}
