use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A geographic position or angular extent in degrees.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// An axis-aligned geographic rectangle, bounded by minimum and maximum latitude and
/// longitude in degrees.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Sector {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Sector {
    pub const FULL_SPHERE: Self = Sector::new(-90.0, 90.0, -180.0, 180.0);

    pub const fn new(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> Self {
        Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        }
    }

    pub fn from_degrees(min_latitude: f64, min_longitude: f64, delta: Location) -> Self {
        Self::new(
            min_latitude,
            min_latitude + delta.latitude,
            min_longitude,
            min_longitude + delta.longitude,
        )
    }

    pub fn delta_latitude(&self) -> f64 {
        self.max_latitude - self.min_latitude
    }

    pub fn delta_longitude(&self) -> f64 {
        self.max_longitude - self.min_longitude
    }

    pub fn delta(&self) -> Location {
        Location::new(self.delta_latitude(), self.delta_longitude())
    }

    pub fn centroid(&self) -> Location {
        Location::new(
            0.5 * (self.min_latitude + self.max_latitude),
            0.5 * (self.min_longitude + self.max_longitude),
        )
    }

    /// Whether the interiors of both sectors intersect. Sectors that only share an edge
    /// do not overlap.
    pub fn overlaps(&self, other: &Sector) -> bool {
        self.min_longitude < other.max_longitude
            && other.min_longitude < self.max_longitude
            && self.min_latitude < other.max_latitude
            && other.min_latitude < self.max_latitude
    }

    /// Whether the closed sectors intersect, including shared edges.
    pub fn intersects(&self, other: &Sector) -> bool {
        self.min_longitude <= other.max_longitude
            && other.min_longitude <= self.max_longitude
            && self.min_latitude <= other.max_latitude
            && other.min_latitude <= self.max_latitude
    }

    pub fn contains(&self, location: Location) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&location.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&location.longitude)
    }

    pub fn is_empty(&self) -> bool {
        self.delta_latitude() <= 0.0 || self.delta_longitude() <= 0.0
    }

    /// The nine locations of a regular 3x3 grid covering the sector, ordered south to north
    /// and west to east within each row.
    pub fn grid_locations(&self) -> [Location; 9] {
        let mut locations = [Location::default(); 9];
        let center = self.centroid();
        let latitudes = [self.min_latitude, center.latitude, self.max_latitude];
        let longitudes = [self.min_longitude, center.longitude, self.max_longitude];

        for (index, location) in locations.iter_mut().enumerate() {
            *location = Location::new(latitudes[index / 3], longitudes[index % 3]);
        }

        locations
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let values = [
            self.min_latitude,
            self.max_latitude,
            self.min_longitude,
            self.max_longitude,
        ];

        let reason = if values.iter().any(|value| !value.is_finite()) {
            "bounds must be finite"
        } else if self.min_latitude > self.max_latitude
            || self.min_longitude > self.max_longitude
        {
            "minimum exceeds maximum"
        } else if self.min_latitude < -90.0 || self.max_latitude > 90.0 {
            "latitude outside [-90, 90]"
        } else if self.min_longitude < -180.0 || self.max_longitude > 180.0 {
            "longitude outside [-180, 180]"
        } else {
            return Ok(());
        };

        Err(ConfigurationError::InvalidSector {
            reason: format!("{reason} for {self}"),
        })
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) - ({}, {})",
            self.min_latitude, self.min_longitude, self.max_latitude, self.max_longitude
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_sectors_intersect_but_do_not_overlap() {
        let west = Sector::new(0.0, 10.0, 0.0, 10.0);
        let east = Sector::new(0.0, 10.0, 10.0, 20.0);

        assert!(!west.overlaps(&east));
        assert!(west.intersects(&east));
        assert!(west.overlaps(&Sector::new(5.0, 6.0, 9.0, 11.0)));
    }

    #[test]
    fn validation_rejects_inverted_and_out_of_range_sectors() {
        assert!(Sector::FULL_SPHERE.validate().is_ok());
        assert!(Sector::new(10.0, 0.0, 0.0, 10.0).validate().is_err());
        assert!(Sector::new(-95.0, 0.0, 0.0, 10.0).validate().is_err());
        assert!(Sector::new(0.0, 10.0, 0.0, 190.0).validate().is_err());
        assert!(Sector::new(0.0, f64::NAN, 0.0, 10.0).validate().is_err());
    }

    #[test]
    fn grid_locations_cover_corners_and_center() {
        let sector = Sector::new(0.0, 10.0, 20.0, 40.0);
        let grid = sector.grid_locations();

        assert_eq!(grid[0], Location::new(0.0, 20.0));
        assert_eq!(grid[4], Location::new(5.0, 30.0));
        assert_eq!(grid[8], Location::new(10.0, 40.0));
    }
}
