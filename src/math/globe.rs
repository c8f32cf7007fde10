use crate::{error::ComputationError, math::Sector};
use bevy::math::DVec3;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum GlobeShape {
    Sphere { radius: f64 },
    Spheroid { major_axis: f64, minor_axis: f64 },
}

impl GlobeShape {
    pub const WGS84: Self = GlobeShape::Spheroid {
        major_axis: 6378137.0,
        minor_axis: 6356752.314245,
    };

    pub fn validate(self) -> Result<Self, ComputationError> {
        let radius = match self {
            GlobeShape::Sphere { radius } => radius,
            GlobeShape::Spheroid {
                major_axis,
                minor_axis,
            } => major_axis.min(minor_axis),
        };

        if radius > 0.0 && radius.is_finite() {
            Ok(self)
        } else {
            Err(ComputationError::NegativeRadius { radius })
        }
    }

    pub fn equatorial_radius(self) -> f64 {
        match self {
            GlobeShape::Sphere { radius } => radius,
            GlobeShape::Spheroid { major_axis, .. } => major_axis,
        }
    }

    pub fn polar_radius(self) -> f64 {
        match self {
            GlobeShape::Sphere { radius } => radius,
            GlobeShape::Spheroid { minor_axis, .. } => minor_axis,
        }
    }

    pub fn eccentricity_squared(self) -> f64 {
        match self {
            GlobeShape::Sphere { .. } => 0.0,
            GlobeShape::Spheroid {
                major_axis,
                minor_axis,
            } => 1.0 - (minor_axis * minor_axis) / (major_axis * major_axis),
        }
    }
}

/// Supplies terrain elevations to the tile geometry.
///
/// The timestamp changes whenever the elevations change, which invalidates all tile
/// geometry computed against an older timestamp.
pub trait ElevationModel: Send + Sync {
    fn timestamp(&self) -> u64;

    /// The minimum and maximum elevation in meters inside the sector.
    fn min_and_max_elevations(&self, sector: &Sector) -> (f64, f64);
}

/// An elevation model with a constant elevation everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatElevationModel {
    pub elevation: f64,
    pub timestamp: u64,
}

impl ElevationModel for FlatElevationModel {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn min_and_max_elevations(&self, _sector: &Sector) -> (f64, f64) {
        (self.elevation, self.elevation)
    }
}

/// The ellipsoid the imagery is draped on, together with its elevation model.
#[derive(Clone)]
pub struct Globe {
    shape: GlobeShape,
    pub elevation_model: Arc<dyn ElevationModel>,
}

impl Globe {
    pub fn new(
        shape: GlobeShape,
        elevation_model: Arc<dyn ElevationModel>,
    ) -> Result<Self, ComputationError> {
        Ok(Self {
            shape: shape.validate()?,
            elevation_model,
        })
    }

    pub fn sphere(radius: f64) -> Result<Self, ComputationError> {
        Self::new(
            GlobeShape::Sphere { radius },
            Arc::new(FlatElevationModel::default()),
        )
    }

    pub fn wgs84() -> Self {
        Self {
            shape: GlobeShape::WGS84,
            elevation_model: Arc::new(FlatElevationModel::default()),
        }
    }

    pub fn shape(&self) -> GlobeShape {
        self.shape
    }

    pub fn equatorial_radius(&self) -> f64 {
        self.shape.equatorial_radius()
    }

    /// Converts a geographic position to a cartesian point.
    /// The y axis points to the north pole and the z axis intersects the prime meridian.
    pub fn compute_point_from_position(
        &self,
        latitude: f64,
        longitude: f64,
        elevation: f64,
    ) -> DVec3 {
        let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
        let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();

        let e2 = self.shape.eccentricity_squared();
        let radius = self.equatorial_radius() / (1.0 - e2 * sin_lat * sin_lat).sqrt();

        DVec3::new(
            (radius + elevation) * cos_lat * sin_lon,
            (radius * (1.0 - e2) + elevation) * sin_lat,
            (radius + elevation) * cos_lat * cos_lon,
        )
    }
}

impl fmt::Debug for Globe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Globe")
            .field("shape", &self.shape)
            .field("elevation_timestamp", &self.elevation_model.timestamp())
            .finish()
    }
}
