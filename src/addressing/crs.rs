use crate::error::ConfigurationError;

/// The coordinate reference systems tiles can be addressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// Equirectangular latitude and longitude (EPSG:4326, CRS:84).
    Geographic,
    /// Spherical Mercator (EPSG:3857).
    WebMercator,
}

impl Crs {
    pub fn parse(crs: &str) -> Result<Self, ConfigurationError> {
        let normalized = crs.trim().to_ascii_uppercase();

        match normalized.as_str() {
            "EPSG:4326"
            | "CRS:84"
            | "URN:OGC:DEF:CRS:EPSG::4326"
            | "URN:OGC:DEF:CRS:OGC:1.3:CRS84" => Ok(Crs::Geographic),
            "EPSG:3857" | "EPSG:900913" | "EPSG:102100" | "URN:OGC:DEF:CRS:EPSG::3857" => {
                Ok(Crs::WebMercator)
            }
            _ => Err(ConfigurationError::UnsupportedCrs {
                crs: crs.to_string(),
            }),
        }
    }
}
