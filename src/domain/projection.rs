//! Coordinate reference systems and the reprojection capability
//!
//! Reprojection is supplied by the surrounding application through the
//! [`Reproject`] trait. [`WebMercator`] covers the two systems a web map
//! works with (geographic WGS84 and spherical mercator).

use std::fmt;

use geo::{CoordsIter, MapCoords};
use geo_types::{Coord, Geometry};
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};

/// Canonical code for geographic WGS84 (lon/lat degrees)
pub const EPSG_4326: &str = "EPSG:4326";
/// Canonical code for spherical (web) mercator
pub const EPSG_3857: &str = "EPSG:3857";

/// Coordinate reference system identifier, normalized to its canonical code
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Crs(String);

impl Crs {
    /// Create from a code such as `EPSG:4326`; known aliases are folded
    pub fn new(code: impl AsRef<str>) -> Self {
        let upper = code.as_ref().trim().to_ascii_uppercase();
        let canonical = match upper.as_str() {
            "CRS:84" | "WGS84" | "EPSG:4326" => EPSG_4326.to_string(),
            "EPSG:900913" | "EPSG:3857" | "EPSG:102100" => EPSG_3857.to_string(),
            _ => upper,
        };
        Self(canonical)
    }

    pub fn wgs84() -> Self {
        Self(EPSG_4326.to_string())
    }

    pub fn web_mercator() -> Self {
        Self(EPSG_3857.to_string())
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// Geographic systems measure in degrees; distances are computed on the sphere
    pub fn is_geographic(&self) -> bool {
        self.0 == EPSG_4326
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Crs {
    fn from(code: String) -> Self {
        Crs::new(code)
    }
}

impl From<&str> for Crs {
    fn from(code: &str) -> Self {
        Crs::new(code)
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.0
    }
}

/// Reprojection capability provided by the map collaborator
pub trait Reproject: Send + Sync {
    /// Convert `geometry` from `from` into `to`
    fn reproject(&self, geometry: &Geometry<f64>, from: &Crs, to: &Crs) -> Result<Geometry<f64>>;
}

/// Reproject only when the systems differ
pub fn to_crs(
    reprojector: &dyn Reproject,
    geometry: &Geometry<f64>,
    from: &Crs,
    to: &Crs,
) -> Result<Geometry<f64>> {
    if from == to {
        Ok(geometry.clone())
    } else {
        reprojector.reproject(geometry, from, to)
    }
}

/// Spherical mercator <-> WGS84 reprojection
#[derive(Clone, Copy, Debug, Default)]
pub struct WebMercator;

impl WebMercator {
    /// Semi-major axis used by EPSG:3857
    const RADIUS: f64 = 6_378_137.0;
    /// Latitude where the mercator square ends
    const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

    pub fn forward(c: Coord<f64>) -> Coord<f64> {
        let lat = c.y.clamp(-Self::MAX_LATITUDE, Self::MAX_LATITUDE);
        Coord {
            x: Self::RADIUS * c.x.to_radians(),
            y: Self::RADIUS * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln(),
        }
    }

    pub fn inverse(c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (c.x / Self::RADIUS).to_degrees(),
            y: (2.0 * (c.y / Self::RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees(),
        }
    }
}

impl Reproject for WebMercator {
    fn reproject(&self, geometry: &Geometry<f64>, from: &Crs, to: &Crs) -> Result<Geometry<f64>> {
        let convert: fn(Coord<f64>) -> Coord<f64> = match (from.code(), to.code()) {
            (a, b) if a == b => return Ok(geometry.clone()),
            (EPSG_4326, EPSG_3857) => Self::forward,
            (EPSG_3857, EPSG_4326) => Self::inverse,
            _ => {
                return Err(FilterError::ReprojectionFailure {
                    from: from.to_string(),
                    to: to.to_string(),
                    reason: "unsupported reference system pair".into(),
                });
            }
        };

        let projected = geometry.map_coords(convert);
        if coords_are_finite(&projected) {
            Ok(projected)
        } else {
            Err(FilterError::ReprojectionFailure {
                from: from.to_string(),
                to: to.to_string(),
                reason: "coordinate outside the projection's domain".into(),
            })
        }
    }
}

fn coords_are_finite(geometry: &Geometry<f64>) -> bool {
    geometry.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite())
}
