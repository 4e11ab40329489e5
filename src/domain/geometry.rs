//! Drawn shapes and the helper geometry derived from them
//!
//! A [`Shape`] is what a draw interaction produces: a geometry tagged with
//! its kind and the reference system its coordinates are in.

use std::fmt;
use std::str::FromStr;

use geo::CoordsIter;
use geo_types::{Coord, Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};

use super::projection::{Crs, Reproject, to_crs};
use crate::error::{FilterError, Result};
use crate::filter::distance;

/// Kind of geometry a draw interaction produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

impl GeometryKind {
    /// Classify a geo-types geometry; `None` for kinds a filter cannot hold
    pub fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) => Some(GeometryKind::Point),
            Geometry::Line(_) | Geometry::LineString(_) => Some(GeometryKind::LineString),
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                Some(GeometryKind::Polygon)
            }
            Geometry::MultiPoint(_) => Some(GeometryKind::MultiPoint),
            Geometry::MultiLineString(_) => Some(GeometryKind::MultiLineString),
            Geometry::MultiPolygon(_) => Some(GeometryKind::MultiPolygon),
            Geometry::GeometryCollection(_) => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::MultiPolygon => "MultiPolygon",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeometryKind {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "point" => Ok(GeometryKind::Point),
            "linestring" | "line" => Ok(GeometryKind::LineString),
            "polygon" => Ok(GeometryKind::Polygon),
            "multipoint" => Ok(GeometryKind::MultiPoint),
            "multilinestring" => Ok(GeometryKind::MultiLineString),
            "multipolygon" => Ok(GeometryKind::MultiPolygon),
            _ => Err(FilterError::InvalidGeometry(format!(
                "unknown geometry kind: {s}"
            ))),
        }
    }
}

/// A drawn geometry in a known reference system
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    kind: GeometryKind,
    geometry: Geometry<f64>,
    crs: Crs,
}

impl Shape {
    /// Wrap a geometry, normalizing `Line`/`Rect`/`Triangle` to their
    /// LineString/Polygon equivalents
    pub fn new(geometry: Geometry<f64>, crs: Crs) -> Result<Self> {
        let kind = GeometryKind::of(&geometry).ok_or_else(|| {
            FilterError::InvalidGeometry("geometry collections cannot be drawn".into())
        })?;

        let geometry = match geometry {
            Geometry::Line(line) => Geometry::LineString(LineString::from(vec![line.start, line.end])),
            Geometry::Rect(rect) => Geometry::Polygon(rect.to_polygon()),
            Geometry::Triangle(tri) => Geometry::Polygon(tri.to_polygon()),
            other => other,
        };

        if geometry.coords_count() == 0 {
            return Err(FilterError::InvalidGeometry(format!("empty {kind}")));
        }
        if geometry.coords_iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(FilterError::InvalidGeometry(format!(
                "{kind} has non-finite coordinates"
            )));
        }

        Ok(Self {
            kind,
            geometry,
            crs,
        })
    }

    /// Parse a WKT literal
    pub fn from_wkt(wkt: &str, crs: Crs) -> Result<Self> {
        Self::new(parse_wkt(wkt)?, crs)
    }

    pub fn point(x: f64, y: f64, crs: Crs) -> Result<Self> {
        Self::new(Geometry::Point((x, y).into()), crs)
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Geometry expressed in `target`
    pub fn geometry_in(&self, target: &Crs, reprojector: &dyn Reproject) -> Result<Geometry<f64>> {
        to_crs(reprojector, &self.geometry, &self.crs, target)
    }
}

/// Parse WKT text into a geo-types geometry
pub fn parse_wkt(wkt: &str) -> Result<Geometry<f64>> {
    wkt::Wkt::<f64>::from_str(wkt)
        .map_err(|e| FilterError::InvalidGeometry(format!("WKT parse error: {e}")))
        .and_then(|w| {
            w.try_into().map_err(|e: wkt::conversion::Error| {
                FilterError::InvalidGeometry(format!("WKT conversion error: {e:?}"))
            })
        })
}

/// Helper geometry derived from a shape each time it is drawn or moved
///
/// The renderer draws these as overlays; they never feed back into the
/// shape itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedGeometry {
    /// Distance parameter of the operator bound to the shape, in meters
    pub distance: Option<f64>,
    /// Circle of `distance` meters around a point shape, in the shape's CRS
    pub buffer: Option<Polygon<f64>>,
    /// Segment from the point to the circle's northern edge, in the shape's CRS
    pub radius_line: Option<LineString<f64>>,
}

impl DerivedGeometry {
    /// Compute the overlays for `shape` with an optional distance
    pub fn compute(
        shape: &Shape,
        distance: Option<f64>,
        segments: usize,
        reprojector: &dyn Reproject,
    ) -> Result<Self> {
        let (Some(meters), Geometry::Point(_)) = (distance, shape.geometry()) else {
            return Ok(Self {
                distance,
                ..Self::default()
            });
        };

        let wgs84 = Crs::wgs84();
        let Geometry::Point(center) = shape.geometry_in(&wgs84, reprojector)? else {
            return Ok(Self {
                distance,
                ..Self::default()
            });
        };

        let center: Coord<f64> = center.0;
        let ring = distance::geodesic_circle(center, meters, segments);
        let edge = distance::destination(center, 0.0, meters);
        let radius = LineString::from(vec![center, edge]);

        let back = |g: Geometry<f64>| to_crs(reprojector, &g, &wgs84, shape.crs());
        let buffer = match back(Geometry::Polygon(Polygon::new(ring, vec![])))? {
            Geometry::Polygon(p) => Some(p),
            _ => None,
        };
        let radius_line = match back(Geometry::LineString(radius))? {
            Geometry::LineString(l) => Some(l),
            _ => None,
        };

        Ok(Self {
            distance,
            buffer,
            radius_line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::projection::WebMercator;
    use geo_types::{Rect, coord};

    #[test]
    fn test_shape_normalizes_rect() {
        let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 2.0, y: 1.0 });
        let shape = Shape::new(Geometry::Rect(rect), Crs::wgs84()).unwrap();
        assert_eq!(shape.kind(), GeometryKind::Polygon);
        assert!(matches!(shape.geometry(), Geometry::Polygon(_)));
    }

    #[test]
    fn test_shape_rejects_collection() {
        let gc = Geometry::GeometryCollection(geo_types::GeometryCollection::default());
        assert!(matches!(
            Shape::new(gc, Crs::wgs84()),
            Err(FilterError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_point_rejects_non_finite() {
        assert!(matches!(
            Shape::point(f64::NAN, 0.0, Crs::wgs84()),
            Err(FilterError::InvalidGeometry(_))
        ));
        assert!(Shape::point(0.0, f64::INFINITY, Crs::wgs84()).is_err());
        assert_eq!(Shape::point(1.0, 2.0, Crs::wgs84()).unwrap().kind(), GeometryKind::Point);
    }

    #[test]
    fn test_from_wkt() {
        let shape = Shape::from_wkt("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))", Crs::wgs84()).unwrap();
        assert_eq!(shape.kind(), GeometryKind::Polygon);
        assert!(Shape::from_wkt("POLYGON((0 0,", Crs::wgs84()).is_err());
    }

    #[test]
    fn test_geometry_kind_from_str() {
        assert_eq!("point".parse::<GeometryKind>().unwrap(), GeometryKind::Point);
        assert_eq!("Polygon".parse::<GeometryKind>().unwrap(), GeometryKind::Polygon);
        assert!("circle".parse::<GeometryKind>().is_err());
    }

    #[test]
    fn test_derived_buffer_for_point() {
        let shape = Shape::point(10.0, 50.0, Crs::wgs84()).unwrap();
        let derived = DerivedGeometry::compute(&shape, Some(1000.0), 32, &WebMercator).unwrap();
        let buffer = derived.buffer.unwrap();
        // closed ring: segments + 1 coordinates
        assert_eq!(buffer.exterior().0.len(), 33);
        let line = derived.radius_line.unwrap();
        assert!(line.0[1].y > 50.0);
    }

    #[test]
    fn test_derived_without_distance() {
        let shape = Shape::point(10.0, 50.0, Crs::wgs84()).unwrap();
        let derived = DerivedGeometry::compute(&shape, None, 32, &WebMercator).unwrap();
        assert_eq!(derived, DerivedGeometry::default());
    }
}
