//! Minimum distance between geometries, and geodesic circles
//!
//! Geographic coordinates (lon/lat degrees) are measured on a sphere with
//! haversine distances; projected coordinates are measured in the plane.

use geo::{CoordsIter, Relate};
use geo_types::{Coord, Geometry, LineString, Polygon};

/// Mean earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// How distances between coordinates are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Great-circle meters between lon/lat degree coordinates
    Haversine,
    /// Straight-line distance in the coordinate units
    Planar,
}

impl Metric {
    pub fn between(self, a: Coord<f64>, b: Coord<f64>) -> f64 {
        match self {
            Metric::Haversine => haversine_distance(a, b),
            Metric::Planar => (a.x - b.x).hypot(a.y - b.y),
        }
    }

    /// Distance from `p` to the segment `a`-`b`
    ///
    /// The closest point is found in coordinate space and then measured
    /// with the metric, which is accurate for the short segments of drawn
    /// shapes.
    pub fn to_segment(self, p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        if dx == 0.0 && dy == 0.0 {
            return self.between(p, a);
        }

        let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / (dx * dx + dy * dy)).clamp(0.0, 1.0);
        let closest = Coord {
            x: a.x + t * dx,
            y: a.y + t * dy,
        };
        self.between(p, closest)
    }
}

/// Haversine distance in meters between two lon/lat coordinates
pub fn haversine_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let delta_lat = (b.y - a.y).to_radians();
    let delta_lng = (b.x - a.x).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Minimum distance between two geometries; zero when they intersect
///
/// For non-intersecting geometries the minimum is reached at a vertex of
/// one of them, so it is the smaller of the vertex-to-segment distances in
/// both directions.
pub fn min_distance(a: &Geometry<f64>, b: &Geometry<f64>, metric: Metric) -> f64 {
    if a.relate(b).is_intersects() {
        return 0.0;
    }

    let from_a = vertex_distance(a, b, metric);
    let from_b = vertex_distance(b, a, metric);
    from_a.min(from_b)
}

fn vertex_distance(from: &Geometry<f64>, to: &Geometry<f64>, metric: Metric) -> f64 {
    let segments = segments(to);
    from.coords_iter()
        .map(|p| {
            segments
                .iter()
                .map(|&(s, e)| metric.to_segment(p, s, e))
                .fold(f64::INFINITY, f64::min)
        })
        .fold(f64::INFINITY, f64::min)
}

/// All segments of a geometry; points become zero-length segments
fn segments(geometry: &Geometry<f64>) -> Vec<(Coord<f64>, Coord<f64>)> {
    let mut out = Vec::new();
    collect_segments(geometry, &mut out);
    out
}

fn collect_segments(geometry: &Geometry<f64>, out: &mut Vec<(Coord<f64>, Coord<f64>)>) {
    fn ring(ls: &LineString<f64>, out: &mut Vec<(Coord<f64>, Coord<f64>)>) {
        match ls.0.as_slice() {
            [] => {}
            [only] => out.push((*only, *only)),
            coords => out.extend(coords.windows(2).map(|w| (w[0], w[1]))),
        }
    }
    fn polygon(p: &Polygon<f64>, out: &mut Vec<(Coord<f64>, Coord<f64>)>) {
        ring(p.exterior(), out);
        for interior in p.interiors() {
            ring(interior, out);
        }
    }

    match geometry {
        Geometry::Point(p) => out.push((p.0, p.0)),
        Geometry::MultiPoint(mp) => out.extend(mp.iter().map(|p| (p.0, p.0))),
        Geometry::Line(l) => out.push((l.start, l.end)),
        Geometry::LineString(ls) => ring(ls, out),
        Geometry::MultiLineString(mls) => mls.iter().for_each(|ls| ring(ls, out)),
        Geometry::Polygon(p) => polygon(p, out),
        Geometry::MultiPolygon(mp) => mp.iter().for_each(|p| polygon(p, out)),
        Geometry::Rect(r) => polygon(&r.to_polygon(), out),
        Geometry::Triangle(t) => polygon(&t.to_polygon(), out),
        Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| collect_segments(g, out)),
    }
}

/// Point reached from `origin` travelling `meters` along `bearing` degrees
pub fn destination(origin: Coord<f64>, bearing: f64, meters: f64) -> Coord<f64> {
    let delta = meters / EARTH_RADIUS_METERS;
    let theta = bearing.to_radians();
    let lat1 = origin.y.to_radians();
    let lng1 = origin.x.to_radians();

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lng2 = lng1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    Coord {
        x: lng2.to_degrees(),
        y: lat2.to_degrees(),
    }
}

/// Closed ring of `segments` vertices approximating a circle of `meters`
/// around a lon/lat `center`
pub fn geodesic_circle(center: Coord<f64>, meters: f64, segments: usize) -> LineString<f64> {
    let segments = segments.max(3);
    let mut coords: Vec<Coord<f64>> = (0..segments)
        .map(|i| destination(center, 360.0 * i as f64 / segments as f64, meters))
        .collect();
    coords.push(coords[0]);
    LineString::from(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Point, coord, polygon};

    #[test]
    fn test_haversine_known_distance() {
        // Paris to London, roughly 344 km
        let paris = coord! { x: 2.3522, y: 48.8566 };
        let london = coord! { x: -0.1278, y: 51.5074 };
        let d = haversine_distance(paris, london);
        assert!((d - 343_500.0).abs() < 2_000.0, "distance was {d}");
    }

    #[test]
    fn test_min_distance_zero_when_inside() {
        let poly = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)
        ]);
        let inside = Geometry::Point(Point::new(5.0, 5.0));
        assert_eq!(min_distance(&inside, &poly, Metric::Planar), 0.0);
    }

    #[test]
    fn test_min_distance_planar_to_edge() {
        let poly = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)
        ]);
        let outside = Geometry::Point(Point::new(13.0, 5.0));
        assert!((min_distance(&outside, &poly, Metric::Planar) - 3.0).abs() < 1e-12);
        assert!((min_distance(&poly, &outside, Metric::Planar) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_distance_between_polygons_uses_both_directions() {
        // the nearest point of `a` to `b` is a vertex of `b`, not of `a`
        let a = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)
        ]);
        let b = Geometry::Polygon(polygon![
            (x: 12.0, y: 5.0), (x: 20.0, y: 0.0), (x: 20.0, y: 10.0)
        ]);
        assert!((min_distance(&a, &b, Metric::Planar) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_destination_and_circle() {
        let center = coord! { x: 0.0, y: 0.0 };
        let north = destination(center, 0.0, 111_195.0);
        assert!((north.y - 1.0).abs() < 1e-3);
        assert!(north.x.abs() < 1e-9);

        let ring = geodesic_circle(center, 10_000.0, 16);
        assert_eq!(ring.0.len(), 17);
        assert_eq!(ring.0.first(), ring.0.last());
        for c in &ring.0 {
            assert!((haversine_distance(center, *c) - 10_000.0).abs() < 1e-6);
        }
    }
}
