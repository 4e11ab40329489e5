//! CQL text filters
//!
//! Each predicate becomes a relation function over the geometry field and a
//! WKT literal, e.g. `DWITHIN(the_geom, POINT(-100 40), 500000, meters)`.
//! Predicates of a group are joined with `AND`, groups are parenthesized
//! and joined with `OR`.

use geo_types::{Coord, Geometry, LineString, Polygon};

use super::{QueryOptions, format_number};
use crate::domain::Reproject;
use crate::error::{FilterError, Result};
use crate::filter::{FilterGroup, FilterTree, Operand, Predicate};

/// Serialize a tree to a CQL filter; `None` for the empty tree
pub fn serialize_text(
    tree: &FilterTree,
    options: &QueryOptions,
    reprojector: &dyn Reproject,
) -> Result<Option<String>> {
    if tree.is_empty() {
        return Ok(None);
    }

    let groups = tree
        .groups()
        .map(|group| group_cql(group, options, reprojector).map(|text| format!("({text})")))
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(groups.join(" OR ")))
}

fn group_cql(group: &FilterGroup, options: &QueryOptions, reprojector: &dyn Reproject) -> Result<String> {
    let predicates = group
        .predicates()
        .iter()
        .map(|p| predicate_cql(p, options, reprojector))
        .collect::<Result<Vec<_>>>()?;
    Ok(predicates.join(" AND "))
}

fn predicate_cql(
    predicate: &Predicate,
    options: &QueryOptions,
    reprojector: &dyn Reproject,
) -> Result<String> {
    let geometry = predicate.subject().geometry_in(&options.crs, reprojector)?;
    let literal = write_wkt(&geometry, options.decimals);
    let operand = predicate.operand();
    let name = operand.cql_name();
    let field = &options.geometry_field;

    match operand {
        Operand::Intersects | Operand::Disjoint | Operand::Contains | Operand::Within => {
            Ok(format!("{name}({field}, {literal})"))
        }
        Operand::DistanceWithin | Operand::DistanceBeyond => {
            let distance = predicate.distance().ok_or_else(|| {
                FilterError::InvalidPredicate(format!("{operand} requires a distance"))
            })?;
            Ok(format!(
                "{name}({field}, {literal}, {}, meters)",
                format_number(distance, options.decimals)
            ))
        }
    }
}

/// Write a geometry as WKT with fixed-precision coordinates
pub fn write_wkt(geometry: &Geometry<f64>, decimals: u32) -> String {
    let coord = |c: &Coord<f64>| {
        format!(
            "{} {}",
            format_number(c.x, decimals),
            format_number(c.y, decimals)
        )
    };
    let line = |ls: &LineString<f64>| {
        let coords: Vec<_> = ls.0.iter().map(coord).collect();
        format!("({})", coords.join(", "))
    };
    let polygon = |p: &Polygon<f64>| {
        let rings: Vec<_> = std::iter::once(p.exterior())
            .chain(p.interiors())
            .map(line)
            .collect();
        format!("({})", rings.join(", "))
    };

    match geometry {
        Geometry::Point(p) => format!("POINT({})", coord(&p.0)),
        Geometry::Line(l) => format!("LINESTRING({}, {})", coord(&l.start), coord(&l.end)),
        Geometry::LineString(ls) => format!("LINESTRING{}", line(ls)),
        Geometry::Polygon(p) => format!("POLYGON{}", polygon(p)),
        Geometry::MultiPoint(mp) => {
            let points: Vec<_> = mp.iter().map(|p| format!("({})", coord(&p.0))).collect();
            format!("MULTIPOINT({})", points.join(", "))
        }
        Geometry::MultiLineString(mls) => {
            let lines: Vec<_> = mls.iter().map(line).collect();
            format!("MULTILINESTRING({})", lines.join(", "))
        }
        Geometry::MultiPolygon(mp) => {
            let polygons: Vec<_> = mp.iter().map(polygon).collect();
            format!("MULTIPOLYGON({})", polygons.join(", "))
        }
        Geometry::Rect(r) => format!("POLYGON{}", polygon(&r.to_polygon())),
        Geometry::Triangle(t) => format!("POLYGON{}", polygon(&t.to_polygon())),
        Geometry::GeometryCollection(gc) => {
            let members: Vec<_> = gc.iter().map(|g| write_wkt(g, decimals)).collect();
            format!("GEOMETRYCOLLECTION({})", members.join(", "))
        }
    }
}
