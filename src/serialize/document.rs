//! Structured query documents
//!
//! The tree maps one-to-one onto an `or` of `and`s of relation nodes, each
//! carrying its subject as a GeoJSON geometry. Documents serialize to JSON
//! and render to an OGC Filter 1.1 fragment for WFS `GetFeature` bodies.

use geo::MapCoords;
use serde::{Deserialize, Serialize};

use super::{QueryOptions, format_number, round_to};
use crate::config::LayerDef;
use crate::domain::Reproject;
use crate::error::Result;
use crate::filter::{FilterGroup, FilterTree, Operand, Predicate};

const OGC_NS: &str = "http://www.opengis.net/ogc";
const GML_NS: &str = "http://www.opengis.net/gml";

/// Nested boolean query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryDocument {
    Or(Vec<QueryDocument>),
    And(Vec<QueryDocument>),
    Relation(RelationNode),
}

/// Leaf of a [`QueryDocument`]: one spatial relation on a geometry field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationNode {
    pub field: String,
    pub operand: Operand,
    #[serde(rename = "srsName")]
    pub srs_name: String,
    pub geometry: geojson::Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

/// Serialize a tree to a query document; `None` for the empty tree
pub fn serialize_structured(
    tree: &FilterTree,
    options: &QueryOptions,
    reprojector: &dyn Reproject,
) -> Result<Option<QueryDocument>> {
    if tree.is_empty() {
        return Ok(None);
    }

    let groups = tree
        .groups()
        .map(|group| group_document(group, options, reprojector))
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(QueryDocument::Or(groups)))
}

fn group_document(
    group: &FilterGroup,
    options: &QueryOptions,
    reprojector: &dyn Reproject,
) -> Result<QueryDocument> {
    let relations = group
        .predicates()
        .iter()
        .map(|p| relation_node(p, options, reprojector).map(QueryDocument::Relation))
        .collect::<Result<Vec<_>>>()?;
    Ok(QueryDocument::And(relations))
}

fn relation_node(
    predicate: &Predicate,
    options: &QueryOptions,
    reprojector: &dyn Reproject,
) -> Result<RelationNode> {
    let decimals = options.decimals;
    let geometry = predicate
        .subject()
        .geometry_in(&options.crs, reprojector)?
        .map_coords(|c| geo_types::Coord {
            x: round_to(c.x, decimals),
            y: round_to(c.y, decimals),
        });

    let units = predicate
        .operand()
        .is_distance()
        .then(|| "meters".to_string());

    Ok(RelationNode {
        field: options.geometry_field.clone(),
        operand: predicate.operand(),
        srs_name: options.crs.code().to_string(),
        geometry: geojson::Geometry::new(geojson::Value::from(&geometry)),
        distance: predicate.distance().map(|d| round_to(d, decimals)),
        units,
    })
}

impl QueryDocument {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Render as an `ogc:Filter` element
    ///
    /// Boolean nodes with a single child collapse into that child, since
    /// OGC logical operators need at least two operands.
    pub fn to_ogc_xml(&self, decimals: u32) -> String {
        let mut out = format!(r#"<ogc:Filter xmlns:ogc="{OGC_NS}" xmlns:gml="{GML_NS}">"#);
        self.write_ogc(&mut out, decimals);
        out.push_str("</ogc:Filter>");
        out
    }

    fn write_ogc(&self, out: &mut String, decimals: u32) {
        match self {
            QueryDocument::Or(children) => write_logical(out, "Or", children, decimals),
            QueryDocument::And(children) => write_logical(out, "And", children, decimals),
            QueryDocument::Relation(node) => node.write_ogc(out, decimals),
        }
    }
}

fn write_logical(out: &mut String, tag: &str, children: &[QueryDocument], decimals: u32) {
    match children {
        [] => {}
        [only] => only.write_ogc(out, decimals),
        _ => {
            out.push_str(&format!("<ogc:{tag}>"));
            for child in children {
                child.write_ogc(out, decimals);
            }
            out.push_str(&format!("</ogc:{tag}>"));
        }
    }
}

impl RelationNode {
    fn write_ogc(&self, out: &mut String, decimals: u32) {
        let tag = self.operand.ogc_name();
        out.push_str(&format!(
            "<ogc:{tag}><ogc:PropertyName>{}</ogc:PropertyName>",
            escape(&self.field)
        ));
        write_gml(out, &self.geometry.value, &escape(&self.srs_name), decimals);
        if let Some(distance) = self.distance {
            out.push_str(&format!(
                r#"<ogc:Distance units="m">{}</ogc:Distance>"#,
                format_number(distance, decimals)
            ));
        }
        out.push_str(&format!("</ogc:{tag}>"));
    }
}

fn write_gml(out: &mut String, value: &geojson::Value, srs: &str, decimals: u32) {
    let srs_attr = format!(r#" srsName="{srs}""#);

    match value {
        geojson::Value::Point(p) => out.push_str(&format!(
            "<gml:Point{srs_attr}><gml:pos>{}</gml:pos></gml:Point>",
            pos(p, decimals)
        )),
        geojson::Value::LineString(ls) => out.push_str(&format!(
            "<gml:LineString{srs_attr}><gml:posList>{}</gml:posList></gml:LineString>",
            pos_list(ls, decimals)
        )),
        geojson::Value::Polygon(rings) => write_polygon(out, rings, &srs_attr, decimals),
        geojson::Value::MultiPoint(points) => {
            out.push_str(&format!("<gml:MultiPoint{srs_attr}>"));
            for p in points {
                out.push_str(&format!(
                    "<gml:pointMember><gml:Point><gml:pos>{}</gml:pos></gml:Point></gml:pointMember>",
                    pos(p, decimals)
                ));
            }
            out.push_str("</gml:MultiPoint>");
        }
        geojson::Value::MultiLineString(lines) => {
            out.push_str(&format!("<gml:MultiCurve{srs_attr}>"));
            for ls in lines {
                out.push_str(&format!(
                    "<gml:curveMember><gml:LineString><gml:posList>{}</gml:posList></gml:LineString></gml:curveMember>",
                    pos_list(ls, decimals)
                ));
            }
            out.push_str("</gml:MultiCurve>");
        }
        geojson::Value::MultiPolygon(polygons) => {
            out.push_str(&format!("<gml:MultiSurface{srs_attr}>"));
            for rings in polygons {
                out.push_str("<gml:surfaceMember>");
                write_polygon(out, rings, "", decimals);
                out.push_str("</gml:surfaceMember>");
            }
            out.push_str("</gml:MultiSurface>");
        }
        geojson::Value::GeometryCollection(members) => {
            out.push_str(&format!("<gml:MultiGeometry{srs_attr}>"));
            for member in members {
                out.push_str("<gml:geometryMember>");
                write_gml(out, &member.value, srs, decimals);
                out.push_str("</gml:geometryMember>");
            }
            out.push_str("</gml:MultiGeometry>");
        }
    }
}

fn write_polygon(out: &mut String, rings: &[Vec<Vec<f64>>], srs_attr: &str, decimals: u32) {
    out.push_str(&format!("<gml:Polygon{srs_attr}>"));
    for (i, ring) in rings.iter().enumerate() {
        let boundary = if i == 0 { "exterior" } else { "interior" };
        out.push_str(&format!(
            "<gml:{boundary}><gml:LinearRing><gml:posList>{}</gml:posList></gml:LinearRing></gml:{boundary}>",
            pos_list(ring, decimals)
        ));
    }
    out.push_str("</gml:Polygon>");
}

fn pos(position: &[f64], decimals: u32) -> String {
    position
        .iter()
        .map(|v| format_number(*v, decimals))
        .collect::<Vec<_>>()
        .join(" ")
}

fn pos_list(positions: &[Vec<f64>], decimals: u32) -> String {
    positions
        .iter()
        .map(|p| pos(p, decimals))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// WFS 1.1.0 `GetFeature` POST body for `layer`, optionally filtered
pub fn get_feature_body(layer: &LayerDef, filter: Option<&QueryDocument>, decimals: u32) -> String {
    let filter = filter
        .map(|doc| doc.to_ogc_xml(decimals))
        .unwrap_or_default();
    format!(
        concat!(
            r#"<GetFeature xmlns="http://www.opengis.net/wfs" service="WFS" version="1.1.0" "#,
            r#"outputFormat="application/json" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
            r#"xsi:schemaLocation="http://www.opengis.net/wfs http://schemas.opengis.net/wfs/1.1.0/wfs.xsd">"#,
            r#"<Query typeName="{}" srsName="{}">{}</Query></GetFeature>"#
        ),
        escape(&layer.layer_name),
        escape(layer.view_projection.code()),
        filter
    )
}
