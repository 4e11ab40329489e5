//! Candidate features tested against the filter

use geo_types::Geometry;
use geojson::GeoJson;
use serde_json::{Map, Value};

use super::projection::Crs;
use crate::error::{FilterError, Result};

/// A vector feature held by a locally evaluated layer
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: String,
    pub geometry: Geometry<f64>,
    pub crs: Crs,
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(id: impl Into<String>, geometry: Geometry<f64>, crs: Crs) -> Self {
        Self {
            id: id.into(),
            geometry,
            crs,
            properties: Map::new(),
        }
    }

    /// Look up a property value
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// Read the features of a GeoJSON document (a FeatureCollection, a single
/// Feature or a bare Geometry)
///
/// Features without geometry are skipped. Features without an id are
/// numbered by their position in the document.
pub fn features_from_geojson(text: &str, crs: &Crs) -> Result<Vec<Feature>> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| FilterError::InvalidGeometry(format!("GeoJSON: {e}")))?;

    let raw = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![geojson::Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    let mut features = Vec::with_capacity(raw.len());
    for (index, feature) in raw.into_iter().enumerate() {
        let id = match &feature.id {
            Some(geojson::feature::Id::String(s)) => s.clone(),
            Some(geojson::feature::Id::Number(n)) => n.to_string(),
            None => index.to_string(),
        };

        let Some(geometry) = feature.geometry else {
            log::warn!("Skipping feature {} without geometry", id);
            continue;
        };

        let geometry: Geometry<f64> = geometry
            .try_into()
            .map_err(|e: geojson::Error| FilterError::InvalidGeometry(format!("feature {id}: {e}")))?;

        features.push(Feature {
            id,
            geometry,
            crs: crs.clone(),
            properties: feature.properties.unwrap_or_default(),
        });
    }

    Ok(features)
}
