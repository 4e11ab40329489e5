//! Configuration persistence for mapfilter settings

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::Crs;
use crate::serialize::QueryOptions;

/// Remote layer the filters are sent to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerDef {
    /// Geometry attribute filters are written against
    pub geom_field: String,
    /// Base URL of the map server; `/wms` and `/wfs` are appended
    pub url: String,
    /// Qualified layer name, e.g. `topp:states`
    pub layer_name: String,
    /// Reference system the server stores the layer in
    pub projection: Crs,
    /// Reference system shapes are drawn in
    pub view_projection: Crs,
    /// Layer bounds as `[min_x, min_y, max_x, max_y]` in `projection`
    pub extent: Option<[f64; 4]>,
}

impl Default for LayerDef {
    fn default() -> Self {
        Self {
            geom_field: "the_geom".to_string(),
            url: "https://demo.geo-solutions.it/geoserver".to_string(),
            layer_name: "topp:states".to_string(),
            projection: Crs::wgs84(),
            view_projection: Crs::web_mercator(),
            extent: Some([
                -126.132_068_364_313_65,
                19.107_845_708_997_16,
                -65.583_040_151_695_5,
                51.823_967_095_795_81,
            ]),
        }
    }
}

impl LayerDef {
    pub fn wms_url(&self) -> String {
        format!("{}/wms", self.url.trim_end_matches('/'))
    }

    pub fn wfs_url(&self) -> String {
        format!("{}/wfs", self.url.trim_end_matches('/'))
    }
}

/// Application configuration persisted between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub layer: LayerDef,
    /// Decimal places of numeric literals in remote queries
    pub decimals: u32,
    /// Vertex count of buffer circles drawn around distance operators
    pub circle_segments: usize,
    /// WMS `VERSION` tile parameter
    pub wms_version: String,
    /// WMS `STYLES` tile parameter
    pub wms_style: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            layer: LayerDef::default(),
            decimals: 10,
            circle_segments: 64,
            wms_version: "1.1.1".to_string(),
            wms_style: "polygon".to_string(),
        }
    }
}

impl FilterConfig {
    /// Directory name under the user config dir
    pub const ID: &'static str = "mapfilter";

    /// Default config file location
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(Self::ID).join("config.json"))
    }

    /// Load configuration from disk, or return defaults if unavailable
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            log::warn!("No config directory available, using defaults");
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Error loading config, using defaults: {:?}", err);
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) {
        let Some(path) = Self::path() else {
            log::error!("No config directory available for saving");
            return;
        };
        if let Err(err) = self.save_to(&path) {
            log::error!("Failed to save config: {:?}", err);
        }
    }

    /// Save configuration to an explicit file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Serializer options for text queries, written in the layer's own
    /// projection
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::new(
            self.layer.geom_field.clone(),
            self.decimals,
            self.layer.projection.clone(),
        )
    }

    /// Serializer options for structured queries, written in the view
    /// projection the features are requested in
    pub fn document_options(&self) -> QueryOptions {
        QueryOptions::new(
            self.layer.geom_field.clone(),
            self.decimals,
            self.layer.view_projection.clone(),
        )
    }
}
