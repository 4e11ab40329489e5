//! Serialization of a filter tree into remote query languages
//!
//! Two independent, deterministic outputs of the same tree:
//! - [`cql`]: a CQL text filter for tile requests
//! - [`document`]: a nested query document for feature requests, with an
//!   OGC XML rendering
//!
//! An empty tree serializes to `None` in both modes ("do not filter").

pub mod cql;
pub mod document;

pub use cql::{serialize_text, write_wkt};
pub use document::{QueryDocument, RelationNode, get_feature_body, serialize_structured};

use crate::domain::Crs;

/// Field name, precision and output reference system of a serializer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Geometry attribute the remote layer filters on
    pub geometry_field: String,
    /// Decimal places of numeric literals
    pub decimals: u32,
    /// Reference system literal coordinates are written in
    pub crs: Crs,
}

impl QueryOptions {
    pub fn new(geometry_field: impl Into<String>, decimals: u32, crs: Crs) -> Self {
        Self {
            geometry_field: geometry_field.into(),
            decimals,
            crs,
        }
    }
}

/// Render a number with at most `decimals` decimal places, trailing zeros
/// trimmed
pub fn format_number(value: f64, decimals: u32) -> String {
    let mut text = format!("{:.*}", decimals as usize, value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

/// Round a number to `decimals` decimal places
pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    format!("{:.*}", decimals as usize, value)
        .parse()
        .unwrap_or(value)
}
