//! Spatial relation operands

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// Spatial relation tested between a candidate and a drawn shape
///
/// Relations read "candidate <operand> shape": `Within` passes candidates
/// lying inside the shape, `Contains` passes candidates that enclose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Intersects,
    Disjoint,
    Contains,
    Within,
    #[serde(rename = "DWithin")]
    DistanceWithin,
    #[serde(rename = "Beyond")]
    DistanceBeyond,
}

impl Operand {
    pub const ALL: [Operand; 6] = [
        Operand::Intersects,
        Operand::Disjoint,
        Operand::Contains,
        Operand::Within,
        Operand::DistanceWithin,
        Operand::DistanceBeyond,
    ];

    /// Whether the operand takes a distance parameter
    pub fn is_distance(self) -> bool {
        matches!(self, Operand::DistanceWithin | Operand::DistanceBeyond)
    }

    /// CQL relation function name
    pub fn cql_name(self) -> &'static str {
        match self {
            Operand::Intersects => "INTERSECTS",
            Operand::Disjoint => "DISJOINT",
            Operand::Contains => "CONTAINS",
            Operand::Within => "WITHIN",
            Operand::DistanceWithin => "DWITHIN",
            Operand::DistanceBeyond => "BEYOND",
        }
    }

    /// OGC filter element name
    pub fn ogc_name(self) -> &'static str {
        match self {
            Operand::Intersects => "Intersects",
            Operand::Disjoint => "Disjoint",
            Operand::Contains => "Contains",
            Operand::Within => "Within",
            Operand::DistanceWithin => "DWithin",
            Operand::DistanceBeyond => "Beyond",
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ogc_name())
    }
}

impl FromStr for Operand {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intersects" => Ok(Operand::Intersects),
            "disjoint" => Ok(Operand::Disjoint),
            "contains" => Ok(Operand::Contains),
            "within" => Ok(Operand::Within),
            "dwithin" | "distancewithin" | "distance_within" => Ok(Operand::DistanceWithin),
            "beyond" | "distancebeyond" | "distance_beyond" => Ok(Operand::DistanceBeyond),
            _ => Err(FilterError::UnknownOperand(s.to_string())),
        }
    }
}
