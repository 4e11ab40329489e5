//! Local evaluation of a filter tree against candidate features

use geo::Relate;
use geo_types::Geometry;

use crate::domain::{Crs, Feature, Reproject, to_crs};
use crate::error::Result;
use crate::filter::distance::{Metric, min_distance};
use crate::filter::{FilterGroup, FilterTree, Operand, Predicate};

/// Decides whether candidate features pass a [`FilterTree`]
pub struct Evaluator<'a> {
    reprojector: &'a dyn Reproject,
}

/// Candidate geometry prepared once per evaluation
struct Candidate {
    /// In the tree's working CRS
    working: Geometry<f64>,
    /// In WGS84 when the working CRS is projected; distances use this one
    geographic: Option<Geometry<f64>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(reprojector: &'a dyn Reproject) -> Self {
        Self { reprojector }
    }

    /// OR over groups of the AND over each group's predicates
    ///
    /// The empty tree passes every feature.
    pub fn evaluate(&self, tree: &FilterTree, feature: &Feature) -> Result<bool> {
        if tree.is_empty() {
            return Ok(true);
        }

        let crs = tree.working_crs();
        let working = to_crs(self.reprojector, &feature.geometry, &feature.crs, crs)?;
        let geographic = if tree.has_distance_predicates() && !crs.is_geographic() {
            Some(to_crs(self.reprojector, &feature.geometry, &feature.crs, &Crs::wgs84())?)
        } else {
            None
        };
        let candidate = Candidate {
            working,
            geographic,
        };

        for group in tree.groups() {
            if self.group_matches(group, crs, &candidate)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn group_matches(&self, group: &FilterGroup, crs: &Crs, candidate: &Candidate) -> Result<bool> {
        for predicate in group.predicates() {
            if !self.relation(predicate, crs, candidate)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn relation(&self, predicate: &Predicate, crs: &Crs, candidate: &Candidate) -> Result<bool> {
        let passed = match (predicate.operand(), predicate.distance()) {
            (Operand::DistanceWithin, Some(limit)) => {
                self.distance(predicate, candidate)? <= limit
            }
            (Operand::DistanceBeyond, Some(limit)) => {
                self.distance(predicate, candidate)? > limit
            }
            (operand, _) => {
                let subject = predicate.subject().geometry_in(crs, self.reprojector)?;
                let matrix = candidate.working.relate(&subject);
                match operand {
                    Operand::Intersects => matrix.is_intersects(),
                    Operand::Disjoint => matrix.is_disjoint(),
                    Operand::Contains => matrix.is_contains(),
                    Operand::Within => matrix.is_within(),
                    // distance operands always carry a distance
                    Operand::DistanceWithin | Operand::DistanceBeyond => false,
                }
            }
        };
        Ok(passed)
    }

    /// Minimum haversine distance in meters between the candidate and the subject
    ///
    /// Both sides are measured in WGS84, whatever the working CRS.
    fn distance(&self, predicate: &Predicate, candidate: &Candidate) -> Result<f64> {
        let geometry = candidate.geographic.as_ref().unwrap_or(&candidate.working);
        let subject = predicate.subject().geometry_in(&Crs::wgs84(), self.reprojector)?;
        Ok(min_distance(geometry, &subject, Metric::Haversine))
    }
}
