//! A single spatial relation against a drawn shape

use std::sync::Arc;

use super::operand::Operand;
use crate::domain::Shape;
use crate::error::{FilterError, Result};

/// One spatial relation between a reference shape and a candidate
///
/// `distance` is present exactly when the operand is a distance operand,
/// and is then a finite number of meters greater than zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    operand: Operand,
    subject: Arc<Shape>,
    distance: Option<f64>,
}

impl Predicate {
    pub fn new(operand: Operand, subject: Arc<Shape>, distance: Option<f64>) -> Result<Self> {
        validate_distance(operand, distance)?;
        Ok(Self {
            operand,
            subject,
            distance,
        })
    }

    pub fn operand(&self) -> Operand {
        self.operand
    }

    pub fn subject(&self) -> &Shape {
        &self.subject
    }

    pub fn distance(&self) -> Option<f64> {
        self.distance
    }
}

/// Check the distance parameter against the operand
pub fn validate_distance(operand: Operand, distance: Option<f64>) -> Result<()> {
    match (operand.is_distance(), distance) {
        (true, None) => Err(FilterError::InvalidPredicate(format!(
            "{operand} requires a distance"
        ))),
        (true, Some(d)) if !d.is_finite() || d <= 0.0 => Err(FilterError::InvalidPredicate(
            format!("{operand} distance must be a positive number, got {d}"),
        )),
        (false, Some(_)) => Err(FilterError::InvalidPredicate(format!(
            "{operand} does not take a distance"
        ))),
        _ => Ok(()),
    }
}
