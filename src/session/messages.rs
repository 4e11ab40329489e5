//! Message types for a filtering session
//!
//! This module contains:
//! - SessionEvent, the events interactions report to the coordinator
//! - OperatorSpec, the operator a user picks before drawing

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{GeometryKind, Shape};
use crate::error::Result;
use crate::filter::predicate::validate_distance;
use crate::filter::{FilterGroup, Operand};
use crate::interaction::{InteractionHandle, InteractionId};

/// Distance in meters used when a distance operator is picked without one
pub const DEFAULT_DISTANCE: f64 = 500_000.0;

// ============================================================================
// Operators
// ============================================================================

/// Geometry kind, operand and distance chosen before drawing a shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatorSpec {
    pub kind: GeometryKind,
    pub operand: Operand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl OperatorSpec {
    pub fn new(kind: GeometryKind, operand: Operand, distance: Option<f64>) -> Result<Self> {
        validate_distance(operand, distance)?;
        Ok(Self {
            kind,
            operand,
            distance,
        })
    }

    /// Build from user-facing names
    ///
    /// Distance operands without a distance get [`DEFAULT_DISTANCE`].
    pub fn parse(kind: &str, operand: &str, distance: Option<f64>) -> Result<Self> {
        let kind: GeometryKind = kind.parse()?;
        let operand: Operand = operand.parse()?;
        let distance = match distance {
            None if operand.is_distance() => Some(DEFAULT_DISTANCE),
            other => other,
        };
        Self::new(kind, operand, distance)
    }

    /// The group a shape drawn for this operator contributes to the tree
    pub fn group(&self, shape: Arc<Shape>) -> Result<FilterGroup> {
        FilterGroup::from_spec(self, shape)
    }
}

// ============================================================================
// Session Events
// ============================================================================

/// Events reported by interactions, folded by the coordinator in order
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// An operator was picked and its draw interaction started
    OperatorAdded { id: InteractionId, spec: OperatorSpec },
    /// A shape finished drawing
    DrawCompleted {
        id: InteractionId,
        shape: Arc<Shape>,
        handle: InteractionHandle,
    },
    /// Intermediate position of a shape being dragged
    Translating { id: InteractionId, shape: Arc<Shape> },
    /// Final position of a dragged shape
    TranslateEnded { id: InteractionId, shape: Arc<Shape> },
    /// A shape was removed
    Removed { id: InteractionId },
    /// Every shape was removed at once
    Cleared,
}

impl SessionEvent {
    /// Terminal events update every sink; the others only update sinks
    /// that follow the interaction continuously
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            SessionEvent::Translating { .. } | SessionEvent::OperatorAdded { .. }
        )
    }

    pub fn id(&self) -> Option<InteractionId> {
        match self {
            SessionEvent::OperatorAdded { id, .. }
            | SessionEvent::DrawCompleted { id, .. }
            | SessionEvent::Translating { id, .. }
            | SessionEvent::TranslateEnded { id, .. }
            | SessionEvent::Removed { id } => Some(*id),
            SessionEvent::Cleared => None,
        }
    }
}
