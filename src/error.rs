//! Error types for filter construction, evaluation and serialization.

use thiserror::Error;

use crate::interaction::InteractionId;

/// Filter errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Predicate or group failed validation when it was built.
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    /// Operand name outside the recognized set.
    #[error("Unknown operand: {0}")]
    UnknownOperand(String),

    /// Operation attempted on a removed interaction.
    #[error("Interaction {0} is closed")]
    InteractionClosed(InteractionId),

    /// Operation not allowed in the interaction's current state.
    #[error("Invalid transition: cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },

    /// The reprojector cannot convert between the two reference systems.
    #[error("Reprojection from {from} to {to} failed: {reason}")]
    ReprojectionFailure {
        from: String,
        to: String,
        reason: String,
    },

    /// Geometry that cannot be used as a filter subject or candidate.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

/// Result type for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;
