//! Pure domain types with minimal dependencies
//!
//! This module contains the geometry-facing types used throughout the crate:
//! drawn shapes, candidate features and reference systems.

pub mod feature;
pub mod geometry;
pub mod projection;

pub use feature::*;
pub use geometry::*;
pub use projection::*;
