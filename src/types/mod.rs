//! Core data types for grid sampling
//!
//! Coordinates are ordered tuples of integers, one component per grid axis.

pub mod coordinate;
pub mod field;

pub use coordinate::{Bounds, Sample};
pub use field::DenseField;
