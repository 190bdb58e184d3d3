//! Value reconstruction from sparse observations
//!
//! A mapping turns the accumulated observation set into a dense prediction
//! surface. The strategy set is fixed: distance-weighted averaging and
//! covariance-based regression.

pub mod idw;
pub mod kriging;

pub use idw::InverseDistanceMapping;
pub use kriging::KrigingMapping;

use crate::error::Result;

/// A trained reconstruction strategy.
pub trait Mapping {
    /// Predicted field value at `coords`, a pure function of the
    /// observations the mapping was built from.
    fn predict(&self, coords: &[i64]) -> Result<f64>;
}
