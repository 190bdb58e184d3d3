//! Spatial index layer
//!
//! Online bucketed k-d store for the query phase and a batch-built k-NN
//! tree for reconstruction.

pub mod knn;
pub mod spatial;

pub use knn::{Neighbor, StaticNeighborIndex};
pub use spatial::SpatialIndex;
