//! Fieldprobe Sampling Engine
//!
//! Adaptively samples an unknown scalar field over a discretized
//! n-dimensional grid under a fixed query budget, then reconstructs a
//! dense approximation from the sparse observations.
//!
//! ## Core components
//! - Sampling: adaptive spatial-partition scheduler + per-region
//!   candidate generation without repeats
//! - Index: bucketed nearest-neighbor store (online) + static k-d tree
//!   (batch, for reconstruction)
//! - Mapping: distance-weighted averaging (IDW) and covariance-based
//!   regression (Kriging), behind one `predict` contract
//! - Model: the query/record/predict lifecycle driving oracle and sink
//!   collaborators
//!
//! ## Control flow
//! scheduler proposes a coordinate → the oracle resolves it → the result
//! feeds the scheduler (driving splits) and the observation set → once
//! the budget is spent, a mapping trains on all observations and answers
//! arbitrary-coordinate predictions.

pub mod config;
pub mod distance;
pub mod index;
pub mod mapping;
pub mod model;
pub mod sampling;
pub mod types;

mod error;

pub use config::{
    GridConfig, IdwConfig, KrigingConfig, SchedulerConfig, StochasticConfig,
};
pub use error::{FieldError, Result};
pub use index::{Neighbor, SpatialIndex, StaticNeighborIndex};
pub use mapping::{InverseDistanceMapping, KrigingMapping, Mapping};
pub use model::{
    run, BaselineModel, FieldModel, FieldSink, IdwModel, JsonSink, KrigingModel, Oracle, Sink,
    StochasticModel,
};
pub use sampling::{CandidateGenerator, QueryScheduler};
pub use types::{Bounds, DenseField, Sample};
