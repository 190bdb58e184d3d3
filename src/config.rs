//! Engine configuration
//!
//! Every tunable that the sampling and reconstruction strategies consume
//! lives here with a documented default, so callers can reproduce or
//! deliberately deviate from the stock behavior.

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result};

// ===== Defaults =====

/// Samples a scheduler leaf accumulates before it splits.
pub const DEFAULT_LEAF_CAPACITY: usize = 15;
/// Candidates drawn per leaf and scoring round.
pub const DEFAULT_CANDIDATE_BATCH: usize = 5;
/// Penalty weight applied per sample already in a leaf when scoring.
pub const DEFAULT_SPARSITY_PENALTY: f64 = 0.1;

/// Neighbors consulted by the distance-weighted mapping.
pub const DEFAULT_IDW_NEIGHBORS: usize = 15;
/// Inverse-distance exponent.
pub const DEFAULT_IDW_POWER: i32 = 2;
/// Distance below which a neighbor contributes full weight.
pub const DEFAULT_IDW_OFFSET: f64 = 0.0;

/// Covariance length-scale parameter.
pub const DEFAULT_KRIGING_THETA: f64 = 0.01;
/// Observation count past which the local-neighborhood solve kicks in.
pub const DEFAULT_KRIGING_LOCAL_K: usize = 64;
/// Diagonal jitter added for numerical stability.
pub const DEFAULT_KRIGING_JITTER: f64 = 1e-8;

/// Repeat draws per cell for the stochastic model.
pub const DEFAULT_STOCHASTIC_REPEATS: usize = 200;
/// Prior win probability for unvisited cells.
pub const DEFAULT_STOCHASTIC_PRIOR: f64 = 0.315;
/// Shrinkage applied to raw per-cell estimates, toward the prior.
pub const DEFAULT_STOCHASTIC_SHRINK: f64 = 0.3;

// ===== Grid / budget =====

/// Fixed run parameters: dimensionality, per-axis grid size and the total
/// query budget. Immutable for the lifetime of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    pub dimensions: usize,
    pub dimension_size: i64,
    pub total_queries: usize,
}

impl GridConfig {
    pub fn new(dimensions: usize, dimension_size: i64, total_queries: usize) -> Self {
        Self {
            dimensions,
            dimension_size,
            total_queries,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(FieldError::InvalidConfig(
                "grid must have at least one dimension".into(),
            ));
        }
        if self.dimension_size < 1 {
            return Err(FieldError::InvalidConfig(format!(
                "dimension size must be positive, got {}",
                self.dimension_size
            )));
        }
        if self.total_queries == 0 {
            return Err(FieldError::InvalidConfig(
                "query budget must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Total number of grid points, saturating on overflow.
    pub fn total_points(&self) -> u64 {
        (self.dimension_size as u64).saturating_pow(self.dimensions as u32)
    }
}

// ===== Scheduler =====

/// Tunables for the adaptive spatial-partition scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Leaf bucket size that triggers a split when exceeded.
    pub leaf_capacity: usize,

    /// Candidates drawn from each leaf per scoring round.
    pub candidate_batch: usize,

    /// Per-sample crowding penalty in the novelty score.
    pub sparsity_penalty: f64,

    /// Seed for candidate randomness; `None` draws from entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
            candidate_batch: DEFAULT_CANDIDATE_BATCH,
            sparsity_penalty: DEFAULT_SPARSITY_PENALTY,
            seed: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_leaf_capacity(mut self, capacity: usize) -> Self {
        self.leaf_capacity = capacity.max(1);
        self
    }

    pub fn with_candidate_batch(mut self, batch: usize) -> Self {
        self.candidate_batch = batch.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

// ===== Mappings =====

/// Tunables for the distance-weighted (IDW) mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdwConfig {
    /// Nearest observations contributing to each prediction.
    pub max_neighbors: usize,

    /// Exponent of the inverse-distance weight.
    pub power: i32,

    /// Neighbors closer than this contribute weight 1.0.
    pub offset: f64,
}

impl Default for IdwConfig {
    fn default() -> Self {
        Self {
            max_neighbors: DEFAULT_IDW_NEIGHBORS,
            power: DEFAULT_IDW_POWER,
            offset: DEFAULT_IDW_OFFSET,
        }
    }
}

impl IdwConfig {
    pub fn with_max_neighbors(mut self, k: usize) -> Self {
        self.max_neighbors = k.max(1);
        self
    }

    pub fn with_power(mut self, power: i32) -> Self {
        self.power = power;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }
}

/// Tunables for the covariance-based (Kriging) mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KrigingConfig {
    /// Covariance length scale in `exp(-theta * d^2)`.
    pub theta: f64,

    /// Restrict each solve to the nearest `local_k` observations once the
    /// observation count exceeds `local_k`.
    pub local_neighborhood: bool,

    /// Neighborhood size for the local solve.
    pub local_k: usize,

    /// Diagonal jitter; escalated once on a singular solve before the
    /// failure is surfaced.
    pub jitter: f64,

    /// Per-axis wrap-around flags. Empty means no axis is periodic.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub periodic: Vec<bool>,
}

impl Default for KrigingConfig {
    fn default() -> Self {
        Self {
            theta: DEFAULT_KRIGING_THETA,
            local_neighborhood: true,
            local_k: DEFAULT_KRIGING_LOCAL_K,
            jitter: DEFAULT_KRIGING_JITTER,
            periodic: Vec::new(),
        }
    }
}

impl KrigingConfig {
    pub fn with_theta(mut self, theta: f64) -> Self {
        self.theta = theta;
        self
    }

    pub fn with_local_k(mut self, k: usize) -> Self {
        self.local_k = k.max(1);
        self
    }

    pub fn with_local_neighborhood(mut self, enabled: bool) -> Self {
        self.local_neighborhood = enabled;
        self
    }

    pub fn with_periodic(mut self, periodic: Vec<bool>) -> Self {
        self.periodic = periodic;
        self
    }

    pub fn validate(&self, dimensions: usize) -> Result<()> {
        if self.theta <= 0.0 {
            return Err(FieldError::InvalidConfig(format!(
                "theta must be positive, got {}",
                self.theta
            )));
        }
        if !self.periodic.is_empty() && self.periodic.len() != dimensions {
            return Err(FieldError::InvalidConfig(format!(
                "periodic flags cover {} axes, grid has {}",
                self.periodic.len(),
                dimensions
            )));
        }
        Ok(())
    }
}

// ===== Stochastic model =====

/// Tunables for the repeat-sampling model used against Bernoulli oracles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticConfig {
    /// Draws spent on one scheduler cell before moving on.
    pub repeats_per_cell: usize,

    /// Prior win probability reported for unvisited cells.
    pub prior: f64,

    /// Blend factor between the raw estimate and the prior.
    pub shrink: f64,

    /// Axes mirrored with periodic images when the interpolator is built.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub periodic: Vec<bool>,

    /// Scheduler driving the scaled-down cell grid.
    pub scheduler: SchedulerConfig,
}

impl Default for StochasticConfig {
    fn default() -> Self {
        Self {
            repeats_per_cell: DEFAULT_STOCHASTIC_REPEATS,
            prior: DEFAULT_STOCHASTIC_PRIOR,
            shrink: DEFAULT_STOCHASTIC_SHRINK,
            periodic: Vec::new(),
            scheduler: SchedulerConfig::default().with_leaf_capacity(30),
        }
    }
}

impl StochasticConfig {
    pub fn with_prior(mut self, prior: f64) -> Self {
        self.prior = prior;
        self
    }

    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats_per_cell = repeats.max(1);
        self
    }

    pub fn with_periodic(mut self, periodic: Vec<bool>) -> Self {
        self.periodic = periodic;
        self
    }
}
