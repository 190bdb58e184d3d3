//! Inverse-distance-weighted reconstruction

use crate::config::IdwConfig;
use crate::error::Result;
use crate::index::StaticNeighborIndex;
use crate::mapping::Mapping;
use crate::types::Sample;

/// Near-zero distance treated as an exact hit when no offset is configured.
const EPS: f64 = 1e-6;

/// Weighted average of the k nearest observations, weights falling off as
/// `distance^-power` beyond the configured offset.
#[derive(Debug)]
pub struct InverseDistanceMapping {
    index: StaticNeighborIndex,
    config: IdwConfig,
}

impl InverseDistanceMapping {
    pub fn new(observations: &[Sample], config: IdwConfig) -> Self {
        Self {
            index: StaticNeighborIndex::build(observations),
            config,
        }
    }

    pub fn observation_count(&self) -> usize {
        self.index.len()
    }
}

impl Mapping for InverseDistanceMapping {
    fn predict(&self, coords: &[i64]) -> Result<f64> {
        let neighbors = self.index.k_nearest(coords, self.config.max_neighbors);
        if neighbors.is_empty() {
            // No observations yet; the sparse default.
            return Ok(0.0);
        }

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for neighbor in &neighbors {
            if self.config.offset == 0.0 && (neighbor.distance < EPS || neighbor.coords == coords)
            {
                return Ok(neighbor.value);
            }
            let weight = if neighbor.distance <= self.config.offset {
                1.0
            } else {
                neighbor.distance.powi(-self.config.power)
            };
            numerator += weight * neighbor.value;
            denominator += weight;
        }
        Ok(numerator / denominator)
    }
}
