//! Covariance-based (Kriging) reconstruction
//!
//! Covariance between coordinates is `exp(-theta * d^2)`, with optional
//! wrap-around distance per configured axis. Small observation sets factor
//! the full covariance matrix once; past `local_k` observations each
//! prediction solves a system restricted to its nearest neighbors instead.
//! A singular solve is retried once with escalated jitter before the
//! failure surfaces, so callers can fall back to another strategy.

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};

use crate::config::KrigingConfig;
use crate::distance::periodic_squared_euclidean;
use crate::error::{FieldError, Result};
use crate::index::{Neighbor, StaticNeighborIndex};
use crate::mapping::Mapping;
use crate::types::Sample;

/// Jitter multiplier applied on the single retry of a failed factorization.
const JITTER_ESCALATION: f64 = 1e4;

#[derive(Debug)]
enum Strategy {
    /// Factored once over all observations.
    Global { cholesky: Chol, alpha: DVector<f64> },
    /// Per-query solve over the nearest `local_k` observations.
    Local,
}

type Chol = Cholesky<f64, Dyn>;

#[derive(Debug)]
pub struct KrigingMapping {
    observations: Vec<Sample>,
    dimension_size: i64,
    config: KrigingConfig,
    periodic: Vec<bool>,
    knn: StaticNeighborIndex,
    strategy: Strategy,
}

impl KrigingMapping {
    /// Build a mapping over `observations` on a grid of `dimensions` axes
    /// of `dimension_size` points each. Fails on inconsistent config or an
    /// unfactorable global system.
    pub fn new(
        observations: Vec<Sample>,
        dimensions: usize,
        dimension_size: i64,
        config: KrigingConfig,
    ) -> Result<Self> {
        config.validate(dimensions)?;
        let periodic = if config.periodic.is_empty() {
            vec![false; dimensions]
        } else {
            config.periodic.clone()
        };
        let knn = StaticNeighborIndex::build(&observations);

        let use_local = config.local_neighborhood && observations.len() > config.local_k;
        let strategy = if use_local || observations.is_empty() {
            Strategy::Local
        } else {
            let (cholesky, alpha) = Self::train_global(
                &observations,
                dimension_size,
                &config,
                &periodic,
            )?;
            Strategy::Global { cholesky, alpha }
        };

        Ok(Self {
            observations,
            dimension_size,
            config,
            periodic,
            knn,
            strategy,
        })
    }

    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    fn covariance_of(
        x: &[i64],
        y: &[i64],
        theta: f64,
        dimension_size: i64,
        periodic: &[bool],
    ) -> f64 {
        let d2 = periodic_squared_euclidean(x, y, dimension_size, periodic);
        (-theta * d2).exp()
    }

    fn covariance(&self, x: &[i64], y: &[i64]) -> f64 {
        Self::covariance_of(x, y, self.config.theta, self.dimension_size, &self.periodic)
    }

    /// Factor `C + jitter*I`; one retry with escalated jitter, then the
    /// numerical failure propagates.
    fn factor(build: impl Fn(f64) -> DMatrix<f64>, jitter: f64, n: usize) -> Result<Chol> {
        Cholesky::new(build(jitter))
            .or_else(|| Cholesky::new(build(jitter * JITTER_ESCALATION)))
            .ok_or_else(|| FieldError::Singular(format!("{n}x{n} covariance system")))
    }

    fn train_global(
        observations: &[Sample],
        dimension_size: i64,
        config: &KrigingConfig,
        periodic: &[bool],
    ) -> Result<(Chol, DVector<f64>)> {
        let n = observations.len();
        let build = |jitter: f64| {
            DMatrix::from_fn(n, n, |i, j| {
                let cov = Self::covariance_of(
                    &observations[i].coords,
                    &observations[j].coords,
                    config.theta,
                    dimension_size,
                    periodic,
                );
                if i == j {
                    cov + jitter
                } else {
                    cov
                }
            })
        };
        let cholesky = Self::factor(build, config.jitter, n)?;
        let y = DVector::from_iterator(n, observations.iter().map(|s| s.value));
        let alpha = cholesky.solve(&y);
        Ok((cholesky, alpha))
    }

    /// Neighborhood + factored local covariance for one query.
    fn local_system(&self, coords: &[i64]) -> Result<(Vec<Neighbor>, Chol)> {
        let neighbors = self.knn.k_nearest(coords, self.config.local_k);
        let m = neighbors.len();
        let build = |jitter: f64| {
            DMatrix::from_fn(m, m, |i, j| {
                let cov = self.covariance(&neighbors[i].coords, &neighbors[j].coords);
                if i == j {
                    cov + jitter
                } else {
                    cov
                }
            })
        };
        let cholesky = Self::factor(build, self.config.jitter, m)?;
        Ok((neighbors, cholesky))
    }

    /// Predictive uncertainty `1 - k^T C^-1 k`, clamped non-negative.
    /// Returns maximum uncertainty (1.0) with no observations.
    pub fn variance(&self, coords: &[i64]) -> Result<f64> {
        if self.observations.is_empty() {
            return Ok(1.0);
        }
        let var = match &self.strategy {
            Strategy::Local => {
                let (neighbors, cholesky) = self.local_system(coords)?;
                let k_vec = DVector::from_iterator(
                    neighbors.len(),
                    neighbors.iter().map(|n| self.covariance(coords, &n.coords)),
                );
                1.0 - k_vec.dot(&cholesky.solve(&k_vec))
            }
            Strategy::Global { cholesky, .. } => {
                let k_vec = DVector::from_iterator(
                    self.observations.len(),
                    self.observations
                        .iter()
                        .map(|s| self.covariance(coords, &s.coords)),
                );
                1.0 - k_vec.dot(&cholesky.solve(&k_vec))
            }
        };
        Ok(var.max(0.0))
    }
}

impl Mapping for KrigingMapping {
    fn predict(&self, coords: &[i64]) -> Result<f64> {
        if self.observations.is_empty() {
            return Ok(0.0);
        }

        // Observed coordinates answer exactly (integer grid, so a zero
        // nearest distance is an exact hit).
        if let Some(hit) = self.knn.k_nearest(coords, 1).first() {
            if hit.distance == 0.0 {
                return Ok(hit.value);
            }
        }

        match &self.strategy {
            Strategy::Local => {
                let (neighbors, cholesky) = self.local_system(coords)?;
                let y = DVector::from_iterator(
                    neighbors.len(),
                    neighbors.iter().map(|n| n.value),
                );
                let alpha = cholesky.solve(&y);
                let k_vec = DVector::from_iterator(
                    neighbors.len(),
                    neighbors.iter().map(|n| self.covariance(coords, &n.coords)),
                );
                Ok(k_vec.dot(&alpha))
            }
            Strategy::Global { alpha, .. } => {
                let k_vec = DVector::from_iterator(
                    self.observations.len(),
                    self.observations
                        .iter()
                        .map(|s| self.covariance(coords, &s.coords)),
                );
                Ok(k_vec.dot(alpha))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(points: &[(Vec<i64>, f64)]) -> Vec<Sample> {
        points
            .iter()
            .map(|(c, v)| Sample::new(c.clone(), *v))
            .collect()
    }

    fn line_observations(step: i64, count: i64) -> Vec<Sample> {
        (0..count)
            .map(|i| Sample::new(vec![i * step], (i * step) as f64))
            .collect()
    }

    #[test]
    fn test_exact_match_global() {
        let mapping = KrigingMapping::new(
            obs(&[(vec![1, 1], 3.0), (vec![4, 2], -1.0), (vec![0, 3], 0.5)]),
            2,
            8,
            KrigingConfig::default(),
        )
        .unwrap();
        assert_eq!(mapping.predict(&[4, 2]).unwrap(), -1.0);
        assert_eq!(mapping.predict(&[1, 1]).unwrap(), 3.0);
    }

    #[test]
    fn test_exact_match_local() {
        let mapping = KrigingMapping::new(
            line_observations(1, 10),
            1,
            10,
            KrigingConfig::default().with_local_k(4),
        )
        .unwrap();
        assert!(matches!(mapping.strategy, Strategy::Local));
        assert_eq!(mapping.predict(&[7]).unwrap(), 7.0);
    }

    #[test]
    fn test_global_interpolates_between_neighbors() {
        // Even coordinates observed on a line; the gap at 5 should land
        // near the local trend.
        let mapping = KrigingMapping::new(
            line_observations(2, 5),
            1,
            10,
            KrigingConfig::default().with_theta(0.5),
        )
        .unwrap();
        let pred = mapping.predict(&[5]).unwrap();
        assert!((pred - 5.0).abs() < 1.0, "prediction {} too far from 5", pred);
    }

    #[test]
    fn test_local_interpolates_between_neighbors() {
        let mapping = KrigingMapping::new(
            line_observations(2, 10),
            1,
            20,
            KrigingConfig::default().with_theta(0.5).with_local_k(4),
        )
        .unwrap();
        assert!(matches!(mapping.strategy, Strategy::Local));
        let pred = mapping.predict(&[5]).unwrap();
        assert!((pred - 5.0).abs() < 1.0, "prediction {} too far from 5", pred);
    }

    #[test]
    fn test_variance_low_at_observation_high_far_away() {
        let mapping = KrigingMapping::new(
            line_observations(2, 10),
            1,
            100,
            KrigingConfig::default().with_theta(0.5),
        )
        .unwrap();
        assert!(mapping.variance(&[4]).unwrap() < 0.1);
        assert!(mapping.variance(&[99]).unwrap() > 0.9);
    }

    #[test]
    fn test_periodic_axis_wraps() {
        let config = KrigingConfig::default()
            .with_theta(0.5)
            .with_periodic(vec![true]);
        let mapping = KrigingMapping::new(
            obs(&[(vec![0], 5.0), (vec![5], 1.0)]),
            1,
            10,
            config,
        )
        .unwrap();
        // 9 is one step from 0 across the seam, mirroring 1.
        let wrapped = mapping.predict(&[9]).unwrap();
        let direct = mapping.predict(&[1]).unwrap();
        assert!((wrapped - direct).abs() < 1e-9);

        // Without the flag the seam query sits far from everything.
        let flat = KrigingMapping::new(
            obs(&[(vec![0], 5.0), (vec![5], 1.0)]),
            1,
            10,
            KrigingConfig::default().with_theta(0.5),
        )
        .unwrap();
        assert!((flat.predict(&[9]).unwrap() - wrapped).abs() > 0.5);
    }

    #[test]
    fn test_periodic_flag_arity_rejected() {
        let result = KrigingMapping::new(
            obs(&[(vec![0, 0], 1.0)]),
            2,
            8,
            KrigingConfig::default().with_periodic(vec![true]),
        );
        assert!(matches!(result, Err(FieldError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_observations() {
        let mapping =
            KrigingMapping::new(Vec::new(), 2, 8, KrigingConfig::default()).unwrap();
        assert_eq!(mapping.predict(&[3, 3]).unwrap(), 0.0);
        assert_eq!(mapping.variance(&[3, 3]).unwrap(), 1.0);
    }
}
