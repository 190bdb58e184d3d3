//! Repeat-sampling model for Bernoulli oracles
//!
//! When the oracle answers with noisy win/loss draws instead of exact
//! values, single samples are useless. This model coarsens the grid so the
//! budget affords a few hundred draws per cell, aims the scheduler at the
//! coarse cells, estimates each cell's win probability with shrinkage
//! toward a prior, and reconstructs the field from the cell midpoints via
//! distance-weighted averaging.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{GridConfig, IdwConfig, StochasticConfig};
use crate::error::{FieldError, Result};
use crate::mapping::{InverseDistanceMapping, Mapping};
use crate::model::FieldModel;
use crate::sampling::QueryScheduler;
use crate::types::Sample;

/// Oracle results at or above this count as wins.
const WIN_THRESHOLD: f64 = 0.9;

/// Fraction of the per-cell repeat target that still makes the final,
/// budget-truncated cell worth keeping.
const FINAL_FLUSH_FRACTION: f64 = 0.75;

#[derive(Debug)]
pub struct StochasticModel {
    grid: GridConfig,
    config: StochasticConfig,
    scaled_size: i64,
    /// Full-resolution [lo, hi] covered by each scaled cell value.
    cell_bounds: Vec<(i64, i64)>,
    scheduler: QueryScheduler,
    /// (wins, trials) per flushed cell, linear-indexed on the scaled grid.
    cell_stats: Vec<Option<(u64, u64)>>,
    /// Draws spent on one cell before moving on (budget-adjusted).
    repeats: usize,
    current_cell: Vec<i64>,
    current_index: usize,
    repeat_left: usize,
    wins: u64,
    trials: u64,
    issued: usize,
    mapping: Option<InverseDistanceMapping>,
    rng: StdRng,
}

impl StochasticModel {
    pub fn new(grid: GridConfig, config: StochasticConfig) -> Result<Self> {
        grid.validate()?;
        if !config.periodic.is_empty() && config.periodic.len() != grid.dimensions {
            return Err(FieldError::InvalidConfig(format!(
                "periodic flags cover {} axes, grid has {}",
                config.periodic.len(),
                grid.dimensions
            )));
        }

        // Coarsen until the budget affords `repeats_per_cell` draws per
        // cell; a budget that already covers the full grid skips scaling.
        let volume = (grid.dimension_size as f64).powi(grid.dimensions as i32);
        let budget = grid.total_queries as f64;
        let base_repeats = config.repeats_per_cell as f64;
        let scale_ratio = (budget / (base_repeats * volume))
            .powf(1.0 / grid.dimensions as f64)
            .min(1.0);
        let mut repeats = base_repeats;
        if scale_ratio >= 1.0 {
            repeats = budget / volume;
        }
        let inv_scale = 1.0 / scale_ratio;
        let scaled_size = ((grid.dimension_size as f64 * scale_ratio).floor() as i64).max(1);
        let repeats = ((1.5 * repeats) as usize).max(1);

        let mut cell_bounds = Vec::with_capacity(scaled_size as usize);
        for s in 0..scaled_size {
            let lo = (s as f64 * inv_scale).ceil() as i64;
            let hi = ((s + 1) as f64 * inv_scale).ceil() as i64 - 1;
            cell_bounds.push((
                lo.clamp(0, grid.dimension_size - 1),
                hi.clamp(0, grid.dimension_size - 1),
            ));
        }
        cell_bounds[0].0 = 0;
        cell_bounds[scaled_size as usize - 1].1 = grid.dimension_size - 1;

        let total_cells = (scaled_size as u64).pow(grid.dimensions as u32) as usize;
        let rng = match config.scheduler.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(0x9e37_79b9_7f4a_7c15)),
            None => StdRng::from_entropy(),
        };
        let scheduler =
            QueryScheduler::new(grid.dimensions, scaled_size, config.scheduler.clone());

        Ok(Self {
            current_cell: vec![0; grid.dimensions],
            grid,
            config,
            scaled_size,
            cell_bounds,
            scheduler,
            cell_stats: vec![None; total_cells],
            repeats,
            current_index: 0,
            repeat_left: 0,
            wins: 0,
            trials: 0,
            issued: 0,
            mapping: None,
            rng,
        })
    }

    pub fn scaled_size(&self) -> i64 {
        self.scaled_size
    }

    fn linear_index(&self, cell: &[i64]) -> usize {
        cell.iter()
            .fold(0usize, |idx, &c| idx * self.scaled_size as usize + c as usize)
    }

    fn cell_coords(&self, mut index: usize) -> Vec<i64> {
        let mut cell = vec![0i64; self.grid.dimensions];
        for axis in (0..self.grid.dimensions).rev() {
            cell[axis] = (index % self.scaled_size as usize) as i64;
            index /= self.scaled_size as usize;
        }
        cell
    }

    fn unscale_midpoint(&self, cell: &[i64]) -> Vec<i64> {
        cell.iter()
            .map(|&s| {
                let (lo, hi) = self.cell_bounds[s as usize];
                (lo + hi) / 2
            })
            .collect()
    }

    /// Centered draw inside the current cell: mean of four uniform draws,
    /// biased toward the cell interior.
    fn draw_point(&mut self) -> Vec<i64> {
        let mut coords = Vec::with_capacity(self.grid.dimensions);
        for &s in &self.current_cell {
            let (lo, hi) = self.cell_bounds[s as usize];
            let sum: i64 = (0..4).map(|_| self.rng.gen_range(lo..=hi)).sum();
            coords.push((sum + 2) / 4);
        }
        coords
    }

    fn shrunk(&self, wins: u64, trials: u64) -> f64 {
        let raw = wins as f64 / trials as f64;
        self.config.shrink * raw + (1.0 - self.config.shrink) * self.config.prior
    }

    fn build_mapping(&mut self) {
        let mut data = Vec::new();
        for (index, stats) in self.cell_stats.iter().enumerate() {
            let (wins, trials) = match stats {
                Some((wins, trials)) => (*wins, *trials),
                None => continue,
            };
            let prob = self.shrunk(wins, trials);
            let coords = self.unscale_midpoint(&self.cell_coords(index));
            // Periodic axes contribute wrapped images so the interpolator
            // sees across the seam.
            for (axis, &flag) in self.config.periodic.iter().enumerate() {
                if flag {
                    let mut below = coords.clone();
                    below[axis] -= self.grid.dimension_size;
                    let mut above = coords.clone();
                    above[axis] += self.grid.dimension_size;
                    data.push(Sample::new(below, prob));
                    data.push(Sample::new(above, prob));
                }
            }
            data.push(Sample::new(coords, prob));
        }
        if data.is_empty() {
            return;
        }
        let neighbors = ((0.01 * data.len() as f64) as usize).clamp(2, 8);
        let idw = IdwConfig::default()
            .with_max_neighbors(neighbors)
            .with_power(2)
            .with_offset(0.1);
        self.mapping = Some(InverseDistanceMapping::new(&data, idw));
    }

    /// Trained interpolator, available once the budget is exhausted.
    pub fn interpolator(&self) -> Option<&InverseDistanceMapping> {
        self.mapping.as_ref()
    }
}

impl FieldModel for StochasticModel {
    fn next_query(&mut self) -> Result<Vec<i64>> {
        self.issued += 1;
        if self.repeat_left == 0 {
            self.current_cell = self.scheduler.next_query();
            self.current_index = self.linear_index(&self.current_cell);
            self.repeat_left = self.repeats;
            self.wins = 0;
            self.trials = 0;
        }
        self.repeat_left -= 1;
        Ok(self.draw_point())
    }

    fn record(&mut self, _coords: &[i64], value: f64) -> Result<()> {
        // Draws aggregate per scheduler cell, not per exact coordinate.
        if value >= WIN_THRESHOLD {
            self.wins += 1;
        }
        self.trials += 1;

        let budget_spent = self.issued >= self.grid.total_queries;
        let final_flush =
            budget_spent && self.trials as f64 >= FINAL_FLUSH_FRACTION * self.repeats as f64;
        if self.trials as usize >= self.repeats || final_flush {
            let prob = self.shrunk(self.wins, self.trials);
            self.cell_stats[self.current_index] = Some((self.wins, self.trials));
            let cell = self.current_cell.clone();
            self.scheduler.record(&cell, prob)?;
            self.wins = 0;
            self.trials = 0;
            self.repeat_left = 0;
        }

        if budget_spent && self.mapping.is_none() {
            self.build_mapping();
        }
        Ok(())
    }

    fn value_at(&self, coords: &[i64]) -> Result<f64> {
        match &self.mapping {
            Some(mapping) => mapping.predict(coords),
            // Nothing estimated yet: the prior is the defined default.
            None => Ok(self.config.prior),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{run, FieldSink};

    fn seeded(periodic: Vec<bool>) -> StochasticConfig {
        let mut config = StochasticConfig::default().with_periodic(periodic);
        config.scheduler.seed = Some(21);
        config
    }

    #[test]
    fn test_grid_coarsening() {
        // 200 repeats over an 8-point line with a 400-draw budget leaves
        // room for two cells.
        let grid = GridConfig::new(1, 8, 400);
        let model = StochasticModel::new(grid, seeded(vec![])).unwrap();
        assert_eq!(model.scaled_size(), 2);
        assert_eq!(model.repeats, 300);
        assert_eq!(model.cell_bounds, vec![(0, 3), (4, 7)]);
    }

    #[test]
    fn test_pre_training_reports_prior() {
        let grid = GridConfig::new(1, 8, 400);
        let model = StochasticModel::new(grid, seeded(vec![])).unwrap();
        assert_eq!(model.value_at(&[3]).unwrap(), DEFAULT_PRIOR);
    }

    #[test]
    fn test_constant_winner_estimates_shrunk_probability() {
        let grid = GridConfig::new(1, 8, 400);
        let mut model = StochasticModel::new(grid, seeded(vec![])).unwrap();
        let mut oracle = |_: &[i64]| 1.0;
        let mut sink = FieldSink::new(1, 8);
        run(&mut model, &mut oracle, &mut sink, &grid).unwrap();

        // Every draw wins: raw estimate 1.0, shrunk toward the prior.
        let expected = 0.3 * 1.0 + 0.7 * 0.315;
        for x in 0..8 {
            assert!(
                (model.value_at(&[x]).unwrap() - expected).abs() < 1e-9,
                "x={}",
                x
            );
        }
    }

    #[test]
    fn test_queries_stay_inside_grid() {
        let grid = GridConfig::new(2, 10, 600);
        let mut model = StochasticModel::new(grid, seeded(vec![])).unwrap();
        for _ in 0..600 {
            let q = model.next_query().unwrap();
            assert!(q.iter().all(|&c| (0..10).contains(&c)), "query {:?}", q);
            model.record(&q, 0.0).unwrap();
        }
    }

    #[test]
    fn test_periodic_images_augment_observations() {
        let grid = GridConfig::new(1, 8, 400);
        let mut model = StochasticModel::new(grid, seeded(vec![true])).unwrap();
        let mut oracle = |_: &[i64]| 1.0;
        let mut sink = FieldSink::new(1, 8);
        run(&mut model, &mut oracle, &mut sink, &grid).unwrap();

        // One flushed cell contributes its midpoint plus both wrapped
        // images.
        let interpolator = model.interpolator().unwrap();
        assert_eq!(interpolator.observation_count(), 3);
    }

    const DEFAULT_PRIOR: f64 = 0.315;
}
