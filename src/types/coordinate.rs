//! Samples and axis-aligned coordinate boxes

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result};

/// One observed (coordinate, value) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub coords: Vec<i64>,
    pub value: f64,
}

impl Sample {
    pub fn new(coords: Vec<i64>, value: f64) -> Self {
        Self { coords, value }
    }
}

/// Axis-aligned box of grid coordinates, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    limits: Vec<(i64, i64)>,
}

impl Bounds {
    /// Box spanning `[0, size-1]` along each of `dims` axes.
    pub fn full(dims: usize, size: i64) -> Self {
        Self {
            limits: vec![(0, size - 1); dims],
        }
    }

    pub fn new(limits: Vec<(i64, i64)>) -> Self {
        debug_assert!(limits.iter().all(|&(lo, hi)| lo <= hi));
        Self { limits }
    }

    pub fn dims(&self) -> usize {
        self.limits.len()
    }

    pub fn lo(&self, axis: usize) -> i64 {
        self.limits[axis].0
    }

    pub fn hi(&self, axis: usize) -> i64 {
        self.limits[axis].1
    }

    /// Number of admissible values along `axis`.
    pub fn range(&self, axis: usize) -> i64 {
        self.limits[axis].1 - self.limits[axis].0 + 1
    }

    /// Total number of grid points inside the box.
    pub fn volume(&self) -> u64 {
        self.limits
            .iter()
            .map(|&(lo, hi)| (hi - lo + 1) as u64)
            .product()
    }

    pub fn contains(&self, coords: &[i64]) -> bool {
        coords.len() == self.limits.len()
            && coords
                .iter()
                .zip(&self.limits)
                .all(|(&c, &(lo, hi))| c >= lo && c <= hi)
    }

    /// Representative interior point, used as the fallback candidate.
    pub fn midpoint(&self) -> Vec<i64> {
        self.limits.iter().map(|&(lo, hi)| (lo + hi) / 2).collect()
    }

    /// Partition the box at `threshold` along `axis`: left keeps
    /// `[lo, threshold]`, right gets `[threshold+1, hi]`. The children are
    /// disjoint and their union is exactly `self`.
    pub fn split_at(&self, axis: usize, threshold: i64) -> (Bounds, Bounds) {
        debug_assert!(threshold >= self.lo(axis) && threshold < self.hi(axis));
        let mut left = self.clone();
        let mut right = self.clone();
        left.limits[axis].1 = threshold;
        right.limits[axis].0 = threshold + 1;
        (left, right)
    }

    /// Boundary validation for coordinates handed in by collaborators.
    pub fn check(&self, coords: &[i64]) -> Result<()> {
        if coords.len() != self.limits.len() {
            return Err(FieldError::DimensionMismatch {
                expected: self.limits.len(),
                got: coords.len(),
            });
        }
        for (axis, (&c, &(lo, hi))) in coords.iter().zip(&self.limits).enumerate() {
            if c < lo || c > hi {
                return Err(FieldError::OutOfBounds {
                    axis,
                    value: c,
                    lo,
                    hi,
                });
            }
        }
        Ok(())
    }
}
