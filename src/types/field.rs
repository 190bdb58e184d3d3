//! Dense n-dimensional scalar field
//!
//! Row-major array addressed by grid coordinates. Used for ground-truth
//! landscapes and for materializing reconstructed fields.

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseField {
    dimensions: usize,
    dimension_size: i64,
    values: Vec<f64>,
}

impl DenseField {
    /// Field of `size^dims` points, every cell set to `initial`.
    pub fn new(dimensions: usize, dimension_size: i64, initial: f64) -> Self {
        let total = (dimension_size as usize).pow(dimensions as u32);
        Self {
            dimensions,
            dimension_size,
            values: vec![initial; total],
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn dimension_size(&self) -> i64 {
        self.dimension_size
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Row-major linearization; the last axis varies fastest.
    pub fn coords_to_index(&self, coords: &[i64]) -> Result<usize> {
        if coords.len() != self.dimensions {
            return Err(FieldError::DimensionMismatch {
                expected: self.dimensions,
                got: coords.len(),
            });
        }
        let mut index = 0usize;
        for (axis, &c) in coords.iter().enumerate() {
            if c < 0 || c >= self.dimension_size {
                return Err(FieldError::OutOfBounds {
                    axis,
                    value: c,
                    lo: 0,
                    hi: self.dimension_size - 1,
                });
            }
            index = index * self.dimension_size as usize + c as usize;
        }
        Ok(index)
    }

    /// Inverse of [`coords_to_index`](Self::coords_to_index).
    pub fn index_to_coords(&self, mut index: usize) -> Vec<i64> {
        let mut coords = vec![0i64; self.dimensions];
        for axis in (0..self.dimensions).rev() {
            coords[axis] = (index % self.dimension_size as usize) as i64;
            index /= self.dimension_size as usize;
        }
        coords
    }

    pub fn get(&self, coords: &[i64]) -> Result<f64> {
        Ok(self.values[self.coords_to_index(coords)?])
    }

    pub fn set(&mut self, coords: &[i64], value: f64) -> Result<()> {
        let idx = self.coords_to_index(coords)?;
        self.values[idx] = value;
        Ok(())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
