//! Online spatial store with point lookup and nearest-neighbor search
//!
//! Samples accumulate in unsorted buckets; a bucket that outgrows
//! `floor(log2(total grid points))` converts into a binary split pivoted on
//! the median sample along the widest axis, reinserting its members. Nodes
//! live in an arena addressed by integer ids.

use crate::distance::squared_euclidean;
use crate::error::{FieldError, Result};
use crate::types::Sample;

type NodeId = usize;

#[derive(Debug)]
enum IndexNode {
    /// Unsorted samples below the split threshold.
    Bucket { entries: Vec<Sample> },
    /// Median pivot with strictly-below samples to the left.
    Split {
        pivot: Sample,
        axis: usize,
        left: Option<NodeId>,
        right: Option<NodeId>,
    },
}

/// Where the current nearest candidate lives in the arena.
#[derive(Debug, Clone, Copy)]
struct BestRef {
    dist: f64,
    node: NodeId,
    /// Bucket entry position; `None` when the best is a split pivot.
    entry: Option<usize>,
}

#[derive(Debug)]
pub struct SpatialIndex {
    dimensions: usize,
    dimension_size: i64,
    bucket_threshold: usize,
    nodes: Vec<IndexNode>,
    root: Option<NodeId>,
    len: usize,
}

impl SpatialIndex {
    pub fn new(dimensions: usize, dimension_size: i64) -> Self {
        // log2 of the total grid volume; small grids still bucket a few.
        let total_bits = dimensions as f64 * (dimension_size as f64).log2();
        let bucket_threshold = (total_bits.floor() as usize).max(1);
        Self {
            dimensions,
            dimension_size,
            bucket_threshold,
            nodes: Vec::new(),
            root: None,
            len: 0,
        }
    }

    /// Number of distinct coordinates stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn validate(&self, coords: &[i64]) -> Result<()> {
        if coords.len() != self.dimensions {
            return Err(FieldError::DimensionMismatch {
                expected: self.dimensions,
                got: coords.len(),
            });
        }
        for (axis, &c) in coords.iter().enumerate() {
            if c < 0 || c >= self.dimension_size {
                return Err(FieldError::OutOfBounds {
                    axis,
                    value: c,
                    lo: 0,
                    hi: self.dimension_size - 1,
                });
            }
        }
        Ok(())
    }

    /// Store `value` at `coords`, overwriting in place when the coordinate
    /// is already present.
    pub fn insert(&mut self, coords: &[i64], value: f64) -> Result<()> {
        self.validate(coords)?;
        let sample = Sample::new(coords.to_vec(), value);
        match self.root {
            None => {
                self.root = Some(self.alloc(IndexNode::Bucket {
                    entries: vec![sample],
                }));
                self.len += 1;
            }
            Some(root) => {
                if self.place(root, sample) {
                    self.len += 1;
                }
            }
        }
        Ok(())
    }

    /// Value stored at `coords`, or the sparse default `0.0`.
    pub fn get(&self, coords: &[i64]) -> Result<f64> {
        self.validate(coords)?;
        let mut cursor = self.root;
        while let Some(id) = cursor {
            match &self.nodes[id] {
                IndexNode::Bucket { entries } => {
                    return Ok(entries
                        .iter()
                        .find(|s| s.coords == coords)
                        .map(|s| s.value)
                        .unwrap_or(0.0));
                }
                IndexNode::Split {
                    pivot,
                    axis,
                    left,
                    right,
                } => {
                    if pivot.coords == coords {
                        return Ok(pivot.value);
                    }
                    cursor = if coords[*axis] < pivot.coords[*axis] {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
        Ok(0.0)
    }

    /// Closest stored sample to `coords` by Euclidean distance, or `None`
    /// when the index is empty. Ties keep the first sample encountered.
    pub fn nearest(&self, coords: &[i64]) -> Result<Option<&Sample>> {
        if coords.len() != self.dimensions {
            return Err(FieldError::DimensionMismatch {
                expected: self.dimensions,
                got: coords.len(),
            });
        }
        let root = match self.root {
            Some(root) => root,
            None => return Ok(None),
        };
        let mut best = None;
        self.nearest_recursive(root, coords, &mut best);
        Ok(best.map(|b| match &self.nodes[b.node] {
            IndexNode::Bucket { entries } => &entries[b.entry.expect("bucket best has entry")],
            IndexNode::Split { pivot, .. } => pivot,
        }))
    }

    fn nearest_recursive(&self, id: NodeId, target: &[i64], best: &mut Option<BestRef>) {
        match &self.nodes[id] {
            IndexNode::Bucket { entries } => {
                // Terminal: scan every bucket member.
                for (entry, sample) in entries.iter().enumerate() {
                    let dist = squared_euclidean(target, &sample.coords);
                    if best.map_or(true, |b| dist < b.dist) {
                        *best = Some(BestRef {
                            dist,
                            node: id,
                            entry: Some(entry),
                        });
                    }
                }
            }
            IndexNode::Split {
                pivot,
                axis,
                left,
                right,
            } => {
                let dist = squared_euclidean(target, &pivot.coords);
                if best.map_or(true, |b| dist < b.dist) {
                    *best = Some(BestRef {
                        dist,
                        node: id,
                        entry: None,
                    });
                }

                let below = target[*axis] < pivot.coords[*axis];
                let (near, far) = if below { (left, right) } else { (right, left) };
                if let Some(near) = near {
                    self.nearest_recursive(*near, target, best);
                }
                // Only cross the hyperplane when it could still win.
                let plane = (target[*axis] - pivot.coords[*axis]) as f64;
                if let Some(far) = far {
                    if plane * plane < best.map_or(f64::INFINITY, |b| b.dist) {
                        self.nearest_recursive(*far, target, best);
                    }
                }
            }
        }
    }

    /// Returns true when `sample` introduced a new coordinate.
    fn place(&mut self, id: NodeId, sample: Sample) -> bool {
        match &mut self.nodes[id] {
            IndexNode::Bucket { entries } => {
                if let Some(existing) = entries.iter_mut().find(|s| s.coords == sample.coords) {
                    existing.value = sample.value;
                    return false;
                }
                entries.push(sample);
                if entries.len() > self.bucket_threshold {
                    self.convert(id);
                }
                true
            }
            IndexNode::Split {
                pivot,
                axis,
                left,
                right,
            } => {
                if pivot.coords == sample.coords {
                    pivot.value = sample.value;
                    return false;
                }
                let side = sample.coords[*axis] < pivot.coords[*axis];
                let child = if side { *left } else { *right };
                match child {
                    Some(child) => self.place(child, sample),
                    None => {
                        let node = IndexNode::Bucket {
                            entries: vec![sample],
                        };
                        let child = self.alloc(node);
                        match &mut self.nodes[id] {
                            IndexNode::Split { left, right, .. } => {
                                if side {
                                    *left = Some(child);
                                } else {
                                    *right = Some(child);
                                }
                            }
                            IndexNode::Bucket { .. } => unreachable!(),
                        }
                        true
                    }
                }
            }
        }
    }

    /// Bucket -> split conversion: widest-range axis, median pivot, every
    /// other member reinserted below. Reinsertion may cascade further
    /// conversions in the children.
    fn convert(&mut self, id: NodeId) {
        let mut entries = match std::mem::replace(
            &mut self.nodes[id],
            IndexNode::Bucket {
                entries: Vec::new(),
            },
        ) {
            IndexNode::Bucket { entries } => entries,
            IndexNode::Split { .. } => unreachable!("convert targets buckets"),
        };

        let mut axis = 0;
        let mut widest = -1i64;
        for d in 0..self.dimensions {
            let lo = entries.iter().map(|s| s.coords[d]).min().unwrap_or(0);
            let hi = entries.iter().map(|s| s.coords[d]).max().unwrap_or(0);
            if hi - lo > widest {
                widest = hi - lo;
                axis = d;
            }
        }

        entries.sort_by_key(|s| s.coords[axis]);
        let median = entries.len() / 2;
        let pivot = entries.swap_remove(median);

        self.nodes[id] = IndexNode::Split {
            pivot,
            axis,
            left: None,
            right: None,
        };
        for sample in entries {
            self.place(id, sample);
        }
    }

    fn alloc(&mut self, node: IndexNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}
