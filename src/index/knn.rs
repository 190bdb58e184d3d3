//! Batch k-nearest-neighbor index
//!
//! Built once from a snapshot of samples (balanced median construction,
//! axes cycling by depth) and queried read-only during reconstruction.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::distance::euclidean;
use crate::types::Sample;

type NodeId = usize;

/// One k-NN result, closest first in the returned batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub distance: f64,
    pub value: f64,
    pub coords: Vec<i64>,
}

#[derive(Debug)]
struct KdNode {
    sample: Sample,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// Max-heap entry ordered by distance; the heap keeps the k best seen.
#[derive(Debug)]
struct HeapEntry {
    dist: f64,
    node: NodeId,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.dist.total_cmp(&other.dist) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist.total_cmp(&other.dist)
    }
}

/// Immutable k-d tree over a sample snapshot.
#[derive(Debug)]
pub struct StaticNeighborIndex {
    dimensions: usize,
    nodes: Vec<KdNode>,
    root: Option<NodeId>,
}

impl StaticNeighborIndex {
    pub fn build(samples: &[Sample]) -> Self {
        let dimensions = samples.first().map_or(0, |s| s.coords.len());
        let mut index = Self {
            dimensions,
            nodes: Vec::with_capacity(samples.len()),
            root: None,
        };
        let mut working: Vec<Sample> = samples.to_vec();
        index.root = index.build_recursive(&mut working, 0);
        index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn build_recursive(&mut self, samples: &mut [Sample], depth: usize) -> Option<NodeId> {
        if samples.is_empty() {
            return None;
        }
        let axis = depth % self.dimensions;
        samples.sort_by_key(|s| s.coords[axis]);
        let median = samples.len() / 2;

        let id = self.nodes.len();
        self.nodes.push(KdNode {
            sample: samples[median].clone(),
            left: None,
            right: None,
        });

        let (below, rest) = samples.split_at_mut(median);
        let above = &mut rest[1..];
        let left = self.build_recursive(below, depth + 1);
        let right = self.build_recursive(above, depth + 1);
        self.nodes[id].left = left;
        self.nodes[id].right = right;
        Some(id)
    }

    /// The `k` stored samples closest to `query`, ascending by Euclidean
    /// distance. Fewer than `k` are returned when the index is smaller.
    pub fn k_nearest(&self, query: &[i64], k: usize) -> Vec<Neighbor> {
        let root = match self.root {
            Some(root) if k > 0 => root,
            _ => return Vec::new(),
        };
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(k + 1);
        self.search(root, query, k, 0, &mut heap);
        heap.into_sorted_vec()
            .into_iter()
            .map(|entry| {
                let sample = &self.nodes[entry.node].sample;
                Neighbor {
                    distance: entry.dist,
                    value: sample.value,
                    coords: sample.coords.clone(),
                }
            })
            .collect()
    }

    fn search(
        &self,
        id: NodeId,
        query: &[i64],
        k: usize,
        depth: usize,
        heap: &mut BinaryHeap<HeapEntry>,
    ) {
        let node = &self.nodes[id];
        let dist = euclidean(query, &node.sample.coords);
        if heap.len() < k {
            heap.push(HeapEntry { dist, node: id });
        } else if dist < heap.peek().map_or(f64::INFINITY, |e| e.dist) {
            heap.pop();
            heap.push(HeapEntry { dist, node: id });
        }

        let axis = depth % self.dimensions;
        let diff = (query[axis] - node.sample.coords[axis]) as f64;
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(near) = near {
            self.search(near, query, k, depth + 1, heap);
        }
        let worst = heap.peek().map_or(f64::INFINITY, |e| e.dist);
        if let Some(far) = far {
            if heap.len() < k || diff.abs() < worst {
                self.search(far, query, k, depth + 1, heap);
            }
        }
    }
}
