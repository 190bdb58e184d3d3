//! Per-region candidate generation without repeats
//!
//! A lazily materialized trie over the region's box: level `i` holds the
//! remaining admissible values of axis `i`, each entry pointing to the
//! sub-trie for axis `i+1`. An absent child means no coordinate with that
//! prefix has been consumed yet, so any suffix is admissible. Consuming a
//! coordinate removes its path; nodes drained of entries are freed and
//! their parent entry removed, propagating upward.
//!
//! Nodes live in an arena addressed by integer ids with a free list, so
//! recursive removal needs no ownership juggling.

use ahash::AHashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::Bounds;

type NodeId = usize;

#[derive(Debug, Default)]
struct TrieNode {
    /// (value, child) pairs in swap-remove order.
    entries: Vec<(i64, Option<NodeId>)>,
    /// value -> position in `entries`.
    slots: AHashMap<i64, usize>,
}

impl TrieNode {
    fn full(lo: i64, hi: i64) -> Self {
        let range = (hi - lo + 1) as usize;
        let mut entries = Vec::with_capacity(range);
        let mut slots = AHashMap::with_capacity(range);
        for (idx, value) in (lo..=hi).enumerate() {
            entries.push((value, None));
            slots.insert(value, idx);
        }
        Self { entries, slots }
    }

    fn remove_slot(&mut self, slot: usize) {
        let (value, _) = self.entries[slot];
        let last = self.entries.len() - 1;
        if slot != last {
            let moved = self.entries[last];
            self.entries[slot] = moved;
            self.slots.insert(moved.0, slot);
        }
        self.entries.pop();
        self.slots.remove(&value);
    }
}

/// Proposes never-consumed coordinates inside one region's box.
#[derive(Debug)]
pub struct CandidateGenerator {
    bounds: Bounds,
    nodes: Vec<TrieNode>,
    free: Vec<NodeId>,
    root: NodeId,
    rng: StdRng,
}

impl CandidateGenerator {
    pub fn new(bounds: Bounds) -> Self {
        Self::with_rng(bounds, StdRng::from_entropy())
    }

    /// Deterministic variant; the scheduler forks per-leaf rngs from its
    /// configured seed through here.
    pub fn with_rng(bounds: Bounds, rng: StdRng) -> Self {
        let root_node = TrieNode::full(bounds.lo(0), bounds.hi(0));
        Self {
            bounds,
            nodes: vec![root_node],
            free: Vec::new(),
            root: 0,
            rng,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// True once every coordinate in the box has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.nodes[self.root].entries.is_empty()
    }

    /// Mark `coords` consumed. Coordinates outside the box are a silent
    /// no-op; bound checks belong to the caller. Consuming the same
    /// coordinate twice is also a no-op (its path is already gone).
    pub fn mark_queried(&mut self, coords: &[i64]) {
        if !self.bounds.contains(coords) {
            return;
        }
        self.consume(self.root, coords, 0);
    }

    /// Up to `count` distinct, uniformly selected, never-consumed
    /// coordinates. Each draw walks one random admissible entry per level;
    /// below an unmaterialized child every in-range suffix is untouched, so
    /// components there are drawn uniformly from the box. Returns an empty
    /// batch once the region is exhausted; near exhaustion fewer than
    /// `count` distinct coordinates may remain, so the batch can come up
    /// short after a bounded number of attempts.
    pub fn candidates(&mut self, count: usize) -> Vec<Vec<i64>> {
        if self.is_exhausted() {
            return Vec::new();
        }

        let dims = self.bounds.dims();
        let mut batch: Vec<Vec<i64>> = Vec::with_capacity(count);
        let mut attempts = 0;
        let max_attempts = count * 4;

        while batch.len() < count && attempts < max_attempts {
            attempts += 1;
            let mut coords = Vec::with_capacity(dims);
            let mut runner = Some(self.root);
            for axis in 0..dims {
                match runner {
                    Some(id) => {
                        let node = &self.nodes[id];
                        let pick = self.rng.gen_range(0..node.entries.len());
                        let (value, child) = node.entries[pick];
                        coords.push(value);
                        runner = child;
                    }
                    None => {
                        let value = self
                            .rng
                            .gen_range(self.bounds.lo(axis)..=self.bounds.hi(axis));
                        coords.push(value);
                    }
                }
            }
            if !batch.contains(&coords) {
                batch.push(coords);
            }
        }
        batch
    }

    /// Returns true when the node at `id` ran out of entries and should be
    /// detached by its parent.
    fn consume(&mut self, id: NodeId, coords: &[i64], depth: usize) -> bool {
        let slot = match self.nodes[id].slots.get(&coords[depth]) {
            Some(&slot) => slot,
            // Path already removed by an earlier consume.
            None => return false,
        };

        let mut detach = depth == coords.len() - 1;
        if !detach {
            let existing = self.nodes[id].entries[slot].1;
            let child = match existing {
                Some(child) => child,
                None => {
                    // First touch below this prefix: materialize the next
                    // level with every admissible value still present.
                    let child = self.alloc(TrieNode::full(
                        self.bounds.lo(depth + 1),
                        self.bounds.hi(depth + 1),
                    ));
                    self.nodes[id].entries[slot].1 = Some(child);
                    child
                }
            };
            if self.consume(child, coords, depth + 1) {
                self.release(child);
                detach = true;
            }
        }

        if detach {
            self.nodes[id].remove_slot(slot);
        }
        self.nodes[id].entries.is_empty()
    }

    fn alloc(&mut self, node: TrieNode) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        self.nodes[id] = TrieNode::default();
        self.free.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn seeded(bounds: Bounds) -> CandidateGenerator {
        CandidateGenerator::with_rng(bounds, StdRng::seed_from_u64(42))
    }

    #[test]
    fn test_never_repeats_consumed() {
        let mut gen = seeded(Bounds::full(2, 4));
        let mut consumed: HashSet<Vec<i64>> = HashSet::new();

        // Consume half the box, interleaved with candidate draws.
        for x in 0..4 {
            for y in 0..2 {
                let c = vec![x, y];
                gen.mark_queried(&c);
                consumed.insert(c);
                for cand in gen.candidates(5) {
                    assert!(
                        !consumed.contains(&cand),
                        "generator proposed consumed coordinate {:?}",
                        cand
                    );
                }
            }
        }
    }

    #[test]
    fn test_exhaustion_enumerates_box() {
        let bounds = Bounds::new(vec![(1, 3), (0, 2)]);
        let mut gen = seeded(bounds.clone());
        let mut seen = HashSet::new();

        while !gen.is_exhausted() {
            let batch = gen.candidates(1);
            assert_eq!(batch.len(), 1);
            let c = batch.into_iter().next().unwrap();
            assert!(bounds.contains(&c));
            gen.mark_queried(&c);
            assert!(seen.insert(c), "duplicate draw before exhaustion");
        }
        assert_eq!(seen.len() as u64, bounds.volume());
        assert!(gen.candidates(3).is_empty());
    }

    #[test]
    fn test_out_of_bounds_is_noop() {
        let mut gen = seeded(Bounds::full(2, 3));
        gen.mark_queried(&[5, 5]);
        gen.mark_queried(&[-1, 0]);
        gen.mark_queried(&[0]);
        assert!(!gen.is_exhausted());
        assert_eq!(gen.candidates(2).len(), 2);
    }

    #[test]
    fn test_double_consume_is_noop() {
        let mut gen = seeded(Bounds::full(1, 3));
        gen.mark_queried(&[1]);
        gen.mark_queried(&[1]);
        let mut remaining: HashSet<i64> = gen
            .candidates(10)
            .into_iter()
            .map(|c| c[0])
            .collect();
        remaining.remove(&0);
        remaining.remove(&2);
        assert!(remaining.is_empty(), "only 0 and 2 should remain");
    }

    #[test]
    fn test_candidates_in_bounds() {
        let bounds = Bounds::new(vec![(2, 6), (3, 3), (0, 9)]);
        let mut gen = seeded(bounds.clone());
        for cand in gen.candidates(20) {
            assert!(bounds.contains(&cand));
        }
    }

    #[test]
    fn test_single_dimension_exhaustion() {
        let mut gen = seeded(Bounds::full(1, 5));
        for v in 0..5 {
            gen.mark_queried(&[v]);
        }
        assert!(gen.is_exhausted());
    }

    #[test]
    fn test_arena_slots_recycled() {
        let mut gen = seeded(Bounds::full(2, 2));
        for x in 0..2 {
            for y in 0..2 {
                gen.mark_queried(&[x, y]);
            }
        }
        assert!(gen.is_exhausted());
        // The depth-1 slot was released after the first subtree drained and
        // recycled for the second, so one arena slot beyond the root exists.
        assert_eq!(gen.nodes.len(), 2);
        assert_eq!(gen.free.len(), 1);
    }
}
