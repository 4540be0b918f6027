//! Frontier priority queue: a capacity-bounded min-heap keyed by
//! `f = g + h`.

use crate::State;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::warn;

/// Default per-direction frontier capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000_000;

/// A frontier candidate.
///
/// Entries are immutable once pushed; a better path to the same state
/// pushes a fresh entry, and stale ones are discarded lazily at pop time
/// by comparing `cost` against the visited set's best-known value.
#[derive(Debug, Clone, Copy)]
pub struct FrontierEntry {
    /// Priority: cost so far plus the heuristic to the target.
    pub sort_cost: f32,
    /// Cost accumulated from the search origin.
    pub cost: f32,
    /// Meters traveled from the search origin.
    pub distance_m: f32,
    pub state: State,
    pub parent: Option<State>,
    /// Index of the edge taken from the parent, within the parent's tile.
    pub parent_edge_index: u32,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sort_cost.total_cmp(&other.sort_cost).is_eq()
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert the ordering for min-f behavior.
        // Ties break arbitrarily.
        other.sort_cost.total_cmp(&self.sort_cost)
    }
}

/// A bounded min-heap over [`FrontierEntry`].
///
/// The capacity is fixed at construction; pushes beyond it are dropped
/// (and counted) rather than growing the heap. This is a best-effort
/// bound for worst-case queries on small machines, not an expected
/// steady-state condition.
pub struct SearchQueue {
    heap: BinaryHeap<FrontierEntry>,
    capacity: usize,
    dropped: u64,
}

impl SearchQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, entry: FrontierEntry) {
        if self.heap.len() >= self.capacity {
            if self.dropped == 0 {
                warn!(capacity = self.capacity, "Frontier full; dropping pushes");
            }
            self.dropped += 1;
            return;
        }
        self.heap.push(entry);
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.heap.pop()
    }

    /// The smallest `f` currently queued.
    pub fn min_sort_cost(&self) -> Option<f32> {
        self.heap.peek().map(|e| e.sort_cost)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The number of pushes refused because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;

    fn entry(sort_cost: f32) -> FrontierEntry {
        FrontierEntry {
            sort_cost,
            cost: sort_cost,
            distance_m: 0.0,
            state: State {
                tile_id: 0,
                node_id: 0,
            },
            parent: None,
            parent_edge_index: 0,
        }
    }

    #[test]
    fn test_capacity_bound() {
        let mut queue = SearchQueue::with_capacity(2);
        queue.push(entry(3.0));
        queue.push(entry(1.0));
        queue.push(entry(2.0));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        // The drop is arbitrary (whatever arrives while full), not priority-aware.
        assert_eq!(queue.pop().unwrap().sort_cost, 1.0);
    }

    proptest! {
        /// Pops must come out in non-decreasing f order.
        #[test]
        fn pop_sequence_is_sorted(costs in proptest::collection::vec(0.0f32..1e6, 1..200)) {
            let mut queue = SearchQueue::with_capacity(1000);
            for c in &costs {
                queue.push(entry(*c));
            }

            let mut previous = f32::NEG_INFINITY;
            while let Some(e) = queue.pop() {
                assert!(e.sort_cost >= previous);
                previous = e.sort_cost;
            }
        }
    }
}
