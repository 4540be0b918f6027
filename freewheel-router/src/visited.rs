//! Per-direction search state: an open-addressed hash table mapping a
//! [`State`] to its best-known cost and parent back-pointer.
//!
//! The table is sized once (to a prime) and never grows; probing is
//! bounded, and inserts that exhaust the probe window are dropped and
//! counted. With the default capacity at roughly double the worst
//! expected frontier, drops indicate a query far beyond the engine's
//! design envelope rather than a routine condition.

use crate::State;
use tracing::warn;

/// Default table capacity: a prime comfortably above the largest node
/// count a capped search can touch.
pub const DEFAULT_VISITED_CAPACITY: usize = 2_000_003;

/// Linear probing gives up after this many slots.
const MAX_PROBES: usize = 2000;

#[derive(Debug, Clone, Copy)]
pub struct VisitedEntry {
    pub state: State,
    /// Best-known cost from the search origin.
    pub cost: f32,
    pub parent: Option<State>,
    /// Index of the edge taken from the parent, within the parent's tile.
    pub parent_edge_index: u32,
}

pub struct VisitedSet {
    slots: Vec<Option<VisitedEntry>>,
    dropped: u64,
}

impl VisitedSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            dropped: 0,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn home_slot(&self, state: State) -> usize {
        // FNV-1a over the two fields of the state.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        hash ^= u64::from(state.tile_id);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        hash ^= u64::from(state.node_id);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        (hash % self.slots.len() as u64) as usize
    }

    /// Looks up the entry for a state, probing linearly from its home slot.
    pub fn get(&self, state: State) -> Option<&VisitedEntry> {
        let home = self.home_slot(state);
        for probe in 0..MAX_PROBES.min(self.slots.len()) {
            let index = (home + probe) % self.slots.len();
            match &self.slots[index] {
                // An empty slot ends the probe chain.
                None => return None,
                Some(entry) if entry.state == state => return Some(entry),
                Some(_) => {}
            }
        }
        None
    }

    /// Records a cost and parent for a state.
    ///
    /// A new state claims the first empty slot in its probe chain; an
    /// existing state is overwritten only when the new cost is strictly
    /// lower (the parent pointer is always updated jointly with the cost).
    /// If the probe window is exhausted, the insert is dropped.
    pub fn insert(&mut self, state: State, cost: f32, parent: Option<State>, parent_edge_index: u32) {
        let home = self.home_slot(state);
        for probe in 0..MAX_PROBES.min(self.slots.len()) {
            let index = (home + probe) % self.slots.len();
            match &mut self.slots[index] {
                slot @ None => {
                    *slot = Some(VisitedEntry {
                        state,
                        cost,
                        parent,
                        parent_edge_index,
                    });
                    return;
                }
                Some(entry) if entry.state == state => {
                    if cost < entry.cost {
                        entry.cost = cost;
                        entry.parent = parent;
                        entry.parent_edge_index = parent_edge_index;
                    }
                    return;
                }
                Some(_) => {}
            }
        }

        if self.dropped == 0 {
            warn!("Visited table probe window exhausted; dropping inserts");
        }
        self.dropped += 1;
    }

    /// The number of inserts dropped due to probe exhaustion.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(tile_id: u32, node_id: u32) -> State {
        State { tile_id, node_id }
    }

    #[test]
    fn test_insert_and_get() {
        let mut visited = VisitedSet::with_capacity(97);
        let a = state(7, 3);
        assert!(visited.get(a).is_none());

        visited.insert(a, 10.0, None, 0);
        let entry = visited.get(a).unwrap();
        assert_eq!(entry.cost, 10.0);
        assert_eq!(entry.parent, None);
    }

    #[test]
    fn test_insert_improves_strictly() {
        let mut visited = VisitedSet::with_capacity(97);
        let a = state(7, 3);
        let p1 = state(1, 1);
        let p2 = state(2, 2);

        visited.insert(a, 10.0, Some(p1), 4);
        // A worse (or equal) cost must not displace the entry.
        visited.insert(a, 11.0, Some(p2), 5);
        visited.insert(a, 10.0, Some(p2), 5);
        let entry = visited.get(a).unwrap();
        assert_eq!(entry.cost, 10.0);
        assert_eq!(entry.parent, Some(p1));
        assert_eq!(entry.parent_edge_index, 4);

        // A strictly better cost updates cost and parent together.
        visited.insert(a, 9.0, Some(p2), 5);
        let entry = visited.get(a).unwrap();
        assert_eq!(entry.cost, 9.0);
        assert_eq!(entry.parent, Some(p2));
        assert_eq!(entry.parent_edge_index, 5);
    }

    #[test]
    fn test_collisions_probe_linearly() {
        // A tiny table forces every insert into one probe chain.
        let mut visited = VisitedSet::with_capacity(7);
        for node_id in 0..5 {
            visited.insert(state(0, node_id), 1.0, None, 0);
        }
        for node_id in 0..5 {
            let entry = visited.get(state(0, node_id)).unwrap();
            assert_eq!(entry.state.node_id, node_id);
        }
    }

    #[test]
    fn test_overflow_drops_inserts() {
        let mut visited = VisitedSet::with_capacity(3);
        for node_id in 0..10 {
            visited.insert(state(0, node_id), 1.0, None, 0);
        }
        // Three slots filled; the rest were dropped.
        assert_eq!(visited.dropped(), 7);
    }
}
