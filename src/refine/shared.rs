use std::sync::atomic::{AtomicU32, Ordering};

use crate::hypergraph::Hypergraph;
use crate::refine::{MoveLog, NodeTracker, PqHandles, SeedQueue};
use crate::types::{BlockId, EdgeId, NodeId, INVALID_BLOCK};

/// State shared by all localized searches of a round: vertex reservations,
/// the seed work queue, the global move log, per-node target blocks and
/// heap handles, and the remaining-pin counters that cap frontier
/// expansion over edges that already lost all their original pins.
#[derive(Debug)]
pub(crate) struct FmSharedData {
    pub(crate) tracker: NodeTracker,
    pub(crate) seeds: SeedQueue,
    pub(crate) moves: MoveLog,
    pub(crate) pq_handles: PqHandles,
    target_part: Vec<AtomicU32>,
    remaining_pins: Vec<AtomicU32>,
}

impl FmSharedData {
    pub(crate) fn new(num_nodes: usize, num_edges: usize, num_shards: usize) -> Self {
        Self {
            tracker: NodeTracker::new(num_nodes),
            seeds: SeedQueue::new(num_shards, num_nodes),
            moves: MoveLog::new(num_nodes),
            pq_handles: PqHandles::new(num_nodes),
            target_part: (0..num_nodes).map(|_| AtomicU32::new(INVALID_BLOCK)).collect(),
            remaining_pins: (0..num_edges).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// The destination block a search last computed for `v`. Only the
    /// search holding `v`'s reservation reads or writes this.
    #[inline]
    pub(crate) fn target_part(&self, v: NodeId) -> BlockId {
        self.target_part[v as usize].load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_target_part(&self, v: NodeId, p: BlockId) {
        self.target_part[v as usize].store(p, Ordering::Relaxed);
    }

    /// Pins of `e` that have not been moved away since the round started.
    #[inline]
    pub(crate) fn remaining_pins(&self, e: EdgeId) -> u32 {
        self.remaining_pins[e as usize].load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn decrement_remaining_pins(&self, e: EdgeId) {
        let prev = self.remaining_pins[e as usize].fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "remaining pins of edge {} underflowed", e);
    }

    /// Prepare for a new round: forget reservations, clear the move log,
    /// and reset every edge's remaining-pin budget to its size.
    pub(crate) fn reset_round<H: Hypergraph>(&self, hg: &H) {
        self.tracker.reset();
        self.moves.clear();
        self.seeds.clear();
        hg.for_each_edge(|e| {
            self.remaining_pins[e as usize].store(hg.edge_size(e) as u32, Ordering::Relaxed);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::StaticHypergraph;
    use crate::refine::Move;

    #[test]
    fn reset_round_restores_pin_budgets() {
        let hg = StaticHypergraph::with_unit_weights(4, &[vec![0, 1, 2], vec![2, 3]]);
        let shared = FmSharedData::new(4, 2, 2);

        shared.reset_round(&hg);
        assert_eq!(shared.remaining_pins(0), 3);
        assert_eq!(shared.remaining_pins(1), 2);

        shared.decrement_remaining_pins(0);
        shared.decrement_remaining_pins(0);
        assert_eq!(shared.remaining_pins(0), 1);

        shared.moves.append(Move { node: 0, from: 0, to: 1, gain: 0 });
        let sid = shared.tracker.mint_search_id();
        assert!(shared.tracker.try_reserve(1, sid));

        shared.reset_round(&hg);
        assert_eq!(shared.remaining_pins(0), 3);
        assert_eq!(shared.moves.len(), 0);
        assert!(shared.tracker.try_reserve(1, shared.tracker.mint_search_id()));
    }

    #[test]
    fn target_parts_are_per_node() {
        let shared = FmSharedData::new(3, 1, 1);
        assert_eq!(shared.target_part(0), INVALID_BLOCK);
        shared.set_target_part(0, 2);
        shared.set_target_part(1, 1);
        assert_eq!(shared.target_part(0), 2);
        assert_eq!(shared.target_part(1), 1);
        assert_eq!(shared.target_part(2), INVALID_BLOCK);
    }
}
