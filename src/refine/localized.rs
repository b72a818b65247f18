use crate::config::{FmParams, PartitionParams};
use crate::hypergraph::Hypergraph;
use crate::partition::PartitionedHypergraph;
use crate::refine::tracker::UNCLAIMED;
use crate::refine::{BlockQueue, FmSharedData, Move, VertexQueue};
use crate::types::{BlockId, EdgeId, Gain, NodeId, SearchId, GAIN_MIN, INVALID_BLOCK};

/// Counters of one worker's searches, accumulated over a round.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub pushes: usize,
    pub extractions: usize,
    pub retries: usize,
    pub moves: usize,
}

impl SearchStats {
    pub(crate) fn merge(&mut self, other: SearchStats) {
        self.pushes += other.pushes;
        self.extractions += other.extractions;
        self.retries += other.retries;
        self.moves += other.moves;
    }
}

/// A localized k-way FM search, owned by one worker and reused across
/// seeds.
///
/// The search expands a frontier from a seed border vertex. Candidate
/// vertices live in one max-heap per block keyed by their gain toward
/// their best destination; a block-level max-heap tracks the best key of
/// each non-empty vertex heap. Committed moves are never undone here; the
/// global rollback picks the best prefix after the round.
pub(crate) struct LocalizedKWayFm {
    block_pq: BlockQueue,
    vertex_pqs: Vec<VertexQueue>,
    touched_edges: Vec<EdgeId>,
    stats: SearchStats,
}

impl LocalizedKWayFm {
    pub(crate) fn new(k: usize) -> Self {
        Self {
            block_pq: BlockQueue::new(k),
            vertex_pqs: (0..k).map(|_| VertexQueue::new()).collect(),
            touched_edges: Vec::new(),
            stats: SearchStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> SearchStats {
        self.stats
    }

    /// Run one localized search from `seed` under search id `sid`.
    /// Returns the number of committed moves.
    pub(crate) fn find_moves<H: Hypergraph>(
        &mut self,
        phg: &PartitionedHypergraph<'_, H>,
        shared: &FmSharedData,
        partition: &PartitionParams,
        fm: &FmParams,
        seed: NodeId,
        sid: SearchId,
    ) -> usize {
        debug_assert!(self.block_pq.is_empty());
        if !shared.tracker.try_reserve(seed, sid) {
            return 0;
        }
        self.insert_into_pq(phg, shared, partition, seed);

        let mut cumulative_gain: Gain = 0;
        let mut best_gain: Gain = 0;
        let mut non_improving = 0;
        let mut moves_committed = 0;

        while let Some(m) = self.find_next_move(phg, shared, partition) {
            self.touched_edges.clear();
            let touched = &mut self.touched_edges;
            let moved = phg.change_node_part_full_update(
                m.node,
                m.from,
                m.to,
                partition.max_part_weight(m.to),
                || {},
                |e, _, _, _, _| {
                    touched.push(e);
                    shared.decrement_remaining_pins(e);
                },
            );
            if !moved {
                // Lost a balance race; queue it again with a fresh key.
                // (A vertex whose source block would empty gets no
                // destination at all and is dropped instead.)
                self.insert_into_pq(phg, shared, partition, m.node);
                continue;
            }

            moves_committed += 1;
            self.stats.moves += 1;
            shared.tracker.mark_moved(m.node);
            shared.moves.append(m);

            cumulative_gain += m.gain;
            if cumulative_gain > best_gain {
                best_gain = cumulative_gain;
                non_improving = 0;
            } else {
                non_improving += 1;
            }

            let touched = std::mem::take(&mut self.touched_edges);
            self.update_neighbors(phg, shared, partition, &touched, m, sid);
            self.touched_edges = touched;

            if non_improving >= fm.max_non_improving_moves
                || moves_committed >= fm.max_moves_per_search
            {
                break;
            }
        }

        self.finish(shared, fm);
        moves_committed
    }

    /// Refresh the gains of reserved neighbors on the edges the last move
    /// touched, and pull newly reachable unclaimed vertices into the
    /// search. Expansion over an edge stops once all of its original pins
    /// have been moved away.
    fn update_neighbors<H: Hypergraph>(
        &mut self,
        phg: &PartitionedHypergraph<'_, H>,
        shared: &FmSharedData,
        partition: &PartitionParams,
        touched: &[EdgeId],
        m: Move,
        sid: SearchId,
    ) {
        for &e in touched {
            let expand = shared.remaining_pins(e) > 0;
            for &w in phg.hypergraph().pins(e) {
                if w == m.node {
                    continue;
                }
                let owner = shared.tracker.owner(w);
                if owner == sid {
                    if shared.pq_handles.contains(w) {
                        self.update_gain(phg, shared, partition, w, m);
                    }
                } else if owner == UNCLAIMED && expand && shared.tracker.try_reserve(w, sid) {
                    self.insert_into_pq(phg, shared, partition, w);
                }
            }
        }
    }

    /// Queue `v` keyed by the gain toward its best destination block.
    fn insert_into_pq<H: Hypergraph>(
        &mut self,
        phg: &PartitionedHypergraph<'_, H>,
        shared: &FmSharedData,
        partition: &PartitionParams,
        v: NodeId,
    ) {
        let pv = phg.part_id(v);
        let (target, gain) = best_destination_block(phg, partition, v);
        shared.set_target_part(v, target);
        self.vertex_pqs[pv as usize].insert(&shared.pq_handles, v, gain);
        self.stats.pushes += 1;
        self.update_block(pv);
    }

    /// Re-key `v` after the move `m` changed pin counts around it. If
    /// `v`'s stored target block is unaffected by `m`, only the stored
    /// target and the move's two blocks can have become better; otherwise
    /// all blocks are rescanned.
    fn update_gain<H: Hypergraph>(
        &mut self,
        phg: &PartitionedHypergraph<'_, H>,
        shared: &FmSharedData,
        partition: &PartitionParams,
        v: NodeId,
        m: Move,
    ) {
        let pv = phg.part_id(v);
        let designated = shared.target_part(v);
        let (target, gain) = if phg.k() < 4
            || designated == INVALID_BLOCK
            || designated == m.from
            || designated == m.to
        {
            best_destination_block(phg, partition, v)
        } else {
            best_of_three(phg, partition, v, [designated, m.from, m.to])
        };
        shared.set_target_part(v, target);
        self.vertex_pqs[pv as usize].adjust_key(&shared.pq_handles, v, gain);
        self.update_block(pv);
    }

    /// Pick the next move: take the top vertex of the top block and
    /// re-derive its best destination; accept only if the fresh gain is
    /// at least the queued estimate, otherwise re-key and retry. Vertices
    /// without any feasible destination are dropped and released.
    fn find_next_move<H: Hypergraph>(
        &mut self,
        phg: &PartitionedHypergraph<'_, H>,
        shared: &FmSharedData,
        partition: &PartitionParams,
    ) -> Option<Move> {
        while !self.block_pq.is_empty() {
            let from = self.block_pq.top();
            let pq = &mut self.vertex_pqs[from as usize];
            let u = pq.top();
            let estimated_gain = pq.top_key();
            debug_assert!(estimated_gain == self.block_pq.top_key());

            let (to, gain) = best_destination_block(phg, partition, u);
            if to == INVALID_BLOCK {
                pq.delete_top(&shared.pq_handles);
                shared.tracker.release(u);
                self.update_block(from);
            } else if gain >= estimated_gain {
                pq.delete_top(&shared.pq_handles);
                self.stats.extractions += 1;
                self.update_block(from);
                return Some(Move { node: u, from, to, gain });
            } else {
                self.stats.retries += 1;
                pq.adjust_key(&shared.pq_handles, u, gain);
                shared.set_target_part(u, to);
                self.update_block(from);
            }
        }
        None
    }

    /// Mirror block `p`'s best vertex key into the block queue.
    fn update_block(&mut self, p: BlockId) {
        if self.vertex_pqs[p as usize].is_empty() {
            if self.block_pq.contains(p) {
                self.block_pq.remove(p);
            }
        } else {
            self.block_pq.insert_or_adjust(p, self.vertex_pqs[p as usize].top_key());
        }
    }

    /// Release reserved-but-unmoved vertices (policy permitting) and
    /// empty all queues for the next seed.
    fn finish(&mut self, shared: &FmSharedData, fm: &FmParams) {
        if fm.release_nodes {
            for pq in &self.vertex_pqs {
                for i in 0..pq.len() {
                    shared.tracker.release(pq.at(i));
                }
            }
        }
        for pq in &mut self.vertex_pqs {
            pq.clear(&shared.pq_handles);
        }
        self.block_pq.clear();
    }
}

/// The feasible destination block with the lowest penalty, ties broken
/// toward the lighter block. Returns `(INVALID_BLOCK, GAIN_MIN)` when no
/// destination respects the weight caps or the source block would empty.
fn best_destination_block<H: Hypergraph>(
    phg: &PartitionedHypergraph<'_, H>,
    partition: &PartitionParams,
    u: NodeId,
) -> (BlockId, Gain) {
    let wu = phg.hypergraph().node_weight(u);
    let from = phg.part_id(u);
    let from_weight = phg.part_weight(from);
    if from_weight - wu <= 0 {
        return (INVALID_BLOCK, GAIN_MIN);
    }

    let mut to = INVALID_BLOCK;
    let mut to_penalty = Gain::MAX;
    let mut best_to_weight = from_weight - wu;
    for p in 0..phg.k() {
        if p == from {
            continue;
        }
        let to_weight = phg.part_weight(p);
        let penalty = phg.move_to_penalty(u, p);
        if (penalty < to_penalty || (penalty == to_penalty && to_weight < best_to_weight))
            && to_weight + wu <= partition.max_part_weight(p)
        {
            to_penalty = penalty;
            to = p;
            best_to_weight = to_weight;
        }
    }
    if to == INVALID_BLOCK {
        (INVALID_BLOCK, GAIN_MIN)
    } else {
        (to, phg.move_from_benefit(u) - to_penalty)
    }
}

/// Like [`best_destination_block`] but only over three candidate blocks.
fn best_of_three<H: Hypergraph>(
    phg: &PartitionedHypergraph<'_, H>,
    partition: &PartitionParams,
    u: NodeId,
    candidates: [BlockId; 3],
) -> (BlockId, Gain) {
    let wu = phg.hypergraph().node_weight(u);
    let from = phg.part_id(u);
    let from_weight = phg.part_weight(from);
    if from_weight - wu <= 0 {
        return (INVALID_BLOCK, GAIN_MIN);
    }

    let mut to = INVALID_BLOCK;
    let mut to_penalty = Gain::MAX;
    let mut best_to_weight = from_weight - wu;
    for p in candidates {
        if p == from || p == INVALID_BLOCK {
            continue;
        }
        let to_weight = phg.part_weight(p);
        let penalty = phg.move_to_penalty(u, p);
        if (penalty < to_penalty || (penalty == to_penalty && to_weight < best_to_weight))
            && to_weight + wu <= partition.max_part_weight(p)
        {
            to_penalty = penalty;
            to = p;
            best_to_weight = to_weight;
        }
    }
    if to == INVALID_BLOCK {
        (INVALID_BLOCK, GAIN_MIN)
    } else {
        (to, phg.move_from_benefit(u) - to_penalty)
    }
}
