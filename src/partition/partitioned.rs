use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;

use rayon::prelude::*;

use crate::hypergraph::{Hypergraph, StaticHypergraph};
use crate::partition::{ConnectivityIter, ConnectivitySet, PinCountTable};
use crate::types::{
    BlockId, EdgeId, EdgeWeight, Gain, NodeId, NodeWeight, HIGH_DEGREE_THRESHOLD, INVALID_BLOCK,
    INVALID_NODE,
};

/// A hypergraph together with a k-way partition of its vertices.
///
/// Owns the per-edge pin counts, the per-edge connectivity sets, the block
/// weights, and the gain cache. The hypergraph itself is borrowed: it is
/// never mutated through this type, and must outlive it.
///
/// All state is held in atomics so that the single mutating operation,
/// [`change_node_part_with`](Self::change_node_part_with), can run under
/// arbitrary concurrent calls for distinct vertices. Per-edge updates are
/// serialized with a one-bit spinlock per edge; a mover holds at most one
/// edge lock at a time and completes O(1) work under it.
pub struct PartitionedHypergraph<'a, H: Hypergraph> {
    k: usize,
    hg: &'a H,
    part_ids: Vec<AtomicU32>,
    part_weights: Vec<AtomicI64>,
    pin_counts: PinCountTable,
    connectivity_sets: ConnectivitySet,
    /// Sum of incident edge weights with exactly one pin in the vertex's
    /// own block: the connectivity weight saved by moving the vertex out.
    move_from_benefit: Vec<AtomicI64>,
    /// Per (vertex, block): sum of incident edge weights with zero pins in
    /// that block: the connectivity weight added by moving the vertex in.
    move_to_penalty: Vec<AtomicI64>,
    edge_locks: Vec<AtomicBool>,
    gain_cache_initialized: bool,
}

impl<'a, H: Hypergraph> PartitionedHypergraph<'a, H> {
    pub fn new(k: BlockId, hg: &'a H) -> Self {
        assert!(k >= 2, "need at least two blocks, got {}", k);
        let num_nodes = hg.num_nodes() as usize;
        let num_edges = hg.num_edges() as usize;
        let k = k as usize;
        Self {
            k,
            hg,
            part_ids: (0..num_nodes).map(|_| AtomicU32::new(INVALID_BLOCK)).collect(),
            part_weights: (0..k).map(|_| AtomicI64::new(0)).collect(),
            pin_counts: PinCountTable::new(num_edges, k),
            connectivity_sets: ConnectivitySet::new(num_edges, k),
            move_from_benefit: (0..num_nodes).map(|_| AtomicI64::new(0)).collect(),
            move_to_penalty: (0..num_nodes * k).map(|_| AtomicI64::new(0)).collect(),
            edge_locks: (0..num_edges).map(|_| AtomicBool::new(false)).collect(),
            gain_cache_initialized: false,
        }
    }

    // ------------------------------------------------------------------
    // Basic accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn k(&self) -> BlockId {
        self.k as BlockId
    }

    #[inline]
    pub fn hypergraph(&self) -> &H {
        self.hg
    }

    /// Block that vertex `v` currently belongs to, or `INVALID_BLOCK`.
    #[inline]
    pub fn part_id(&self, v: NodeId) -> BlockId {
        self.part_ids[v as usize].load(Ordering::Relaxed)
    }

    /// Current weight of block `p`.
    #[inline]
    pub fn part_weight(&self, p: BlockId) -> NodeWeight {
        self.part_weights[p as usize].load(Ordering::Relaxed)
    }

    /// Number of pins of edge `e` in block `p`.
    #[inline]
    pub fn pin_count_in_part(&self, e: EdgeId, p: BlockId) -> u32 {
        self.pin_counts.get(e, p)
    }

    /// Number of blocks spanned by edge `e` (lambda).
    #[inline]
    pub fn connectivity(&self, e: EdgeId) -> u32 {
        self.connectivity_sets.connectivity(e)
    }

    /// Blocks spanned by edge `e`, in ascending order.
    #[inline]
    pub fn connectivity_set(&self, e: EdgeId) -> ConnectivityIter<'_> {
        self.connectivity_sets.iter(e)
    }

    #[inline]
    pub fn is_gain_cache_initialized(&self) -> bool {
        self.gain_cache_initialized
    }

    #[inline]
    pub fn move_from_benefit(&self, v: NodeId) -> Gain {
        debug_assert!(self.gain_cache_initialized, "gain cache is not initialized");
        self.move_from_benefit[v as usize].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn move_to_penalty(&self, v: NodeId, p: BlockId) -> Gain {
        debug_assert!(self.gain_cache_initialized, "gain cache is not initialized");
        self.move_to_penalty[self.penalty_index(v, p)].load(Ordering::Relaxed)
    }

    /// Decrease of the km1 objective if `v` moves from its block to `to`.
    #[inline]
    pub fn km1_gain(&self, v: NodeId, from: BlockId, to: BlockId) -> Gain {
        debug_assert!(from == self.part_id(v), "gain queried for a block the vertex is not in");
        debug_assert!(from != to, "gain is undefined for from == to");
        self.move_from_benefit(v) - self.move_to_penalty(v, to)
    }

    /// True iff `v` touches at least one edge spanning more than one block.
    /// High-degree vertices are never reported as border nodes; they are
    /// effectively immovable and the scan would be too costly.
    pub fn is_border_node(&self, v: NodeId) -> bool {
        if self.hg.degree(v) > HIGH_DEGREE_THRESHOLD {
            return false;
        }
        self.hg.incident_edges(v).iter().any(|&e| self.connectivity(e) > 1)
    }

    pub fn num_incident_cut_edges(&self, v: NodeId) -> usize {
        self.hg.incident_edges(v).iter().filter(|&&e| self.connectivity(e) > 1).count()
    }

    #[inline]
    fn penalty_index(&self, v: NodeId, p: BlockId) -> usize {
        debug_assert!((p as usize) < self.k, "block {} out of range", p);
        v as usize * self.k + p as usize
    }

    // ------------------------------------------------------------------
    // Partition assignment
    // ------------------------------------------------------------------

    /// Assign `v` to block `p` without touching block weights or pin
    /// counts. Used for bulk assignment followed by
    /// [`initialize_partition`](Self::initialize_partition), and for
    /// setting the block of a restored contraction partner.
    pub fn set_only_node_part(&self, v: NodeId, p: BlockId) {
        debug_assert!(p != INVALID_BLOCK && (p as usize) < self.k);
        debug_assert!(self.part_id(v) == INVALID_BLOCK, "node {} is already assigned", v);
        self.part_ids[v as usize].store(p, Ordering::Relaxed);
    }

    /// Assign `v` to block `p`, updating block weight, pin counts and
    /// connectivity sets immediately.
    pub fn set_node_part(&self, v: NodeId, p: BlockId) {
        self.set_only_node_part(v, p);
        self.part_weights[p as usize].fetch_add(self.hg.node_weight(v), Ordering::Relaxed);
        for &e in self.hg.incident_edges(v) {
            if self.pin_counts.inc(e, p) == 1 {
                self.connectivity_sets.add(e, p);
            }
        }
    }

    /// Initialize block weights, pin counts and connectivity sets from the
    /// part ids set via [`set_only_node_part`](Self::set_only_node_part).
    /// Disabled vertices and edges are skipped.
    pub fn initialize_partition(&self) {
        // Block weights, accumulated per rayon split and merged once.
        let block_weights = (0..self.hg.num_nodes())
            .into_par_iter()
            .fold(
                || vec![0 as NodeWeight; self.k],
                |mut acc, v| {
                    if self.hg.node_is_enabled(v) {
                        let p = self.part_id(v);
                        debug_assert!(p != INVALID_BLOCK, "node {} is unassigned", v);
                        acc[p as usize] += self.hg.node_weight(v);
                    }
                    acc
                },
            )
            .reduce(
                || vec![0 as NodeWeight; self.k],
                |mut lhs, rhs| {
                    for (l, r) in lhs.iter_mut().zip(rhs) {
                        *l += r;
                    }
                    lhs
                },
            );
        for (p, &w) in block_weights.iter().enumerate() {
            self.part_weights[p].store(w, Ordering::Relaxed);
        }

        // Pin counts per edge, with a per-split scratch histogram.
        (0..self.hg.num_edges()).into_par_iter().for_each_init(
            || vec![0u32; self.k],
            |counts, e| {
                if !self.hg.edge_is_enabled(e) {
                    return;
                }
                for &pin in self.hg.pins(e) {
                    if self.hg.node_is_enabled(pin) {
                        counts[self.part_id(pin) as usize] += 1;
                    }
                }
                for (p, count) in counts.iter_mut().enumerate() {
                    if *count > 0 {
                        debug_assert!(self.pin_counts.get(e, p as BlockId) == 0);
                        self.pin_counts.set(e, p as BlockId, *count);
                        self.connectivity_sets.add(e, p as BlockId);
                        *count = 0;
                    }
                }
            },
        );
    }

    /// Wipe part ids, block weights, pin counts and connectivity sets.
    /// The underlying hypergraph and the gain cache allocation survive;
    /// the gain cache must be re-initialized afterwards. Not thread-safe.
    pub fn reset_partition(&mut self) {
        for part_id in &self.part_ids {
            part_id.store(INVALID_BLOCK, Ordering::Relaxed);
        }
        for weight in &self.part_weights {
            weight.store(0, Ordering::Relaxed);
        }
        for e in 0..self.hg.num_edges() {
            for p in self.connectivity_sets.iter(e) {
                self.pin_counts.set(e, p, 0);
            }
            self.connectivity_sets.clear(e);
        }
        self.gain_cache_initialized = false;
    }

    // ------------------------------------------------------------------
    // The move primitive
    // ------------------------------------------------------------------

    /// Move `v` from block `from` to block `to`, with a balance bound on
    /// the destination.
    ///
    /// The caller guarantees `part_id(v) == from`, `from != to`, and that
    /// no other thread concurrently moves `v`. The move is rejected (and
    /// all state left untouched) if it would push `to` above
    /// `max_weight_to` or empty `from` entirely.
    ///
    /// On success `on_success` runs once after the new part id is visible,
    /// and `delta_fn(e, w(e), |e|, pin_count_from_after, pin_count_to_after)`
    /// runs once per incident edge inside that edge's critical section.
    pub fn change_node_part_with<S, D>(
        &self,
        v: NodeId,
        from: BlockId,
        to: BlockId,
        max_weight_to: NodeWeight,
        on_success: S,
        mut delta_fn: D,
    ) -> bool
    where
        S: FnOnce(),
        D: FnMut(EdgeId, EdgeWeight, usize, u32, u32),
    {
        debug_assert!(self.part_id(v) == from, "node {} is not in block {}", v, from);
        debug_assert!(from != to, "move must change the block");
        debug_assert!((from as usize) < self.k && (to as usize) < self.k);

        // Reserve the weight change speculatively; undo on rejection.
        let wv = self.hg.node_weight(v);
        let to_weight_after = self.part_weights[to as usize].fetch_add(wv, Ordering::Relaxed) + wv;
        let from_weight_after =
            self.part_weights[from as usize].fetch_sub(wv, Ordering::Relaxed) - wv;
        if to_weight_after > max_weight_to || from_weight_after <= 0 {
            self.part_weights[to as usize].fetch_sub(wv, Ordering::Relaxed);
            self.part_weights[from as usize].fetch_add(wv, Ordering::Relaxed);
            return false;
        }

        self.part_ids[v as usize].store(to, Ordering::Relaxed);
        on_success();
        for &e in self.hg.incident_edges(v) {
            self.acquire_edge(e);
            let pin_count_from_after = self.pin_counts.dec(e, from);
            if pin_count_from_after == 0 {
                self.connectivity_sets.remove(e, from);
            }
            let pin_count_to_after = self.pin_counts.inc(e, to);
            if pin_count_to_after == 1 {
                self.connectivity_sets.add(e, to);
            }
            delta_fn(
                e,
                self.hg.edge_weight(e),
                self.hg.edge_size(e),
                pin_count_from_after,
                pin_count_to_after,
            );
            self.release_edge(e);
        }
        true
    }

    /// [`change_node_part_with`](Self::change_node_part_with) without a
    /// weight bound or success callback.
    pub fn change_node_part<D>(&self, v: NodeId, from: BlockId, to: BlockId, delta_fn: D) -> bool
    where
        D: FnMut(EdgeId, EdgeWeight, usize, u32, u32),
    {
        self.change_node_part_with(v, from, to, NodeWeight::MAX, || {}, delta_fn)
    }

    /// Move `v` and keep the gain cache delta-consistent: the supplied
    /// `delta_fn` and the gain cache update both run inside the per-edge
    /// critical section. `delta_fn` must not update the gain cache itself.
    pub fn change_node_part_full_update<S, D>(
        &self,
        v: NodeId,
        from: BlockId,
        to: BlockId,
        max_weight_to: NodeWeight,
        on_success: S,
        mut delta_fn: D,
    ) -> bool
    where
        S: FnOnce(),
        D: FnMut(EdgeId, EdgeWeight, usize, u32, u32),
    {
        assert!(self.gain_cache_initialized, "gain cache is not initialized");
        self.change_node_part_with(
            v,
            from,
            to,
            max_weight_to,
            on_success,
            |e, we, size, pin_count_from_after, pin_count_to_after| {
                delta_fn(e, we, size, pin_count_from_after, pin_count_to_after);
                self.gain_cache_update(v, e, we, from, pin_count_from_after, to, pin_count_to_after);
            },
        )
    }

    #[inline]
    fn acquire_edge(&self, e: EdgeId) {
        while self.edge_locks[e as usize]
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
    }

    #[inline]
    fn release_edge(&self, e: EdgeId) {
        self.edge_locks[e as usize].store(false, Ordering::Release);
    }

    // ------------------------------------------------------------------
    // Gain cache
    // ------------------------------------------------------------------

    /// Apply the gain cache deltas for one pin count update of edge `e`
    /// caused by moving `moved_node` from `from` to `to`. Must run inside
    /// the edge's critical section so the pin count pair is a consistent
    /// snapshot and each completed move is applied exactly once.
    pub fn gain_cache_update(
        &self,
        moved_node: NodeId,
        e: EdgeId,
        we: EdgeWeight,
        from: BlockId,
        pin_count_from_after: u32,
        to: BlockId,
        pin_count_to_after: u32,
    ) {
        debug_assert!(self.gain_cache_initialized, "gain cache is not initialized");

        if pin_count_from_after == 1 {
            // One pin left behind in `from`: leaving would now free the edge.
            for &u in self.hg.pins(e) {
                if self.part_id(u) == from {
                    self.move_from_benefit[u as usize].fetch_add(we, Ordering::Relaxed);
                    break;
                }
            }
        } else if pin_count_from_after == 0 {
            // Block `from` no longer touches e: entering it became costly.
            for &u in self.hg.pins(e) {
                if self.hg.node_is_enabled(u) {
                    self.move_to_penalty[self.penalty_index(u, from)].fetch_add(we, Ordering::Relaxed);
                }
            }
        }

        if pin_count_to_after == 1 {
            // Block `to` now touches e: entering it is free for every pin.
            for &u in self.hg.pins(e) {
                if self.hg.node_is_enabled(u) {
                    self.move_to_penalty[self.penalty_index(u, to)].fetch_sub(we, Ordering::Relaxed);
                }
            }
        } else if pin_count_to_after == 2 {
            // The pin that used to be alone in `to` no longer saves the
            // edge weight by leaving. The mover itself is exempt: its own
            // benefit is repaired wholesale after the round.
            for &u in self.hg.pins(e) {
                if u != moved_node && self.part_id(u) == to {
                    self.move_from_benefit[u as usize].fetch_sub(we, Ordering::Relaxed);
                    break;
                }
            }
        }
    }

    /// Compute benefit and penalty entries for every enabled vertex from
    /// the current pin counts. Called exactly once per refinement round,
    /// after which the move primitive keeps the cache delta-consistent.
    pub fn initialize_gain_cache(&mut self) {
        assert!(!self.gain_cache_initialized, "gain cache is initialized once per round");

        let high_degree = Mutex::new(Vec::new());
        (0..self.hg.num_nodes()).into_par_iter().for_each_init(
            || vec![0 as Gain; self.k],
            |penalty_scratch, v| {
                if !self.hg.node_is_enabled(v) {
                    // Zeroed entries let the uncontraction hooks build the
                    // values additively when the vertex is restored.
                    self.move_from_benefit[v as usize].store(0, Ordering::Relaxed);
                    for p in 0..self.k {
                        self.move_to_penalty[self.penalty_index(v, p as BlockId)]
                            .store(0, Ordering::Relaxed);
                    }
                    return;
                }
                if self.hg.degree(v) > HIGH_DEGREE_THRESHOLD {
                    high_degree.lock().unwrap().push(v);
                    return;
                }

                let from = self.part_id(v);
                let mut benefit: Gain = 0;
                let mut incident_weight: Gain = 0;
                for &e in self.hg.incident_edges(v) {
                    if self.hg.edge_is_enabled(e) {
                        self.aggregate_edge_contribution(
                            e,
                            from,
                            &mut benefit,
                            &mut incident_weight,
                            penalty_scratch,
                        );
                    }
                }

                self.move_from_benefit[v as usize].store(benefit, Ordering::Relaxed);
                for p in 0..self.k {
                    self.move_to_penalty[self.penalty_index(v, p as BlockId)]
                        .store(penalty_scratch[p] + incident_weight, Ordering::Relaxed);
                    penalty_scratch[p] = 0;
                }
            },
        );

        // High-degree vertices get a parallel reduction over their incident
        // edges instead; same arithmetic, different load balance.
        for v in high_degree.into_inner().unwrap() {
            let from = self.part_id(v);
            let (benefit, incident_weight, penalties) = self
                .hg
                .incident_edges(v)
                .par_iter()
                .fold(
                    || (0 as Gain, 0 as Gain, vec![0 as Gain; self.k]),
                    |(mut benefit, mut incident_weight, mut penalties), &e| {
                        if self.hg.edge_is_enabled(e) {
                            self.aggregate_edge_contribution(
                                e,
                                from,
                                &mut benefit,
                                &mut incident_weight,
                                &mut penalties,
                            );
                        }
                        (benefit, incident_weight, penalties)
                    },
                )
                .reduce(
                    || (0, 0, vec![0; self.k]),
                    |(b1, w1, p1), (b2, w2, mut p2)| {
                        for (acc, add) in p2.iter_mut().zip(p1) {
                            *acc += add;
                        }
                        (b1 + b2, w1 + w2, p2)
                    },
                );

            self.move_from_benefit[v as usize].store(benefit, Ordering::Relaxed);
            for p in 0..self.k {
                self.move_to_penalty[self.penalty_index(v, p as BlockId)]
                    .store(penalties[p] + incident_weight, Ordering::Relaxed);
            }
        }

        self.gain_cache_initialized = true;
    }

    /// One edge's contribution to a vertex's gain cache entries. Blocks in
    /// the connectivity set are *discounted* here; adding the total
    /// incident weight afterwards leaves exactly the weight of edges with
    /// zero pins in each block.
    #[inline]
    fn aggregate_edge_contribution(
        &self,
        e: EdgeId,
        block_of_v: BlockId,
        benefit: &mut Gain,
        incident_weight: &mut Gain,
        penalties: &mut [Gain],
    ) {
        let we = self.hg.edge_weight(e);
        if self.pin_counts.get(e, block_of_v) == 1 {
            *benefit += we;
        }
        for p in self.connectivity_sets.iter(e) {
            penalties[p as usize] -= we;
        }
        *incident_weight += we;
    }

    // ------------------------------------------------------------------
    // Uncontraction hooks
    // ------------------------------------------------------------------

    /// Gain-cache and pin-count update after uncoarsening restored `v`
    /// into edge `e` alongside its representative `u`: both are pins of
    /// `e` now. The caller has already enabled `v` in the hypergraph and
    /// assigned it to `u`'s block via `set_only_node_part`; block weight
    /// bookkeeping stays with the caller (the representative's weight
    /// shrinks by the same amount the partner brings back).
    pub fn uncontract_into_edge(&self, u: NodeId, v: NodeId, e: EdgeId) {
        let block = self.part_id(u);
        debug_assert!(block != INVALID_BLOCK && self.part_id(v) == block);

        let pin_count_after = self.pin_counts.inc(e, block);
        debug_assert!(pin_count_after > 1, "representative must already be a pin of the edge");

        if !self.gain_cache_initialized {
            return;
        }
        let we = self.hg.edge_weight(e);

        // If the edge had exactly one pin in the block before, that pin no
        // longer frees the edge by leaving. The representative may itself
        // have been replaced by another batch partner, so scan for any pin
        // of the block other than v.
        if pin_count_after == 2 {
            for &pin in self.hg.pins(e) {
                if pin != v && self.part_id(pin) == block {
                    self.move_from_benefit[pin as usize].fetch_sub(we, Ordering::Relaxed);
                    break;
                }
            }
        }

        // v starts paying for every block the edge does not touch.
        self.for_each_block_outside_connectivity(e, |p| {
            self.move_to_penalty[self.penalty_index(v, p)].fetch_add(we, Ordering::Relaxed);
        });
    }

    /// Gain-cache update after uncoarsening replaced `u` by `v` in edge
    /// `e`: pin counts are unchanged, but `u`'s contributions for `e`
    /// transfer to `v`.
    pub fn uncontract_replace_pin(&self, u: NodeId, v: NodeId, e: EdgeId) {
        if !self.gain_cache_initialized {
            return;
        }
        let block = self.part_id(u);
        debug_assert!(self.part_id(v) == block);
        let we = self.hg.edge_weight(e);

        if self.pin_counts.get(e, block) == 1 {
            self.move_from_benefit[u as usize].fetch_sub(we, Ordering::Relaxed);
            self.move_from_benefit[v as usize].fetch_add(we, Ordering::Relaxed);
        }

        self.for_each_block_outside_connectivity(e, |p| {
            self.move_to_penalty[self.penalty_index(u, p)].fetch_sub(we, Ordering::Relaxed);
            self.move_to_penalty[self.penalty_index(v, p)].fetch_add(we, Ordering::Relaxed);
        });
    }

    /// Re-register a restored single-pin edge. The edge was removed before
    /// refinement (it can never be cut), so it contributed to neither the
    /// pin counts nor the gain cache. The caller has already enabled it.
    pub fn restore_single_pin_net(&self, e: EdgeId) {
        debug_assert!(self.hg.edge_is_enabled(e));
        debug_assert!(self.hg.edge_size(e) == 1, "edge {} is not single-pin", e);

        let u = self.hg.pins(e)[0];
        let block = self.part_id(u);
        debug_assert!(block != INVALID_BLOCK);
        self.pin_counts.set(e, block, 1);
        self.connectivity_sets.add(e, block);

        if self.gain_cache_initialized {
            let we = self.hg.edge_weight(e);
            self.move_from_benefit[u as usize].fetch_add(we, Ordering::Relaxed);
            for p in 0..self.k as BlockId {
                if p != block {
                    self.move_to_penalty[self.penalty_index(u, p)].fetch_add(we, Ordering::Relaxed);
                }
            }
        }
    }

    /// Walk the gaps of the (ascending) connectivity set of `e`.
    fn for_each_block_outside_connectivity<F: FnMut(BlockId)>(&self, e: EdgeId, mut f: F) {
        let mut next = 0 as BlockId;
        for p in self.connectivity_sets.iter(e) {
            while next < p {
                f(next);
                next += 1;
            }
            next = p + 1;
        }
        while (next as usize) < self.k {
            f(next);
            next += 1;
        }
    }

    // ------------------------------------------------------------------
    // Block extraction
    // ------------------------------------------------------------------

    /// Extract the sub-hypergraph induced by block `p`, together with the
    /// mapping from original to extracted vertex ids (`INVALID_NODE` for
    /// vertices outside the block).
    ///
    /// With `cut_net_splitting` cut edges are projected onto the block and
    /// kept when at least two of their pins remain (connectivity metric);
    /// without it only edges lying entirely inside the block survive (cut
    /// metric).
    pub fn extract_block(
        &self,
        block: BlockId,
        cut_net_splitting: bool,
    ) -> (StaticHypergraph, Vec<NodeId>) {
        assert!(block != INVALID_BLOCK && (block as usize) < self.k);

        let mut node_mapping = vec![INVALID_NODE; self.hg.num_nodes() as usize];
        let mut num_extracted_nodes: NodeId = 0;
        for v in 0..self.hg.num_nodes() {
            if self.hg.node_is_enabled(v) && self.part_id(v) == block {
                node_mapping[v as usize] = num_extracted_nodes;
                num_extracted_nodes += 1;
            }
        }

        let keep = |e: EdgeId| {
            self.hg.edge_is_enabled(e)
                && self.pin_count_in_part(e, block) > 1
                && (cut_net_splitting || self.connectivity(e) == 1)
        };

        let mut edges = Vec::new();
        let mut edge_weights = Vec::new();
        for e in 0..self.hg.num_edges() {
            if keep(e) {
                edges.push(
                    self.hg
                        .pins(e)
                        .iter()
                        .filter(|&&pin| self.part_id(pin) == block)
                        .map(|&pin| node_mapping[pin as usize])
                        .collect::<Vec<_>>(),
                );
                edge_weights.push(self.hg.edge_weight(e));
            }
        }

        let mut node_weights = vec![0 as NodeWeight; num_extracted_nodes as usize];
        for v in 0..self.hg.num_nodes() {
            let mapped = node_mapping[v as usize];
            if mapped != INVALID_NODE {
                node_weights[mapped as usize] = self.hg.node_weight(v);
            }
        }

        (
            StaticHypergraph::new(num_extracted_nodes as usize, &edges, edge_weights, node_weights),
            node_mapping,
        )
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Recompute the benefit entry of `v` from current pin counts and
    /// store it. Global rollback uses this to repair the entries of moved
    /// vertices, whose own-block benefit is not maintained move-by-move.
    pub fn recompute_move_from_benefit(&self, v: NodeId) {
        self.move_from_benefit[v as usize]
            .store(self.move_from_benefit_recomputed(v), Ordering::Relaxed);
    }

    pub fn move_from_benefit_recomputed(&self, v: NodeId) -> Gain {
        let p = self.part_id(v);
        self.hg
            .incident_edges(v)
            .iter()
            .filter(|&&e| self.hg.edge_is_enabled(e) && self.pin_counts.get(e, p) == 1)
            .map(|&e| self.hg.edge_weight(e))
            .sum()
    }

    pub fn move_to_penalty_recomputed(&self, v: NodeId, p: BlockId) -> Gain {
        self.hg
            .incident_edges(v)
            .iter()
            .filter(|&&e| self.hg.edge_is_enabled(e) && self.pin_counts.get(e, p) == 0)
            .map(|&e| self.hg.edge_weight(e))
            .sum()
    }

    pub fn pin_count_recomputed(&self, e: EdgeId, p: BlockId) -> u32 {
        self.hg
            .pins(e)
            .iter()
            .filter(|&&pin| self.hg.node_is_enabled(pin) && self.part_id(pin) == p)
            .count() as u32
    }

    /// Recompute block weights from scratch (diagnostics only).
    pub fn recompute_part_weights(&self) {
        for weight in &self.part_weights {
            weight.store(0, Ordering::Relaxed);
        }
        for v in 0..self.hg.num_nodes() {
            if self.hg.node_is_enabled(v) {
                self.part_weights[self.part_id(v) as usize]
                    .fetch_add(self.hg.node_weight(v), Ordering::Relaxed);
            }
        }
    }

    /// Verify pin counts, connectivity sets, block weights and (when
    /// initialized) the gain cache against a recomputation from scratch.
    /// Diagnostic for tests; never called on the hot path.
    pub fn check_tracked_partition_information(&self) -> bool {
        let mut consistent = true;

        for e in 0..self.hg.num_edges() {
            if !self.hg.edge_is_enabled(e) {
                continue;
            }
            let mut connectivity = 0;
            for p in 0..self.k as BlockId {
                let tracked = self.pin_count_in_part(e, p);
                if tracked != self.pin_count_recomputed(e, p) {
                    consistent = false;
                }
                if (tracked > 0) != self.connectivity_sets.contains(e, p) {
                    consistent = false;
                }
                connectivity += u32::from(tracked > 0);
            }
            if connectivity != self.connectivity(e) {
                consistent = false;
            }
        }

        let mut recomputed_weights = vec![0 as NodeWeight; self.k];
        for v in 0..self.hg.num_nodes() {
            if self.hg.node_is_enabled(v) {
                recomputed_weights[self.part_id(v) as usize] += self.hg.node_weight(v);
            }
        }
        for (p, &expected) in recomputed_weights.iter().enumerate() {
            if self.part_weight(p as BlockId) != expected {
                consistent = false;
            }
        }

        if self.gain_cache_initialized {
            for v in 0..self.hg.num_nodes() {
                if !self.hg.node_is_enabled(v) {
                    continue;
                }
                if self.move_from_benefit(v) != self.move_from_benefit_recomputed(v) {
                    consistent = false;
                }
                for p in 0..self.k as BlockId {
                    if self.move_to_penalty(v, p) != self.move_to_penalty_recomputed(v, p) {
                        consistent = false;
                    }
                }
            }
        }

        consistent
    }
}
